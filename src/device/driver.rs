// SPDX-License-Identifier: GPL-3.0-only

//! Sensor driver seam
//!
//! Concrete sensors (V4L2 kernel devices, the synthetic test pattern) plug
//! in behind this trait. Drivers are single-threaded by contract: the
//! caller guarantees `start`/`stop`/`read_frame` never overlap.

use super::{ModeProfile, SensorFrame, StreamTag};
use crate::errors::DeviceError;
use std::time::Duration;

/// One concrete sensor implementation
pub trait SensorDriver: Send {
    /// Short driver name for logging
    fn name(&self) -> &str;

    /// Apply a profile and begin streaming
    fn start(&mut self, profile: &ModeProfile) -> Result<(), DeviceError>;

    /// Stop streaming; the driver may be restarted with a new profile
    fn stop(&mut self) -> Result<(), DeviceError>;

    /// Read one frame from the named stream
    fn read_frame(&mut self, tag: StreamTag) -> Result<SensorFrame, DeviceError>;

    /// Fixed wait after `start` before output is considered stable
    fn settle_delay(&self) -> Duration;
}
