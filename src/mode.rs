// SPDX-License-Identifier: GPL-3.0-only

//! Mode transition serialization
//!
//! [`ModeController`] is the only component allowed to reconfigure the
//! sensor. A single lock guards the device handle together with the
//! current-mode value, so a transition never overlaps another transition
//! or a frame read: a second caller simply blocks for the duration of the
//! first (bounded by the settle delay). Requests are not queued.

use crate::config::ModeProfiles;
use crate::device::{CameraDevice, CameraMode, SensorFrame, StreamTag};
use crate::errors::DeviceError;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

struct ModeInner {
    device: CameraDevice,
    current: CameraMode,
}

/// Mutual-exclusion state machine over Preview/Still/Video
pub struct ModeController {
    inner: Mutex<ModeInner>,
    profiles: ModeProfiles,
}

impl ModeController {
    /// Take ownership of the device and enter Preview mode
    pub fn new(mut device: CameraDevice, profiles: ModeProfiles) -> Result<Self, DeviceError> {
        device.configure(profiles.get(CameraMode::Preview))?;
        info!(driver = %device.driver_name(), "Sensor started in preview mode");
        Ok(Self {
            inner: Mutex::new(ModeInner {
                device,
                current: CameraMode::Preview,
            }),
            profiles,
        })
    }

    /// Currently active mode
    pub fn current_mode(&self) -> CameraMode {
        self.lock().current
    }

    /// Switch the device to `target`, blocking the caller for the settle
    /// delay. No-op when already in `target`.
    pub fn request_mode(&self, target: CameraMode) -> Result<(), DeviceError> {
        let mut inner = self.lock();
        if inner.current == target {
            return Ok(());
        }

        info!(from = %inner.current, to = %target, "Switching camera mode");
        inner.device.configure(self.profiles.get(target))?;
        inner.current = target;
        Ok(())
    }

    /// Read one frame under the reconfiguration lock
    pub fn capture_frame(&self, tag: StreamTag) -> Result<SensorFrame, DeviceError> {
        self.lock().device.capture_frame(tag)
    }

    /// Capture a still to `path` under the reconfiguration lock
    pub fn capture_still(&self, path: &Path, quality: u8) -> Result<(), DeviceError> {
        self.lock().device.capture_still(path, quality)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ModeInner> {
        // A panic while holding this lock leaves the device in an unknown
        // state anyway, so poisoning is not recoverable here
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
