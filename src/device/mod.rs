// SPDX-License-Identifier: GPL-3.0-only

//! Camera device abstraction
//!
//! [`CameraDevice`] owns the single hardware sensor handle behind a
//! [`SensorDriver`] trait object. It knows how to reconfigure the sensor
//! for a mode profile and how to pull frames, and nothing about files,
//! threads, or who is allowed to call it when; that exclusion lives in
//! [`crate::mode::ModeController`].

pub mod driver;
pub mod synthetic;
#[cfg(feature = "v4l2")]
pub mod v4l2;

use crate::errors::DeviceError;
use crate::media;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub use driver::SensorDriver;

/// Camera hardware configuration profiles
///
/// Exactly one mode is active on the device at any instant; switching
/// requires a full stop/reconfigure/start cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraMode {
    /// Low-latency streaming configuration
    Preview,
    /// Full-resolution still configuration
    Still,
    /// Recording configuration
    Video,
}

impl std::fmt::Display for CameraMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraMode::Preview => write!(f, "preview"),
            CameraMode::Still => write!(f, "still"),
            CameraMode::Video => write!(f, "video"),
        }
    }
}

/// Pixel layout of frames produced by a sensor driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Packed 8-bit RGB
    Rgb,
    /// YUV 4:2:2 (Y0 U Y1 V), converted to RGB in userspace
    Yuyv,
}

/// Internal sensor stream to read from
///
/// A full-resolution main stream and a low-resolution side-stream coexist
/// in every mode, so preview stays available while recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTag {
    /// Full-resolution stream (stills, recording)
    Main,
    /// Low-resolution side-stream (preview)
    Lores,
}

/// Resolution, pixel format and frame rate for one camera mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeProfile {
    /// Main-stream width
    pub width: u32,
    /// Main-stream height
    pub height: u32,
    /// Side-stream width
    pub lores_width: u32,
    /// Side-stream height
    pub lores_height: u32,
    /// Pixel format requested from the driver
    pub pixel_format: PixelFormat,
    /// Target frame rate
    pub frame_rate: u32,
}

impl ModeProfile {
    /// Dimensions of the named stream
    pub fn dims(&self, tag: StreamTag) -> (u32, u32) {
        match tag {
            StreamTag::Main => (self.width, self.height),
            StreamTag::Lores => (self.lores_width, self.lores_height),
        }
    }

    /// Per-frame time budget for the target frame rate
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.frame_rate.max(1) as f64)
    }
}

/// One decoded frame from the sensor
#[derive(Debug, Clone)]
pub struct SensorFrame {
    /// Pixel data in `format` layout
    pub data: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// When the frame was read from the driver
    pub captured_at: Instant,
}

/// The single hardware sensor handle
pub struct CameraDevice {
    driver: Box<dyn SensorDriver>,
    running: bool,
}

impl CameraDevice {
    /// Wrap a sensor driver; the device starts unconfigured
    pub fn new(driver: Box<dyn SensorDriver>) -> Self {
        Self {
            driver,
            running: false,
        }
    }

    /// Name of the underlying driver, for logging
    pub fn driver_name(&self) -> &str {
        self.driver.name()
    }

    /// Apply a mode profile: stop the sensor if running, reconfigure,
    /// restart, and block for the driver's settle delay so the output is
    /// stable before the first read.
    pub fn configure(&mut self, profile: &ModeProfile) -> Result<(), DeviceError> {
        if self.running {
            self.driver.stop()?;
            self.running = false;
        }

        self.driver.start(profile)?;
        self.running = true;

        let settle = self.driver.settle_delay();
        debug!(
            driver = %self.driver.name(),
            width = profile.width,
            height = profile.height,
            fps = profile.frame_rate,
            settle_ms = settle.as_millis() as u64,
            "Sensor reconfigured"
        );
        std::thread::sleep(settle);

        Ok(())
    }

    /// Read one frame from the named stream
    pub fn capture_frame(&mut self, tag: StreamTag) -> Result<SensorFrame, DeviceError> {
        if !self.running {
            return Err(DeviceError::NotConfigured);
        }
        self.driver.read_frame(tag)
    }

    /// Capture a main-stream frame straight to a JPEG file at `path`
    pub fn capture_still(&mut self, path: &Path, quality: u8) -> Result<(), DeviceError> {
        let frame = self.capture_frame(StreamTag::Main)?;
        let rgb = media::frame_to_rgb(&frame);
        let jpeg = media::encode_jpeg(&rgb, frame.width, frame.height, quality)
            .map_err(DeviceError::CaptureFailed)?;
        std::fs::write(path, &jpeg)
            .map_err(|e| DeviceError::CaptureFailed(format!("write {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), bytes = jpeg.len(), "Still saved");
        Ok(())
    }
}

impl std::fmt::Debug for CameraDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraDevice")
            .field("driver", &self.driver.name())
            .field("running", &self.running)
            .finish()
    }
}
