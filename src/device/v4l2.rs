// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 kernel sensor driver
//!
//! Drives a `/dev/video*` capture node through the `v4l` crate. The kernel
//! exposes a single capture stream, so the low-resolution side-stream is
//! derived by downsampling the main stream in userspace.

use super::driver::SensorDriver;
use super::{ModeProfile, PixelFormat, SensorFrame, StreamTag};
use crate::constants::SENSOR_SETTLE_DELAY;
use crate::errors::DeviceError;
use crate::media;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::video::capture::Parameters;
use v4l::{Device, Format, FourCC};

/// Sensor driver backed by a V4L2 capture device
pub struct V4l2Sensor {
    path: PathBuf,
    device: Option<Device>,
    profile: Option<ModeProfile>,
}

impl V4l2Sensor {
    /// Open the capture node at `path` (e.g. `/dev/video0`)
    pub fn open(path: &Path) -> Result<Self, DeviceError> {
        let device = Device::with_path(path)
            .map_err(|e| DeviceError::ConfigureFailed(format!("open {}: {}", path.display(), e)))?;
        Ok(Self {
            path: path.to_path_buf(),
            device: Some(device),
            profile: None,
        })
    }

    fn read_main(&mut self) -> Result<SensorFrame, DeviceError> {
        let profile = self.profile.ok_or(DeviceError::NotConfigured)?;
        let device = self.device.as_ref().ok_or(DeviceError::NotConfigured)?;

        // TODO: keep the mmap stream alive across reads once the stream can
        // be stored without borrowing the device handle
        let mut stream = MmapStream::with_buffers(device, Type::VideoCapture, 2)
            .map_err(|e| DeviceError::CaptureFailed(format!("stream: {}", e)))?;

        let (buf, meta) = stream
            .next()
            .map_err(|e| DeviceError::CaptureFailed(format!("read: {}", e)))?;

        let used = meta.bytesused as usize;
        let len = if used > 0 { used.min(buf.len()) } else { buf.len() };
        let expected = (profile.width * profile.height * 2) as usize;
        if len < expected {
            return Err(DeviceError::CaptureFailed(format!(
                "short frame: {} of {} bytes",
                len, expected
            )));
        }

        Ok(SensorFrame {
            data: Arc::from(&buf[..expected]),
            width: profile.width,
            height: profile.height,
            format: PixelFormat::Yuyv,
            captured_at: Instant::now(),
        })
    }
}

impl SensorDriver for V4l2Sensor {
    fn name(&self) -> &str {
        "v4l2"
    }

    fn start(&mut self, profile: &ModeProfile) -> Result<(), DeviceError> {
        let device = self.device.as_ref().ok_or(DeviceError::NotConfigured)?;

        let format = Format::new(profile.width, profile.height, FourCC::new(b"YUYV"));
        let applied = device
            .set_format(&format)
            .map_err(|e| DeviceError::ConfigureFailed(format!("set_format: {}", e)))?;
        if applied.width != profile.width || applied.height != profile.height {
            warn!(
                requested_width = profile.width,
                requested_height = profile.height,
                applied_width = applied.width,
                applied_height = applied.height,
                "Driver adjusted requested resolution"
            );
        }

        if let Err(e) = device.set_params(&Parameters::with_fps(profile.frame_rate)) {
            // Not every driver supports frame interval negotiation
            debug!(error = %e, "set_params rejected, keeping driver default rate");
        }

        self.profile = Some(ModeProfile {
            width: applied.width,
            height: applied.height,
            ..*profile
        });
        debug!(
            path = %self.path.display(),
            width = applied.width,
            height = applied.height,
            "V4L2 sensor configured"
        );
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.profile = None;
        Ok(())
    }

    fn read_frame(&mut self, tag: StreamTag) -> Result<SensorFrame, DeviceError> {
        let profile = self.profile.ok_or(DeviceError::NotConfigured)?;
        let frame = self.read_main()?;

        match tag {
            StreamTag::Main => Ok(frame),
            StreamTag::Lores => {
                let rgb = media::frame_to_rgb(&frame);
                let (lw, lh) = profile.dims(StreamTag::Lores);
                let lores = media::downsample_rgb(&rgb, frame.width, frame.height, lw, lh);
                Ok(SensorFrame {
                    data: Arc::from(lores),
                    width: lw,
                    height: lh,
                    format: PixelFormat::Rgb,
                    captured_at: frame.captured_at,
                })
            }
        }
    }

    fn settle_delay(&self) -> Duration {
        SENSOR_SETTLE_DELAY
    }
}
