// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic test-pattern sensor
//!
//! Stands in for real hardware in tests and on development machines built
//! without the `v4l2` feature. Produces an RGB gradient with a moving
//! vertical bar so consecutive frames differ.

use super::driver::SensorDriver;
use super::{ModeProfile, PixelFormat, SensorFrame, StreamTag};
use crate::errors::DeviceError;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Software sensor generating deterministic test frames
pub struct SyntheticSensor {
    profile: Option<ModeProfile>,
    frame_counter: u64,
    settle: Duration,
}

impl SyntheticSensor {
    pub fn new() -> Self {
        Self {
            profile: None,
            frame_counter: 0,
            settle: Duration::from_millis(5),
        }
    }

    fn render(width: u32, height: u32, counter: u64) -> Vec<u8> {
        let w = width as usize;
        let h = height as usize;
        let bar = (counter as usize * 4) % w.max(1);
        let mut rgb = vec![0u8; w * h * 3];

        for y in 0..h {
            for x in 0..w {
                let idx = (y * w + x) * 3;
                if x == bar {
                    rgb[idx] = 255;
                    rgb[idx + 1] = 255;
                    rgb[idx + 2] = 255;
                } else {
                    rgb[idx] = (x * 255 / w.max(1)) as u8;
                    rgb[idx + 1] = (y * 255 / h.max(1)) as u8;
                    rgb[idx + 2] = 64;
                }
            }
        }

        rgb
    }
}

impl Default for SyntheticSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorDriver for SyntheticSensor {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn start(&mut self, profile: &ModeProfile) -> Result<(), DeviceError> {
        self.profile = Some(*profile);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.profile = None;
        Ok(())
    }

    fn read_frame(&mut self, tag: StreamTag) -> Result<SensorFrame, DeviceError> {
        let profile = self.profile.ok_or(DeviceError::NotConfigured)?;
        let (width, height) = profile.dims(tag);
        let rgb = Self::render(width, height, self.frame_counter);
        self.frame_counter += 1;

        Ok(SensorFrame {
            data: Arc::from(rgb),
            width,
            height,
            format: PixelFormat::Rgb,
            captured_at: Instant::now(),
        })
    }

    fn settle_delay(&self) -> Duration {
        self.settle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> ModeProfile {
        ModeProfile {
            width: 16,
            height: 8,
            lores_width: 8,
            lores_height: 4,
            pixel_format: PixelFormat::Rgb,
            frame_rate: 30,
        }
    }

    #[test]
    fn test_frames_differ_between_reads() {
        let mut sensor = SyntheticSensor::new();
        sensor.start(&profile()).unwrap();

        let a = sensor.read_frame(StreamTag::Main).unwrap();
        let b = sensor.read_frame(StreamTag::Main).unwrap();
        assert_ne!(a.data, b.data);
    }

    #[test]
    fn test_stop_clears_profile() {
        let mut sensor = SyntheticSensor::new();
        sensor.start(&profile()).unwrap();
        sensor.stop().unwrap();
        assert!(matches!(
            sensor.read_frame(StreamTag::Lores),
            Err(DeviceError::NotConfigured)
        ));
    }
}
