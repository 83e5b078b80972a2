// SPDX-License-Identifier: GPL-3.0-only

//! Live preview stream
//!
//! [`FrameStreamer`] produces a lazy, infinite sequence of JPEG-encoded
//! preview frames from the low-resolution side-stream. Transient capture
//! errors never terminate the sequence; only the consumer's cancel handle
//! does. A single active consumer is assumed.

use crate::constants::PREVIEW_RETRY_INTERVAL;
use crate::device::{CameraMode, StreamTag};
use crate::errors::DeviceError;
use crate::media;
use crate::mode::ModeController;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// Cancellation handle for a preview sequence
///
/// Cloneable so a signal handler or control thread can end the stream
/// while the consumer blocks on the next frame.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// End the associated preview sequence after the current element
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Factory for preview frame sequences
pub struct FrameStreamer {
    mode: Arc<ModeController>,
    quality: u8,
}

impl FrameStreamer {
    pub fn new(mode: Arc<ModeController>, quality: u8) -> Self {
        Self { mode, quality }
    }

    /// Start a preview sequence
    ///
    /// Requests Preview mode first, unless a recording holds the device in
    /// Video mode: the side-stream keeps preview available during
    /// recording, so the mode is left alone in that case.
    pub fn frames(&self) -> Result<PreviewFrames, DeviceError> {
        match self.mode.current_mode() {
            CameraMode::Video => {}
            _ => self.mode.request_mode(CameraMode::Preview)?,
        }

        Ok(PreviewFrames {
            mode: Arc::clone(&self.mode),
            quality: self.quality,
            cancel: CancelHandle(Arc::new(AtomicBool::new(false))),
        })
    }
}

/// Infinite iterator of JPEG-encoded preview frames
pub struct PreviewFrames {
    mode: Arc<ModeController>,
    quality: u8,
    cancel: CancelHandle,
}

impl PreviewFrames {
    /// Handle that terminates this sequence from another thread
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}

impl Iterator for PreviewFrames {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        loop {
            if self.cancel.is_cancelled() {
                return None;
            }

            let frame = match self.mode.capture_frame(StreamTag::Lores) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "Preview capture failed, retrying");
                    std::thread::sleep(PREVIEW_RETRY_INTERVAL);
                    continue;
                }
            };

            let rgb = media::frame_to_rgb(&frame);
            match media::encode_jpeg(&rgb, frame.width, frame.height, self.quality) {
                Ok(jpeg) => return Some(jpeg),
                Err(e) => {
                    warn!(error = %e, "Preview encode failed, retrying");
                    std::thread::sleep(PREVIEW_RETRY_INTERVAL);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModeProfiles;
    use crate::constants::PREVIEW_JPEG_QUALITY;
    use crate::device::synthetic::SyntheticSensor;
    use crate::device::{CameraDevice, ModeProfile, PixelFormat};

    fn controller() -> Arc<ModeController> {
        let small = ModeProfile {
            width: 32,
            height: 24,
            lores_width: 16,
            lores_height: 12,
            pixel_format: PixelFormat::Rgb,
            frame_rate: 30,
        };
        let profiles = ModeProfiles {
            preview: small,
            still: small,
            video: small,
        };
        let device = CameraDevice::new(Box::new(SyntheticSensor::new()));
        Arc::new(ModeController::new(device, profiles).unwrap())
    }

    #[test]
    fn test_frames_are_jpeg() {
        let streamer = FrameStreamer::new(controller(), PREVIEW_JPEG_QUALITY);
        let mut frames = streamer.frames().unwrap();

        for _ in 0..3 {
            let jpeg = frames.next().unwrap();
            assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        }
    }

    #[test]
    fn test_cancel_terminates_sequence() {
        let streamer = FrameStreamer::new(controller(), PREVIEW_JPEG_QUALITY);
        let mut frames = streamer.frames().unwrap();
        let cancel = frames.cancel_handle();

        assert!(frames.next().is_some());
        cancel.cancel();
        assert!(frames.next().is_none());
    }

    #[test]
    fn test_streaming_enters_preview_mode() {
        let mode = controller();
        mode.request_mode(CameraMode::Still).unwrap();

        let streamer = FrameStreamer::new(Arc::clone(&mode), PREVIEW_JPEG_QUALITY);
        let _frames = streamer.frames().unwrap();
        assert_eq!(mode.current_mode(), CameraMode::Preview);
    }

    #[test]
    fn test_video_mode_left_alone() {
        let mode = controller();
        mode.request_mode(CameraMode::Video).unwrap();

        let streamer = FrameStreamer::new(Arc::clone(&mode), PREVIEW_JPEG_QUALITY);
        let mut frames = streamer.frames().unwrap();
        assert!(frames.next().is_some());
        assert_eq!(mode.current_mode(), CameraMode::Video);
    }
}
