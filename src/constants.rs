// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// JPEG quality for preview stream frames (matches the MJPEG feed quality
/// the hardware UI expects)
pub const PREVIEW_JPEG_QUALITY: u8 = 80;

/// JPEG quality for full-resolution stills
pub const STILL_JPEG_QUALITY: u8 = 92;

/// JPEG quality for recorded video frames
pub const VIDEO_JPEG_QUALITY: u8 = 85;

/// How long the preview stream sleeps after a transient capture error
/// before retrying
pub const PREVIEW_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// How often a paused capture loop re-checks the pause flag
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Backoff between retries of a transient frame-read error inside the
/// recording loop
pub const CAPTURE_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Consecutive frame-read errors after which a recording session fails
pub const MAX_CAPTURE_RETRIES: u32 = 10;

/// Upper bound on how long `stop()` waits for the capture loop to observe
/// the stop flag and finalize the sink
pub const STOP_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Polling interval used when waiting for a transfer to reach a terminal
/// status
pub const TRANSFER_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Settle delay applied after reconfiguring a hardware sensor
pub const SENSOR_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Name of the staging directory created under the system temp dir when no
/// override is configured
pub const STAGING_DIR_NAME: &str = "samplecam";

/// Mount-table roots under which removable volumes are expected to appear
pub const DEFAULT_MOUNT_ROOTS: &[&str] = &["/media", "/run/media", "/mnt"];
