// SPDX-License-Identifier: GPL-3.0-only

use crate::constants::{
    DEFAULT_MOUNT_ROOTS, PREVIEW_JPEG_QUALITY, STAGING_DIR_NAME, STILL_JPEG_QUALITY,
    VIDEO_JPEG_QUALITY,
};
use crate::device::{CameraMode, ModeProfile, PixelFormat};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Sensor profiles for the three camera modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeProfiles {
    pub preview: ModeProfile,
    pub still: ModeProfile,
    pub video: ModeProfile,
}

impl ModeProfiles {
    /// Profile for a camera mode
    pub fn get(&self, mode: CameraMode) -> &ModeProfile {
        match mode {
            CameraMode::Preview => &self.preview,
            CameraMode::Still => &self.still,
            CameraMode::Video => &self.video,
        }
    }
}

impl Default for ModeProfiles {
    fn default() -> Self {
        // Preview and still share the full-resolution profile so a still
        // needs no reconfiguration delay after streaming; video drops the
        // main stream to 1080p for frame-rate headroom
        let fullres = ModeProfile {
            width: 3840,
            height: 2160,
            lores_width: 1024,
            lores_height: 768,
            pixel_format: PixelFormat::Yuyv,
            frame_rate: 30,
        };
        Self {
            preview: fullres,
            still: fullres,
            video: ModeProfile {
                width: 1920,
                height: 1080,
                lores_width: 640,
                lores_height: 480,
                pixel_format: PixelFormat::Yuyv,
                frame_rate: 15,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sensor profiles per camera mode
    pub modes: ModeProfiles,
    /// Staging directory for in-flight captures (system temp dir when unset)
    pub staging_dir: Option<PathBuf>,
    /// V4L2 capture node used when built with the `v4l2` feature
    pub device_path: PathBuf,
    /// JPEG quality of preview stream frames
    pub preview_quality: u8,
    /// JPEG quality of full-resolution stills
    pub still_quality: u8,
    /// JPEG quality of recorded video frames
    pub video_quality: u8,
    /// Mount-table roots scanned for removable volumes
    pub mount_roots: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            modes: ModeProfiles::default(),
            staging_dir: None,
            device_path: PathBuf::from("/dev/video0"),
            preview_quality: PREVIEW_JPEG_QUALITY,
            still_quality: STILL_JPEG_QUALITY,
            video_quality: VIDEO_JPEG_QUALITY,
            mount_roots: DEFAULT_MOUNT_ROOTS.iter().copied().map(PathBuf::from).collect(),
        }
    }
}

impl Config {
    /// Default config file location under the user config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(STAGING_DIR_NAME).join("config.json"))
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("read {}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| AppError::Config(format!("parse {}: {}", path.display(), e)))
    }

    /// Load from an explicit path, or from the default location, falling
    /// back to defaults when no file exists
    pub fn load_or_default(path: Option<&Path>) -> AppResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match Self::default_path() {
                Some(default) if default.is_file() => Self::load(&default),
                _ => {
                    debug!("No config file found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    /// Resolved staging directory for in-flight captures
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(STAGING_DIR_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profiles() {
        let config = Config::default();
        assert_eq!(config.modes.preview, config.modes.still);
        assert_eq!(config.modes.video.frame_rate, 15);
        assert_eq!(
            config.modes.get(CameraMode::Video).dims(crate::device::StreamTag::Lores),
            (640, 480)
        );
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"preview_quality": 60}"#).unwrap();
        assert_eq!(config.preview_quality, 60);
        assert_eq!(config.still_quality, Config::default().still_quality);
    }
}
