// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration handling

use samplecam::Config;
use samplecam::device::CameraMode;

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.modes.get(CameraMode::Still).width, 3840);
    assert_eq!(config.modes.get(CameraMode::Video).frame_rate, 15);
    assert!(
        !config.mount_roots.is_empty(),
        "Removable volume roots should have defaults"
    );
}

#[test]
fn test_load_written_config() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.json");

    let mut config = Config::default();
    config.preview_quality = 65;
    config.staging_dir = Some(tmp.path().join("staging"));
    std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.staging_dir(), tmp.path().join("staging"));
}

#[test]
fn test_load_missing_file_is_error() {
    let tmp = tempfile::tempdir().unwrap();
    assert!(Config::load(&tmp.path().join("nope.json")).is_err());
}
