// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end tests of the capture coordinator against the synthetic
//! sensor: mode policy, recording lifecycle, and storage handoff.

use samplecam::config::ModeProfiles;
use samplecam::coordinator::CaptureCoordinator;
use samplecam::device::synthetic::SyntheticSensor;
use samplecam::device::{CameraDevice, ModeProfile, PixelFormat};
use samplecam::errors::{AppError, RecordingError, TransferError};
use samplecam::recording::SessionState;
use samplecam::storage::{MountLocator, TransferStatus};
use samplecam::Config;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

struct Fixture {
    _tmp: tempfile::TempDir,
    coordinator: CaptureCoordinator,
    volume: PathBuf,
}

fn test_config(staging: &Path) -> Config {
    let small = ModeProfile {
        width: 48,
        height: 32,
        lores_width: 24,
        lores_height: 16,
        pixel_format: PixelFormat::Rgb,
        frame_rate: 20,
    };
    Config {
        modes: ModeProfiles {
            preview: small,
            still: ModeProfile {
                width: 64,
                height: 48,
                ..small
            },
            video: ModeProfile {
                width: 32,
                height: 24,
                ..small
            },
        },
        staging_dir: Some(staging.to_path_buf()),
        ..Config::default()
    }
}

/// Coordinator over the synthetic sensor, with a fake mount table that
/// optionally lists one removable volume
fn fixture(with_volume: bool) -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let staging = tmp.path().join("staging");
    let volume = tmp.path().join("media/usb0");

    let mut lines = vec!["/dev/root / ext4 rw 0 0".to_string()];
    if with_volume {
        std::fs::create_dir_all(&volume).unwrap();
        lines.push(format!("/dev/sda1 {} vfat rw 0 0", volume.display()));
    }
    let table = tmp.path().join("mounts");
    std::fs::write(&table, lines.join("\n")).unwrap();
    let locator = MountLocator::with_table(table, vec![tmp.path().join("media")]);

    let device = CameraDevice::new(Box::new(SyntheticSensor::new()));
    let coordinator =
        CaptureCoordinator::with_locator(device, test_config(&staging), locator).unwrap();

    Fixture {
        _tmp: tmp,
        coordinator,
        volume,
    }
}

fn wait_for_state(coordinator: &CaptureCoordinator, wanted: SessionState) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if coordinator.recording_state().map(|(_, s)| s) == Some(wanted) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

fn assert_riff(path: &Path) {
    let bytes = std::fs::read(path).unwrap();
    assert_eq!(&bytes[0..4], b"RIFF", "finalized container magic");
    assert_eq!(&bytes[8..12], b"AVI ");
}

#[test]
fn test_still_without_storage_keeps_local_file() {
    let f = fixture(false);

    let capture = f.coordinator.take_still(None).unwrap();
    let jpeg = std::fs::read(&capture.local_path).unwrap();
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "still is a JPEG");

    let status = f
        .coordinator
        .wait_transfer(&capture.local_path, Duration::from_secs(5));
    assert!(matches!(
        status,
        TransferStatus::Failed(TransferError::NoRemovableStorage)
    ));
    assert!(
        capture.local_path.exists(),
        "staging file survives a failed transfer"
    );
}

#[test]
fn test_still_with_storage_lands_in_images() {
    let f = fixture(true);

    let capture = f.coordinator.take_still(Some("run42")).unwrap();
    let name = capture.local_path.file_name().unwrap().to_owned();
    assert!(name.to_string_lossy().starts_with("run42_"));

    let status = f
        .coordinator
        .wait_transfer(&capture.local_path, Duration::from_secs(5));
    assert!(matches!(status, TransferStatus::Completed));
    assert!(!capture.local_path.exists(), "staging file moved");
    assert!(f.volume.join("images").join(name).exists());
}

#[test]
fn test_rapid_stills_get_distinct_names() {
    let f = fixture(false);

    let a = f.coordinator.take_still(Some("s")).unwrap();
    let b = f.coordinator.take_still(Some("s")).unwrap();
    assert_ne!(a.local_path, b.local_path);
}

#[test]
fn test_recording_completes_and_transfers() {
    let f = fixture(true);

    let handle = f
        .coordinator
        .start_recording(Duration::from_millis(500), None)
        .unwrap();

    let state = f.coordinator.wait_recording(Duration::from_secs(10));
    assert_eq!(state, Some(SessionState::Completed));

    let status = f
        .coordinator
        .wait_transfer(&handle.output_path, Duration::from_secs(5));
    assert!(matches!(status, TransferStatus::Completed));

    let dest = f
        .volume
        .join("videos")
        .join(handle.output_path.file_name().unwrap());
    assert_riff(&dest);
}

#[test]
fn test_concurrent_start_rejected() {
    let f = fixture(false);

    let handle = f
        .coordinator
        .start_recording(Duration::from_secs(30), None)
        .unwrap();

    let second = f.coordinator.start_recording(Duration::from_secs(5), None);
    assert!(matches!(
        second,
        Err(AppError::Recording(RecordingError::ConcurrentSession))
    ));

    // The rejection left the live session untouched
    let (id, state) = f.coordinator.recording_state().unwrap();
    assert_eq!(id, handle.session_id);
    assert!(!state.is_terminal());

    f.coordinator.stop_recording(handle.session_id).unwrap();
}

#[test]
fn test_early_stop_finalizes_short_file() {
    let f = fixture(false);

    let handle = f
        .coordinator
        .start_recording(Duration::from_secs(60), None)
        .unwrap();
    std::thread::sleep(Duration::from_millis(300));

    let path = f.coordinator.stop_recording(handle.session_id).unwrap();
    assert_eq!(
        f.coordinator.recording_state(),
        Some((handle.session_id, SessionState::Completed))
    );
    assert_riff(&path);
}

#[test]
fn test_pause_resume_keeps_container_valid() {
    let f = fixture(true);

    let handle = f
        .coordinator
        .start_recording(Duration::from_secs(60), None)
        .unwrap();
    std::thread::sleep(Duration::from_millis(150));

    f.coordinator.pause_recording(handle.session_id).unwrap();
    assert!(wait_for_state(&f.coordinator, SessionState::Paused));

    f.coordinator.resume_recording(handle.session_id).unwrap();
    assert!(wait_for_state(&f.coordinator, SessionState::Recording));

    f.coordinator.stop_recording(handle.session_id).unwrap();

    let status = f
        .coordinator
        .wait_transfer(&handle.output_path, Duration::from_secs(5));
    assert!(matches!(status, TransferStatus::Completed));
    let dest = f
        .volume
        .join("videos")
        .join(handle.output_path.file_name().unwrap());
    assert_riff(&dest);
}

#[test]
fn test_still_rejected_while_recording() {
    let f = fixture(false);

    let handle = f
        .coordinator
        .start_recording(Duration::from_secs(30), None)
        .unwrap();

    assert!(matches!(
        f.coordinator.take_still(None),
        Err(AppError::Recording(RecordingError::ConcurrentSession))
    ));

    f.coordinator.stop_recording(handle.session_id).unwrap();

    // A terminal session no longer blocks stills
    assert!(f.coordinator.take_still(None).is_ok());
}

#[test]
fn test_preview_available_during_recording() {
    let f = fixture(false);

    let handle = f
        .coordinator
        .start_recording(Duration::from_secs(30), None)
        .unwrap();

    let mut frames = f.coordinator.preview_frames().unwrap();
    for _ in 0..3 {
        let jpeg = frames.next().unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }
    drop(frames);

    f.coordinator.stop_recording(handle.session_id).unwrap();
}

#[test]
fn test_unknown_session_operations() {
    let f = fixture(false);

    assert!(matches!(
        f.coordinator.pause_recording(9999),
        Err(AppError::Recording(RecordingError::NotRecording))
    ));
    assert!(matches!(
        f.coordinator.stop_recording(9999),
        Err(AppError::Recording(RecordingError::NotRecording))
    ));
}

#[test]
fn test_zero_duration_rejected() {
    let f = fixture(false);

    assert!(matches!(
        f.coordinator.start_recording(Duration::ZERO, None),
        Err(AppError::Recording(RecordingError::StartFailed(_)))
    ));
}

#[test]
fn test_stop_after_natural_completion_is_not_recording() {
    let f = fixture(false);

    let handle = f
        .coordinator
        .start_recording(Duration::from_millis(200), None)
        .unwrap();
    let state = f.coordinator.wait_recording(Duration::from_secs(10));
    assert_eq!(state, Some(SessionState::Completed));

    assert!(matches!(
        f.coordinator.stop_recording(handle.session_id),
        Err(AppError::Recording(RecordingError::NotRecording))
    ));
}
