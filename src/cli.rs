// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for capture operations
//!
//! These stand in for the networked request layer: each command drives the
//! same [`CaptureCoordinator`] façade a front-end would.

use samplecam::device::CameraDevice;
use samplecam::device::driver::SensorDriver;
use samplecam::device::synthetic::SyntheticSensor;
use samplecam::storage::{MountLocator, TransferStatus};
use samplecam::{CaptureCoordinator, Config};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;

/// How long commands wait for a transfer before reporting it as still
/// running
const TRANSFER_WAIT: Duration = Duration::from_secs(30);

fn open_sensor(config: &Config, synthetic: bool) -> Result<Box<dyn SensorDriver>, Box<dyn std::error::Error>> {
    #[cfg(feature = "v4l2")]
    if !synthetic {
        let sensor = samplecam::device::v4l2::V4l2Sensor::open(&config.device_path)?;
        return Ok(Box::new(sensor));
    }

    #[cfg(not(feature = "v4l2"))]
    if !synthetic {
        info!("Built without the v4l2 feature, using the synthetic sensor");
    }

    let _ = config;
    Ok(Box::new(SyntheticSensor::new()))
}

fn build_coordinator(
    config: Config,
    synthetic: bool,
) -> Result<CaptureCoordinator, Box<dyn std::error::Error>> {
    let sensor = open_sensor(&config, synthetic)?;
    let device = CameraDevice::new(sensor);
    info!(driver = device.driver_name(), "Sensor opened");
    Ok(CaptureCoordinator::new(device, config)?)
}

fn report_transfer(coordinator: &CaptureCoordinator, path: &std::path::Path) {
    match coordinator.wait_transfer(path, TRANSFER_WAIT) {
        TransferStatus::Completed => println!("Transferred to removable storage."),
        TransferStatus::Failed(e) => {
            println!("Transfer failed: {}", e);
            println!("File kept at {}", path.display());
        }
        other => println!(
            "Transfer still {} - poll again later; file at {}",
            other.as_str(),
            path.display()
        ),
    }
}

/// Capture one still and wait for its transfer
pub fn take_still(
    config: Config,
    synthetic: bool,
    sample_id: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let coordinator = build_coordinator(config, synthetic)?;

    let capture = coordinator.take_still(sample_id)?;
    println!("Still captured: {}", capture.local_path.display());

    report_transfer(&coordinator, &capture.local_path);
    Ok(())
}

/// Record a clip, stopping early on Ctrl-C
pub fn record(
    config: Config,
    synthetic: bool,
    duration_secs: u64,
    sample_id: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let coordinator = build_coordinator(config, synthetic)?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || {
        interrupted_flag.store(true, Ordering::SeqCst);
    })?;

    let handle = coordinator.start_recording(Duration::from_secs(duration_secs), sample_id)?;
    println!(
        "Recording session {} started ({}s, Ctrl-C to stop early)",
        handle.session_id, duration_secs
    );

    loop {
        if interrupted.load(Ordering::SeqCst) {
            println!("Stopping...");
            coordinator.stop_recording(handle.session_id)?;
            break;
        }
        match coordinator.recording_state() {
            Some((_, state)) if state.is_terminal() => break,
            Some(_) => std::thread::sleep(Duration::from_millis(100)),
            None => break,
        }
    }

    match coordinator.recording_state() {
        Some((_, state)) => println!("Recording {}: {}", state, handle.output_path.display()),
        None => println!("Recording ended"),
    }

    report_transfer(&coordinator, &handle.output_path);
    Ok(())
}

/// Save `count` preview frames into a directory
pub fn preview(
    config: Config,
    synthetic: bool,
    count: u32,
    out: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let coordinator = build_coordinator(config, synthetic)?;
    let out_dir = out.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&out_dir)?;

    let frames = coordinator.preview_frames()?;
    let cancel = frames.cancel_handle();
    ctrlc::set_handler(move || cancel.cancel())?;

    let mut saved = 0u32;
    for (index, jpeg) in frames.take(count as usize).enumerate() {
        let path = out_dir.join(format!("preview_{:04}.jpg", index));
        std::fs::write(&path, &jpeg)?;
        saved += 1;
    }

    println!("Saved {} preview frames to {}", saved, out_dir.display());
    Ok(())
}

/// Report whether a removable volume is attached
pub fn storage_status(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let locator = MountLocator::with_roots(config.mount_roots.clone());

    match locator.find_mount() {
        Some(mount) => {
            println!("Removable storage: {}", mount.root.display());
            println!("  device: {} ({})", mount.device, mount.fs_type);
            match mount.free_bytes() {
                Some(free) => println!("  free:   {} MiB", free / (1024 * 1024)),
                None => println!("  free:   unknown"),
            }
        }
        None => println!("No removable storage attached."),
    }

    Ok(())
}
