// SPDX-License-Identifier: GPL-3.0-only

//! Capture coordination façade
//!
//! [`CaptureCoordinator`] is what the request layer calls. It owns the
//! mode controller, the transfer manager, and the single recording
//! session slot, and enforces the global policy: a still capture, a
//! recording start, and a mode change are mutually exclusive, and at most
//! one recording session is non-terminal at any time.

use crate::config::Config;
use crate::device::{CameraDevice, CameraMode};
use crate::errors::{AppError, AppResult, RecordingError};
use crate::mode::ModeController;
use crate::naming;
use crate::preview::{FrameStreamer, PreviewFrames};
use crate::recording::{RecordingSession, RecordingSpec, SessionState};
use crate::storage::{
    MediaCategory, MountInfo, MountLocator, StorageTransferManager, TransferStatus, TransferTask,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Outcome of a successful still capture
#[derive(Debug, Clone)]
pub struct StillCapture {
    /// Staging path of the saved JPEG
    pub local_path: PathBuf,
    /// Snapshot of the transfer task created for it
    pub transfer: TransferTask,
}

/// Handle to an accepted recording session
#[derive(Debug, Clone)]
pub struct RecordingHandle {
    pub session_id: u64,
    /// Staging path the finished container will land at
    pub output_path: PathBuf,
}

/// Synchronous façade over the capture core
pub struct CaptureCoordinator {
    config: Config,
    staging_dir: PathBuf,
    mode: Arc<ModeController>,
    transfers: Arc<StorageTransferManager>,
    streamer: FrameStreamer,
    locator: MountLocator,
    session: Mutex<Option<RecordingSession>>,
}

impl CaptureCoordinator {
    /// Build the coordinator around a camera device, discovering removable
    /// volumes under the configured mount roots
    pub fn new(device: CameraDevice, config: Config) -> AppResult<Self> {
        let locator = MountLocator::with_roots(config.mount_roots.clone());
        Self::with_locator(device, config, locator)
    }

    /// Build with an explicit mount locator
    pub fn with_locator(
        device: CameraDevice,
        config: Config,
        locator: MountLocator,
    ) -> AppResult<Self> {
        let staging_dir = config.staging_dir();
        std::fs::create_dir_all(&staging_dir).map_err(|e| {
            AppError::Storage(format!("create {}: {}", staging_dir.display(), e))
        })?;

        let mode = Arc::new(ModeController::new(device, config.modes)?);
        let transfers = Arc::new(StorageTransferManager::new(locator.clone()));
        let streamer = FrameStreamer::new(Arc::clone(&mode), config.preview_quality);

        info!(staging = %staging_dir.display(), "Capture coordinator ready");
        Ok(Self {
            config,
            staging_dir,
            mode,
            transfers,
            streamer,
            locator,
            session: Mutex::new(None),
        })
    }

    /// Staging directory for in-flight captures
    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Capture a full-resolution still and enqueue its transfer
    ///
    /// Rejected while a recording session is live: a still would tear the
    /// sensor out of Video mode mid-recording.
    pub fn take_still(&self, sample_id: Option<&str>) -> AppResult<StillCapture> {
        let slot = self.lock_session();
        if let Some(session) = slot.as_ref() {
            if !session.state().is_terminal() {
                return Err(RecordingError::ConcurrentSession.into());
            }
        }

        self.mode.request_mode(CameraMode::Still)?;

        let filename = naming::capture_filename(MediaCategory::Images, sample_id, "jpg");
        let path = self.staging_dir.join(filename);
        self.mode.capture_still(&path, self.config.still_quality)?;

        if let Err(e) = self.mode.request_mode(CameraMode::Preview) {
            warn!(error = %e, "Could not return to preview after still");
        }

        info!(path = %path.display(), "Still captured");
        let transfer = self.transfers.enqueue(path.clone(), MediaCategory::Images);
        Ok(StillCapture {
            local_path: path,
            transfer,
        })
    }

    /// Accept a recording request if no session is live
    pub fn start_recording(
        &self,
        duration: Duration,
        sample_id: Option<&str>,
    ) -> AppResult<RecordingHandle> {
        if duration.is_zero() {
            return Err(
                RecordingError::StartFailed("duration must be positive".to_string()).into(),
            );
        }

        let mut slot = self.lock_session();
        if let Some(session) = slot.as_ref() {
            if !session.state().is_terminal() {
                return Err(RecordingError::ConcurrentSession.into());
            }
        }

        let filename = naming::capture_filename(MediaCategory::Videos, sample_id, "avi");
        let output_path = self.staging_dir.join(filename);
        let spec = RecordingSpec {
            duration,
            output_path: output_path.clone(),
            profile: *self.config.modes.get(CameraMode::Video),
            jpeg_quality: self.config.video_quality,
        };

        let session = RecordingSession::start(
            Arc::clone(&self.mode),
            Arc::clone(&self.transfers),
            spec,
        )?;
        let handle = RecordingHandle {
            session_id: session.id(),
            output_path,
        };
        *slot = Some(session);
        Ok(handle)
    }

    /// Suspend sink writes of the live session
    pub fn pause_recording(&self, session_id: u64) -> AppResult<()> {
        let slot = self.lock_session();
        match slot.as_ref() {
            Some(session) if session.id() == session_id => Ok(session.pause()?),
            _ => Err(RecordingError::NotRecording.into()),
        }
    }

    /// Resume sink writes of the live session
    pub fn resume_recording(&self, session_id: u64) -> AppResult<()> {
        let slot = self.lock_session();
        match slot.as_ref() {
            Some(session) if session.id() == session_id => Ok(session.resume()?),
            _ => Err(RecordingError::NotRecording.into()),
        }
    }

    /// Stop the live session and return the finalized staging path
    pub fn stop_recording(&self, session_id: u64) -> AppResult<PathBuf> {
        let mut slot = self.lock_session();
        match slot.as_mut() {
            Some(session) if session.id() == session_id && !session.state().is_terminal() => {
                Ok(session.stop()?)
            }
            _ => Err(RecordingError::NotRecording.into()),
        }
    }

    /// Id and state of the most recent session, live or terminal
    pub fn recording_state(&self) -> Option<(u64, SessionState)> {
        self.lock_session()
            .as_ref()
            .map(|session| (session.id(), session.state()))
    }

    /// Block until the most recent session reaches a terminal state or
    /// `timeout` elapses
    pub fn wait_recording(&self, timeout: Duration) -> Option<SessionState> {
        let deadline = Instant::now() + timeout;
        loop {
            let state = self.recording_state()?.1;
            if state.is_terminal() || Instant::now() >= deadline {
                return Some(state);
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    /// Transfer status for a staging path
    pub fn query_transfer(&self, path: &Path) -> TransferStatus {
        self.transfers.query(path)
    }

    /// Poll a transfer until it reaches a terminal status
    pub fn wait_transfer(&self, path: &Path, timeout: Duration) -> TransferStatus {
        self.transfers.wait(path, timeout)
    }

    /// Start a preview frame sequence
    pub fn preview_frames(&self) -> AppResult<PreviewFrames> {
        Ok(self.streamer.frames()?)
    }

    /// Point-in-time removable storage status
    pub fn storage_status(&self) -> Option<MountInfo> {
        self.locator.find_mount()
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<RecordingSession>> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }
}
