// SPDX-License-Identifier: GPL-3.0-only

//! Recording session lifecycle
//!
//! One [`RecordingSession`] drives a timed capture loop on a dedicated
//! thread, writing frames into an MJPEG sink. The control plane interacts
//! with the loop only through flags (pause, stop) and the shared state
//! value; the sink itself sits behind a lock shared between the loop and
//! `stop()`, so a finalize never races an in-flight frame write.

pub mod sink;

use crate::constants::{
    CAPTURE_RETRY_DELAY, MAX_CAPTURE_RETRIES, PAUSE_POLL_INTERVAL, STOP_WAIT_TIMEOUT,
};
use crate::device::{CameraMode, ModeProfile, StreamTag};
use crate::errors::RecordingError;
use crate::media;
use crate::mode::ModeController;
use crate::storage::{MediaCategory, StorageTransferManager};
use chrono::{DateTime, Local};
use sink::MjpegSink;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle state of one recording attempt
///
/// `Starting -> Recording <-> Paused -> Stopping -> {Completed, Failed}`.
/// The idle state is represented by the absence of a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Recording,
    Paused,
    Stopping,
    Completed,
    Failed,
}

impl SessionState {
    /// Terminal states permit a new session to be created
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SessionState::Starting => "starting",
            SessionState::Recording => "recording",
            SessionState::Paused => "paused",
            SessionState::Stopping => "stopping",
            SessionState::Completed => "completed",
            SessionState::Failed => "failed",
        };
        write!(f, "{}", label)
    }
}

/// Parameters for one recording attempt
#[derive(Debug, Clone)]
pub struct RecordingSpec {
    /// Wall-clock recording budget (best-effort, not frame-exact)
    pub duration: Duration,
    /// Staging path of the output container
    pub output_path: PathBuf,
    /// Video mode profile (resolution and frame rate of the sink)
    pub profile: ModeProfile,
    /// JPEG quality of encoded frames
    pub jpeg_quality: u8,
}

struct SessionShared {
    state: Mutex<SessionState>,
    paused: AtomicBool,
    stop_requested: AtomicBool,
    frames_written: AtomicU64,
    sink: Mutex<Option<MjpegSink>>,
    last_error: Mutex<Option<RecordingError>>,
}

impl SessionShared {
    fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    fn set_state(&self, state: SessionState) {
        *lock(&self.state) = state;
    }

    fn lock_sink(&self) -> MutexGuard<'_, Option<MjpegSink>> {
        lock(&self.sink)
    }

    /// Move to Failed, closing the partial sink as cleanly as possible.
    /// The partial file stays in staging for inspection.
    fn fail(&self, err: RecordingError) {
        error!(error = %err, "Recording session failed");
        if let Some(sink) = self.lock_sink().take() {
            let _ = sink.finalize();
        }
        *lock(&self.last_error) = Some(err);
        self.set_state(SessionState::Failed);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// One bounded video-recording attempt
pub struct RecordingSession {
    id: u64,
    created_at: DateTime<Local>,
    output_path: PathBuf,
    shared: Arc<SessionShared>,
    worker: Option<JoinHandle<()>>,
}

impl RecordingSession {
    /// Start a new session: switch to Video mode, open the sink, and spawn
    /// the capture loop. Errors before the loop starts leave no live
    /// session behind.
    pub fn start(
        mode: Arc<ModeController>,
        transfers: Arc<StorageTransferManager>,
        spec: RecordingSpec,
    ) -> Result<Self, RecordingError> {
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::SeqCst);
        info!(
            session = id,
            duration_s = spec.duration.as_secs_f64(),
            path = %spec.output_path.display(),
            "Starting recording session"
        );

        if let Err(e) = mode.request_mode(CameraMode::Video) {
            let _ = mode.request_mode(CameraMode::Preview);
            return Err(RecordingError::Device(e));
        }

        let sink = match MjpegSink::open(
            &spec.output_path,
            spec.profile.width,
            spec.profile.height,
            spec.profile.frame_rate,
            spec.jpeg_quality,
        ) {
            Ok(sink) => sink,
            Err(e) => {
                let _ = mode.request_mode(CameraMode::Preview);
                return Err(e);
            }
        };

        let shared = Arc::new(SessionShared {
            state: Mutex::new(SessionState::Starting),
            paused: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            frames_written: AtomicU64::new(0),
            sink: Mutex::new(Some(sink)),
            last_error: Mutex::new(None),
        });

        let loop_shared = Arc::clone(&shared);
        let loop_mode = Arc::clone(&mode);
        let loop_spec = spec.clone();
        let worker = match std::thread::Builder::new()
            .name(format!("recording-{}", id))
            .spawn(move || capture_loop(loop_shared, loop_mode, transfers, loop_spec))
        {
            Ok(worker) => worker,
            Err(e) => {
                shared.fail(RecordingError::StartFailed(e.to_string()));
                let _ = mode.request_mode(CameraMode::Preview);
                return Err(RecordingError::StartFailed(format!(
                    "spawn capture loop: {}",
                    e
                )));
            }
        };

        Ok(Self {
            id,
            created_at: Local::now(),
            output_path: spec.output_path,
            shared,
            worker: Some(worker),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Frames written to the sink so far
    pub fn frames_written(&self) -> u64 {
        self.shared.frames_written.load(Ordering::SeqCst)
    }

    /// Suspend sink writes from the next loop iteration on
    pub fn pause(&self) -> Result<(), RecordingError> {
        match self.state() {
            SessionState::Starting | SessionState::Recording | SessionState::Paused => {
                self.shared.paused.store(true, Ordering::SeqCst);
                Ok(())
            }
            _ => Err(RecordingError::NotRecording),
        }
    }

    /// Resume writes from the next captured frame; the pause leaves a gap
    /// in wall-clock coverage, never a corrupt frame
    pub fn resume(&self) -> Result<(), RecordingError> {
        match self.state() {
            SessionState::Starting | SessionState::Recording | SessionState::Paused => {
                self.shared.paused.store(false, Ordering::SeqCst);
                Ok(())
            }
            _ => Err(RecordingError::NotRecording),
        }
    }

    /// Request the capture loop to stop, wait (bounded) for it to finalize
    /// the sink, and report the outcome. Safe to call from any thread.
    pub fn stop(&mut self) -> Result<PathBuf, RecordingError> {
        self.shared.stop_requested.store(true, Ordering::SeqCst);

        let deadline = Instant::now() + STOP_WAIT_TIMEOUT;
        if let Some(worker) = &self.worker {
            while !worker.is_finished() {
                if Instant::now() >= deadline {
                    return Err(RecordingError::StopFailed(format!(
                        "capture loop did not stop within {:?}",
                        STOP_WAIT_TIMEOUT
                    )));
                }
                std::thread::sleep(Duration::from_millis(10));
            }
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }

        match self.state() {
            SessionState::Completed => Ok(self.output_path.clone()),
            SessionState::Failed => Err(lock(&self.shared.last_error)
                .clone()
                .unwrap_or(RecordingError::StopFailed("session failed".into()))),
            other => Err(RecordingError::StopFailed(format!(
                "session ended in state {}",
                other
            ))),
        }
    }

}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        // Forced teardown: a session dropped while live must not leave the
        // capture loop running against a dead control plane
        if let Some(worker) = self.worker.take() {
            self.shared.stop_requested.store(true, Ordering::SeqCst);
            let _ = worker.join();
        }
    }
}

/// The dedicated capture-plane loop
///
/// Paces frame writes to the profile's rate, polls the pause flag, and
/// exits on stop request or duration expiry. All terminal transitions of
/// a running session happen here.
fn capture_loop(
    shared: Arc<SessionShared>,
    mode: Arc<ModeController>,
    transfers: Arc<StorageTransferManager>,
    spec: RecordingSpec,
) {
    let started = Instant::now();
    let budget = spec.profile.frame_interval();
    let mut consecutive_errors = 0u32;
    let mut was_paused = false;

    shared.set_state(SessionState::Recording);

    loop {
        if shared.stop_requested.load(Ordering::SeqCst) {
            debug!("Stop requested");
            break;
        }
        if started.elapsed() >= spec.duration {
            debug!("Recording duration reached");
            break;
        }

        if shared.paused.load(Ordering::SeqCst) {
            if !was_paused {
                debug!("Recording paused");
                shared.set_state(SessionState::Paused);
                was_paused = true;
            }
            std::thread::sleep(PAUSE_POLL_INTERVAL);
            continue;
        }
        if was_paused {
            debug!("Recording resumed");
            shared.set_state(SessionState::Recording);
            was_paused = false;
        }

        let frame_started = Instant::now();
        let frame = match mode.capture_frame(StreamTag::Main) {
            Ok(frame) => {
                consecutive_errors = 0;
                frame
            }
            Err(e) => {
                consecutive_errors += 1;
                warn!(
                    error = %e,
                    attempt = consecutive_errors,
                    "Frame capture failed"
                );
                if consecutive_errors >= MAX_CAPTURE_RETRIES {
                    shared.fail(RecordingError::Device(e));
                    let _ = mode.request_mode(CameraMode::Preview);
                    return;
                }
                std::thread::sleep(CAPTURE_RETRY_DELAY);
                continue;
            }
        };

        let rgb = media::frame_to_rgb(&frame);
        {
            let mut guard = shared.lock_sink();
            let Some(sink) = guard.as_mut() else {
                // Sink already taken; nothing left to write to
                break;
            };
            if let Err(e) = sink.write_frame(&rgb) {
                drop(guard);
                shared.fail(e);
                let _ = mode.request_mode(CameraMode::Preview);
                return;
            }
        }
        shared.frames_written.fetch_add(1, Ordering::SeqCst);

        // Best-effort pacing: sleep whatever is left of the frame budget
        if let Some(remainder) = budget.checked_sub(frame_started.elapsed()) {
            std::thread::sleep(remainder);
        }
    }

    shared.set_state(SessionState::Stopping);
    let sink = shared.lock_sink().take();
    match sink {
        Some(sink) => match sink.finalize() {
            Ok(path) => {
                shared.set_state(SessionState::Completed);
                info!(
                    path = %path.display(),
                    frames = shared.frames_written.load(Ordering::SeqCst),
                    elapsed_s = started.elapsed().as_secs_f64(),
                    "Recording completed"
                );
                transfers.enqueue(path, MediaCategory::Videos);
            }
            Err(e) => {
                *lock(&shared.last_error) = Some(e.clone());
                error!(error = %e, "Failed to finalize recording");
                shared.set_state(SessionState::Failed);
            }
        },
        None => shared.set_state(SessionState::Failed),
    }

    if let Err(e) = mode.request_mode(CameraMode::Preview) {
        warn!(error = %e, "Could not return to preview mode after recording");
    }
}
