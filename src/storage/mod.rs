// SPDX-License-Identifier: GPL-3.0-only

//! Asynchronous transfer of finished captures to removable storage
//!
//! Each enqueued file gets its own short-lived worker thread and a row in
//! a queryable status table. A transfer that fails for any reason leaves
//! the staging file untouched, so no capture is ever lost just because
//! the removable volume is missing or flaky.

pub mod mount;

pub use mount::{MountInfo, MountLocator};

use crate::constants::TRANSFER_POLL_INTERVAL;
use crate::errors::TransferError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Destination category on the removable volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCategory {
    Images,
    Videos,
}

impl MediaCategory {
    /// Subdirectory name on the removable volume
    pub fn dir_name(&self) -> &'static str {
        match self {
            MediaCategory::Images => "images",
            MediaCategory::Videos => "videos",
        }
    }

    /// Singular noun used as the default filename stem
    pub fn singular(&self) -> &'static str {
        match self {
            MediaCategory::Images => "image",
            MediaCategory::Videos => "video",
        }
    }
}

/// Observable status of one transfer task
#[derive(Debug, Clone)]
pub enum TransferStatus {
    Pending,
    InProgress,
    Completed,
    Failed(TransferError),
}

impl TransferStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Completed | TransferStatus::Failed(_))
    }

    /// Short status label for polling clients
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::InProgress => "in_progress",
            TransferStatus::Completed => "completed",
            TransferStatus::Failed(_) => "failed",
        }
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferStatus::Failed(err) => write!(f, "failed: {}", err),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// Snapshot of one transfer task
#[derive(Debug, Clone)]
pub struct TransferTask {
    pub source: PathBuf,
    pub category: MediaCategory,
    pub status: TransferStatus,
    pub destination: Option<PathBuf>,
}

struct TaskEntry {
    category: MediaCategory,
    status: TransferStatus,
    destination: Option<PathBuf>,
}

type TaskTable = Arc<Mutex<HashMap<PathBuf, TaskEntry>>>;

fn lock(table: &Mutex<HashMap<PathBuf, TaskEntry>>) -> MutexGuard<'_, HashMap<PathBuf, TaskEntry>> {
    table.lock().unwrap_or_else(|e| e.into_inner())
}

/// Owner of the transfer task table and its worker threads
pub struct StorageTransferManager {
    locator: MountLocator,
    tasks: TaskTable,
}

impl StorageTransferManager {
    pub fn new(locator: MountLocator) -> Self {
        Self {
            locator,
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record a Pending task for `source` and launch its worker
    pub fn enqueue(&self, source: PathBuf, category: MediaCategory) -> TransferTask {
        lock(&self.tasks).insert(
            source.clone(),
            TaskEntry {
                category,
                status: TransferStatus::Pending,
                destination: None,
            },
        );
        debug!(source = %source.display(), category = category.dir_name(), "Transfer enqueued");

        let tasks = Arc::clone(&self.tasks);
        let locator = self.locator.clone();
        let worker_source = source.clone();
        let spawned = std::thread::Builder::new()
            .name("transfer-worker".to_string())
            .spawn(move || run_transfer(tasks, locator, worker_source, category));

        if let Err(e) = spawned {
            warn!(error = %e, "Could not spawn transfer worker");
            update(
                &self.tasks,
                &source,
                TransferStatus::Failed(TransferError::CopyFailed(format!(
                    "spawn worker: {}",
                    e
                ))),
                None,
            );
        }

        self.task(&source).unwrap_or(TransferTask {
            source,
            category,
            status: TransferStatus::Pending,
            destination: None,
        })
    }

    /// Current status for a staging path
    ///
    /// Paths never enqueued are reported Completed once the file is gone
    /// (nothing left to transfer) and Pending while it still exists.
    pub fn query(&self, source: &Path) -> TransferStatus {
        if let Some(entry) = lock(&self.tasks).get(source) {
            return entry.status.clone();
        }
        if source.exists() {
            TransferStatus::Pending
        } else {
            TransferStatus::Completed
        }
    }

    /// Snapshot of a known task
    pub fn task(&self, source: &Path) -> Option<TransferTask> {
        lock(&self.tasks).get(source).map(|entry| TransferTask {
            source: source.to_path_buf(),
            category: entry.category,
            status: entry.status.clone(),
            destination: entry.destination.clone(),
        })
    }

    /// Poll until the task reaches a terminal status or `timeout` elapses
    pub fn wait(&self, source: &Path, timeout: Duration) -> TransferStatus {
        let deadline = Instant::now() + timeout;
        loop {
            let status = self.query(source);
            if status.is_terminal() || Instant::now() >= deadline {
                return status;
            }
            std::thread::sleep(TRANSFER_POLL_INTERVAL);
        }
    }
}

fn update(table: &Mutex<HashMap<PathBuf, TaskEntry>>, source: &Path, status: TransferStatus, destination: Option<PathBuf>) {
    if let Some(entry) = lock(table).get_mut(source) {
        entry.status = status;
        entry.destination = destination;
    }
}

fn run_transfer(tasks: TaskTable, locator: MountLocator, source: PathBuf, category: MediaCategory) {
    update(&tasks, &source, TransferStatus::InProgress, None);

    match transfer_file(&locator, &source, category) {
        Ok(destination) => {
            info!(
                source = %source.display(),
                destination = %destination.display(),
                "Transfer completed"
            );
            update(
                &tasks,
                &source,
                TransferStatus::Completed,
                Some(destination),
            );
        }
        Err(e) => {
            warn!(
                source = %source.display(),
                error = %e,
                "Transfer failed, staging file preserved"
            );
            update(&tasks, &source, TransferStatus::Failed(e), None);
        }
    }
}

/// Move one staging file to the removable volume
///
/// The mount is re-resolved here, not at enqueue time; the staging file is
/// deleted only after the copy verifies.
fn transfer_file(
    locator: &MountLocator,
    source: &Path,
    category: MediaCategory,
) -> Result<PathBuf, TransferError> {
    let mount = locator
        .find_mount()
        .ok_or(TransferError::NoRemovableStorage)?;

    let src_len = std::fs::metadata(source)
        .map_err(|e| TransferError::CopyFailed(format!("read {}: {}", source.display(), e)))?
        .len();
    if src_len == 0 {
        return Err(TransferError::VerificationFailed(
            "source file is empty".to_string(),
        ));
    }

    let file_name = source
        .file_name()
        .ok_or_else(|| TransferError::CopyFailed("source has no file name".to_string()))?;
    let dest_dir = mount.root.join(category.dir_name());
    std::fs::create_dir_all(&dest_dir)
        .map_err(|e| TransferError::CopyFailed(format!("create {}: {}", dest_dir.display(), e)))?;
    let destination = dest_dir.join(file_name);

    if let Some(free) = mount.free_bytes() {
        if free < src_len {
            return Err(TransferError::CopyFailed(format!(
                "insufficient space on {}: {} bytes free, {} needed",
                mount.root.display(),
                free,
                src_len
            )));
        }
    }

    let copied = std::fs::copy(source, &destination)
        .map_err(|e| TransferError::CopyFailed(format!("copy to {}: {}", destination.display(), e)))?;

    let dest_len = std::fs::metadata(&destination)
        .map(|m| m.len())
        .map_err(|e| TransferError::VerificationFailed(e.to_string()))?;
    if copied != src_len || dest_len != src_len {
        return Err(TransferError::VerificationFailed(format!(
            "wrote {} of {} bytes",
            dest_len, src_len
        )));
    }

    // The copy is verified; only now may the staging file go
    if let Err(e) = std::fs::remove_file(source) {
        warn!(
            source = %source.display(),
            error = %e,
            "Could not remove staging file after transfer"
        );
    }

    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Locator + fake mount table pointing at a tempdir "volume"
    fn fixture(with_volume: bool) -> (tempfile::TempDir, MountLocator, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let volume = tmp.path().join("media/usb0");
        let mut lines = vec!["/dev/root / ext4 rw 0 0".to_string()];
        if with_volume {
            std::fs::create_dir_all(&volume).unwrap();
            lines.push(format!("/dev/sda1 {} vfat rw 0 0", volume.display()));
        }
        let table = tmp.path().join("mounts");
        std::fs::write(&table, lines.join("\n")).unwrap();
        let locator = MountLocator::with_table(table, vec![tmp.path().join("media")]);
        (tmp, locator, volume)
    }

    #[test]
    fn test_transfer_moves_and_verifies() {
        let (tmp, locator, volume) = fixture(true);
        let source = tmp.path().join("image_x.jpg");
        std::fs::write(&source, b"jpegdata").unwrap();

        let manager = StorageTransferManager::new(locator);
        manager.enqueue(source.clone(), MediaCategory::Images);

        let status = manager.wait(&source, Duration::from_secs(5));
        assert!(matches!(status, TransferStatus::Completed));
        assert!(!source.exists(), "staging file removed after verified copy");

        let dest = volume.join("images/image_x.jpg");
        assert_eq!(std::fs::read(dest).unwrap(), b"jpegdata");
    }

    #[test]
    fn test_missing_volume_fails_and_preserves_source() {
        let (tmp, locator, _volume) = fixture(false);
        let source = tmp.path().join("video_x.avi");
        std::fs::write(&source, b"avi").unwrap();

        let manager = StorageTransferManager::new(locator);
        manager.enqueue(source.clone(), MediaCategory::Videos);

        let status = manager.wait(&source, Duration::from_secs(5));
        assert!(matches!(
            status,
            TransferStatus::Failed(TransferError::NoRemovableStorage)
        ));
        assert!(source.exists(), "staging file preserved on failure");
    }

    #[test]
    fn test_query_unknown_paths() {
        let (tmp, locator, _volume) = fixture(false);
        let manager = StorageTransferManager::new(locator);

        let missing = tmp.path().join("never-existed.jpg");
        assert!(matches!(
            manager.query(&missing),
            TransferStatus::Completed
        ));

        let present = tmp.path().join("present.jpg");
        std::fs::write(&present, b"x").unwrap();
        assert!(matches!(manager.query(&present), TransferStatus::Pending));
    }

    #[test]
    fn test_concurrent_transfers() {
        let (tmp, locator, volume) = fixture(true);
        let manager = StorageTransferManager::new(locator);

        let sources: Vec<PathBuf> = (0..4)
            .map(|i| {
                let path = tmp.path().join(format!("image_{}.jpg", i));
                std::fs::write(&path, format!("data-{}", i)).unwrap();
                manager.enqueue(path.clone(), MediaCategory::Images);
                path
            })
            .collect();

        for source in &sources {
            assert!(matches!(
                manager.wait(source, Duration::from_secs(5)),
                TransferStatus::Completed
            ));
        }
        assert_eq!(std::fs::read_dir(volume.join("images")).unwrap().count(), 4);
    }
}
