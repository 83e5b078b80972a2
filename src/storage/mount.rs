// SPDX-License-Identifier: GPL-3.0-only

//! Removable volume discovery
//!
//! Scans the system mount table for a block-device mount under the
//! configured removable roots. Discovery is a point-in-time query: callers
//! re-resolve immediately before each use, because a volume can be
//! unplugged between check and use.

use std::path::{Path, PathBuf};
use tracing::debug;

/// A removable volume discovered in the mount table
#[derive(Debug, Clone)]
pub struct MountInfo {
    /// Writable root of the volume
    pub root: PathBuf,
    /// Source block device (e.g. `/dev/sda1`)
    pub device: String,
    /// Filesystem type as reported by the mount table
    pub fs_type: String,
}

impl MountInfo {
    /// Whether the mount point still exists on disk
    pub fn is_alive(&self) -> bool {
        self.root.is_dir()
    }

    /// Free bytes on the volume, if the kernel can report them
    pub fn free_bytes(&self) -> Option<u64> {
        let c_path = std::ffi::CString::new(self.root.as_os_str().as_encoded_bytes()).ok()?;

        unsafe {
            let mut stat: libc::statvfs = std::mem::zeroed();
            if libc::statvfs(c_path.as_ptr(), &mut stat) == 0 {
                Some(stat.f_bavail as u64 * stat.f_frsize as u64)
            } else {
                None
            }
        }
    }
}

/// Point-in-time locator for removable volumes
#[derive(Debug, Clone)]
pub struct MountLocator {
    mount_table: PathBuf,
    search_roots: Vec<PathBuf>,
}

impl Default for MountLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl MountLocator {
    /// Locator over `/proc/mounts` with the default removable roots
    pub fn new() -> Self {
        Self::with_roots(
            crate::constants::DEFAULT_MOUNT_ROOTS
                .iter()
                .copied()
                .map(PathBuf::from)
                .collect(),
        )
    }

    /// Locator over `/proc/mounts` with custom removable roots
    pub fn with_roots(search_roots: Vec<PathBuf>) -> Self {
        Self {
            mount_table: PathBuf::from("/proc/mounts"),
            search_roots,
        }
    }

    /// Locator reading an arbitrary mount-table file
    pub fn with_table(mount_table: PathBuf, search_roots: Vec<PathBuf>) -> Self {
        Self {
            mount_table,
            search_roots,
        }
    }

    /// First block-device mount under the removable roots, or none
    ///
    /// The root filesystem is never returned, and a table entry whose
    /// mount point no longer exists is skipped.
    pub fn find_mount(&self) -> Option<MountInfo> {
        let table = std::fs::read_to_string(&self.mount_table).ok()?;

        for line in table.lines() {
            let mut fields = line.split_whitespace();
            let (Some(device), Some(raw_mount), Some(fs_type)) =
                (fields.next(), fields.next(), fields.next())
            else {
                continue;
            };

            if !device.starts_with("/dev/") {
                continue;
            }

            let mount_point = unescape_mount_path(raw_mount);
            if mount_point == Path::new("/") {
                continue;
            }
            if !self
                .search_roots
                .iter()
                .any(|root| mount_point.starts_with(root))
            {
                continue;
            }
            if !mount_point.is_dir() {
                debug!(mount = %mount_point.display(), "Skipping stale mount entry");
                continue;
            }

            debug!(
                device,
                fs_type,
                mount = %mount_point.display(),
                "Removable volume found"
            );
            return Some(MountInfo {
                root: mount_point,
                device: device.to_string(),
                fs_type: fs_type.to_string(),
            });
        }

        None
    }
}

/// Undo the octal escapes the kernel applies to mount paths
/// (`\040` space, `\011` tab, `\012` newline, `\134` backslash)
fn unescape_mount_path(raw: &str) -> PathBuf {
    use std::os::unix::ffi::OsStringExt;

    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let octal = std::str::from_utf8(&bytes[i + 1..i + 4])
                .ok()
                .and_then(|s| u8::from_str_radix(s, 8).ok());
            if let Some(value) = octal {
                out.push(value);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    PathBuf::from(std::ffi::OsString::from_vec(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_table(dir: &Path, lines: &[String]) -> PathBuf {
        let table = dir.join("mounts");
        std::fs::write(&table, lines.join("\n")).unwrap();
        table
    }

    #[test]
    fn test_finds_block_device_under_root() {
        let tmp = tempfile::tempdir().unwrap();
        let usb = tmp.path().join("media/usb0");
        std::fs::create_dir_all(&usb).unwrap();

        let table = write_table(
            tmp.path(),
            &[
                "/dev/root / ext4 rw 0 0".to_string(),
                "proc /proc proc rw 0 0".to_string(),
                format!("/dev/sda1 {} vfat rw 0 0", usb.display()),
            ],
        );

        let locator = MountLocator::with_table(table, vec![tmp.path().join("media")]);
        let mount = locator.find_mount().expect("usb volume found");
        assert_eq!(mount.root, usb);
        assert_eq!(mount.device, "/dev/sda1");
        assert_eq!(mount.fs_type, "vfat");
        assert!(mount.is_alive());
    }

    #[test]
    fn test_ignores_non_device_and_stale_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let gone = tmp.path().join("media/gone");

        let table = write_table(
            tmp.path(),
            &[
                format!("tmpfs {} tmpfs rw 0 0", tmp.path().join("media/ram").display()),
                format!("/dev/sdb1 {} vfat rw 0 0", gone.display()),
            ],
        );

        let locator = MountLocator::with_table(table, vec![tmp.path().join("media")]);
        assert!(locator.find_mount().is_none());
    }

    #[test]
    fn test_unescapes_spaces_in_mount_path() {
        let tmp = tempfile::tempdir().unwrap();
        let usb = tmp.path().join("media/my drive");
        std::fs::create_dir_all(&usb).unwrap();

        let escaped = usb.display().to_string().replace(' ', "\\040");
        let table = write_table(tmp.path(), &[format!("/dev/sdc1 {} exfat rw 0 0", escaped)]);

        let locator = MountLocator::with_table(table, vec![tmp.path().join("media")]);
        let mount = locator.find_mount().expect("escaped volume found");
        assert_eq!(mount.root, usb);
    }

    #[test]
    fn test_empty_table_finds_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let table = write_table(tmp.path(), &[]);
        let locator = MountLocator::with_table(table, vec![tmp.path().to_path_buf()]);
        assert!(locator.find_mount().is_none());
    }
}
