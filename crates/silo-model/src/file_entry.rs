//! Per-device catalog file rows, scan roots, and scan sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::device::DeviceId;

/// Lifecycle status of a catalog file row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// The file was observed in the most recent scan of its scan root.
    Active,
    /// The file was not observed in the most recent scan of its scan root.
    Deleted,
    /// The file's inode reappeared at a different path in the same scan that
    /// deleted this row.
    Moved,
}

/// A single catalog row: `(device, canonical-relative-path)` plus the
/// metadata needed for hardlink detection and content identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Device this row belongs to.
    pub device_id: DeviceId,
    /// Path relative to the device's preferred mount point, forward-slashed,
    /// with no `..` segments and no symlink segments.
    pub relative_path: String,
    /// Inode number on the owning device.
    pub inode: u64,
    /// File size in bytes.
    pub size: u64,
    /// Last-modified time as reported by the filesystem.
    pub mtime: DateTime<Utc>,
    /// Cheap pre-filter hash over head/middle/tail windows plus size.
    pub fast_hash: Option<String>,
    /// Full 256-bit content digest; `None` until the hasher has processed the
    /// file in `full`/`upgrade` mode.
    pub full_digest: Option<String>,
    /// Current lifecycle status.
    pub status: FileStatus,
    /// When this path was first observed.
    pub first_seen: DateTime<Utc>,
    /// When this path was most recently observed.
    pub last_seen: DateTime<Utc>,
    /// The scan root under which this file was first discovered.
    pub scan_root_id: i64,
}

impl FileEntry {
    /// Whether this row's digest is present and can be trusted for content
    /// identity comparisons (payload manifests, hardlink grouping).
    #[must_use]
    pub const fn has_full_digest(&self) -> bool {
        self.full_digest.is_some()
    }
}

/// A `(device, canonical-relative-root-path)` tuple tracking which prefixes
/// have been scanned and when. Required for deletion detection: a file may
/// transition to `deleted` only if its path lies under a scan root that was
/// just scanned and it was not observed in that scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRoot {
    /// Internal primary key.
    pub id: i64,
    /// Device this root belongs to.
    pub device_id: DeviceId,
    /// Canonical path relative to the device's preferred mount point.
    pub relative_root: String,
    /// When this root was first scanned.
    pub first_scanned_at: DateTime<Utc>,
    /// When this root was most recently scanned.
    pub last_scanned_at: DateTime<Utc>,
}

impl ScanRoot {
    /// Whether `relative_path` lies under this scan root (inclusive of the
    /// root itself).
    #[must_use]
    pub fn covers(&self, relative_path: &str) -> bool {
        path_under_root(relative_path, &self.relative_root)
    }
}

/// Whether `relative_path` lies under `relative_root` (inclusive of the root
/// itself). An empty root covers every path. Shared by scan-root coverage
/// checks and payload-root membership queries, which both scope a flat list
/// of relative paths to one prefix.
#[must_use]
pub fn path_under_root(relative_path: &str, relative_root: &str) -> bool {
    if relative_root.is_empty() {
        return true;
    }
    relative_path == relative_root || relative_path.starts_with(&format!("{relative_root}/"))
}

/// Lifecycle status of a scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    /// The scan is currently in progress (or was interrupted mid-run).
    Running,
    /// The scan completed and its counters are final.
    Completed,
    /// A prior `Running` session was observed stale on restart and
    /// overwritten; see spec §9 Open Questions (this implementation chooses
    /// "treat as interrupted and overwrite").
    Interrupted,
    /// The scan aborted due to a probe or catalog error.
    Failed,
}

/// An append-only record of one scan. Immutable once completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSession {
    /// Internal primary key.
    pub id: i64,
    /// Device scanned.
    pub device_id: DeviceId,
    /// Scan root internal id scanned in this session.
    pub scan_root_id: i64,
    /// When the scan began.
    pub started_at: DateTime<Utc>,
    /// When the scan ended, if it has.
    pub ended_at: Option<DateTime<Utc>>,
    /// Current status.
    pub status: ScanStatus,
    /// Number of new active rows inserted.
    pub added: i64,
    /// Number of existing rows whose metadata changed.
    pub updated: i64,
    /// Number of existing rows observed unchanged.
    pub unchanged: i64,
    /// Number of rows transitioned to `deleted`.
    pub deleted: i64,
    /// Total bytes hashed during this session.
    pub bytes_hashed: i64,
    /// Parallelism degree used for hashing.
    pub parallelism: i64,
    /// Last error text recorded, if the session failed.
    pub last_error: Option<String>,
}

/// A materialized view of [`FileEntry`] rows sharing an inode on one device,
/// with a distinct-path count of at least two. Rebuilt on demand; never
/// itself persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardlinkGroup {
    /// Device the group belongs to.
    pub device_id: DeviceId,
    /// Shared inode number.
    pub inode: u64,
    /// Content digest shared by every member (all members have the same
    /// size and digest by construction, since they are one inode).
    pub digest: Option<String>,
    /// File size shared by every member.
    pub size: u64,
    /// Lexicographically smallest active path; used as the canonical path
    /// group members link against.
    pub canonical_path: String,
    /// All active paths sharing this inode, including the canonical one.
    pub paths: Vec<String>,
}

impl HardlinkGroup {
    /// Number of distinct paths sharing this inode.
    #[must_use]
    pub fn path_count(&self) -> usize {
        self.paths.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_root_covers_nested_paths_not_siblings() {
        let root = ScanRoot {
            id: 1,
            device_id: DeviceId(1),
            relative_root: "media/movies".to_string(),
            first_scanned_at: Utc::now(),
            last_scanned_at: Utc::now(),
        };
        assert!(root.covers("media/movies"));
        assert!(root.covers("media/movies/foo.mkv"));
        assert!(!root.covers("media/movies2/foo.mkv"));
        assert!(!root.covers("media/tv/foo.mkv"));
    }

    #[test]
    fn scan_root_empty_prefix_covers_everything() {
        let root = ScanRoot {
            id: 1,
            device_id: DeviceId(1),
            relative_root: String::new(),
            first_scanned_at: Utc::now(),
            last_scanned_at: Utc::now(),
        };
        assert!(root.covers("anything/at/all"));
    }

    #[test]
    fn hardlink_group_path_count() {
        let group = HardlinkGroup {
            device_id: DeviceId(1),
            inode: 42,
            digest: Some("abc".to_string()),
            size: 10,
            canonical_path: "a/x".to_string(),
            paths: vec!["a/x".to_string(), "b/x".to_string()],
        };
        assert_eq!(group.path_count(), 2);
    }
}
