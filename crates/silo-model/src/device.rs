//! Device registry rows.
//!
//! A [`Device`] is identified by a persistent filesystem UUID that survives
//! reboots and kernel device-identifier renumbering; see spec §3/§4.4.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Internal auto-increment primary key. Used only to name the per-device
/// file table (`files_dev_{id}`) and as a join key inside the catalog; the
/// externally meaningful identity is [`Device::fs_uuid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub i64);

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persistent filesystem identity: a ZFS pool GUID, an ext/btrfs UUID, or a
/// deterministic mount-derived fallback hash.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FsUuid(pub String);

impl std::fmt::Display for FsUuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A prior kernel device-identifier value and when the catalog observed the
/// changeover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentifierChange {
    /// The kernel device identifier string in effect before the change.
    pub old_ident: String,
    /// The kernel device identifier string in effect after the change.
    pub new_ident: String,
    /// When the renumbering was observed.
    pub changed_at: DateTime<Utc>,
}

/// A single filesystem tracked by the catalog, identified by persistent
/// filesystem UUID regardless of kernel numbering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Internal primary key; also used to name the per-device file table.
    pub id: DeviceId,
    /// Persistent filesystem UUID.
    pub fs_uuid: FsUuid,
    /// Current kernel device identifier (e.g. `/dev/sda1`); may change across
    /// reboots or device renumbering.
    pub device_ident: String,
    /// Human-readable alias assigned by an operator.
    pub alias: Option<String>,
    /// Current mount point.
    pub mount_point: String,
    /// Stable override for path normalization; when set, catalog paths are
    /// relative to this instead of `mount_point`.
    pub preferred_mount_point: Option<String>,
    /// Filesystem type as reported by the mount table (e.g. `zfs`, `ext4`).
    pub fs_type: String,
    /// Optional ZFS pool/dataset metadata, or other fs-specific metadata.
    pub pool_metadata: Option<serde_json::Value>,
    /// Cached count of active files on this device.
    pub file_count: i64,
    /// Cached total bytes of active files on this device.
    pub byte_total: i64,
    /// Timestamp of the first scan that registered this device.
    pub first_scan_at: DateTime<Utc>,
    /// Timestamp of the most recent scan of this device.
    pub last_scan_at: DateTime<Utc>,
    /// Number of scans completed against this device.
    pub scan_count: i64,
    /// History of prior device-identifier values and when they changed.
    pub identifier_history: Vec<DeviceIdentifierChange>,
}

impl Device {
    /// The mount point path to resolve catalog-relative paths against:
    /// `preferred_mount_point` when set, otherwise `mount_point`, per
    /// spec §4.1.
    #[must_use]
    pub fn relpath_base(&self) -> &str {
        self.preferred_mount_point
            .as_deref()
            .unwrap_or(&self.mount_point)
    }

    /// Runtime-named per-device file table identifier, e.g. `files_dev_12`.
    #[must_use]
    pub fn file_table_name(&self) -> String {
        format!("files_dev_{}", self.id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_device() -> Device {
        Device {
            id: DeviceId(7),
            fs_uuid: FsUuid("abc-123".to_string()),
            device_ident: "/dev/sda1".to_string(),
            alias: Some("warm".to_string()),
            mount_point: "/mnt/warm".to_string(),
            preferred_mount_point: None,
            fs_type: "ext4".to_string(),
            pool_metadata: None,
            file_count: 0,
            byte_total: 0,
            first_scan_at: Utc::now(),
            last_scan_at: Utc::now(),
            scan_count: 0,
            identifier_history: Vec::new(),
        }
    }

    #[test]
    fn relpath_base_prefers_preferred_mount() {
        let mut device = sample_device();
        assert_eq!(device.relpath_base(), "/mnt/warm");
        device.preferred_mount_point = Some("/srv/warm".to_string());
        assert_eq!(device.relpath_base(), "/srv/warm");
    }

    #[test]
    fn file_table_name_embeds_device_id() {
        let device = sample_device();
        assert_eq!(device.file_table_name(), "files_dev_7");
    }
}
