//! Filesystem identity probing: map a mount to a persistent UUID that
//! survives device renumbering (spec §4.2).
//!
//! Three strategies are tried in order:
//! 1. ZFS datasets: the pool GUID, read via `zfs get -H -o value guid`.
//! 2. Everything else: match the mount's device number against
//!    `/dev/disk/by-uuid/*` symlinks.
//! 3. Neither available (e.g. overlay, tmpfs, a container bind mount with
//!    no backing block device): a deterministic SHA-256 fallback derived
//!    from the mount source and filesystem type, so the same mount always
//!    yields the same synthetic identity across runs.

use std::fs;
use std::path::Path;
use std::process::Command;

use nix::sys::stat::stat;
use sha2::{Digest, Sha256};
use silo_model::device::FsUuid;

use crate::error::{FsOpsError, FsOpsResult};
use crate::mounts::{self, MountEntry};

/// Result of probing the filesystem that owns a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    /// Persistent filesystem identity.
    pub fs_uuid: FsUuid,
    /// Filesystem type reported by the kernel.
    pub fs_type: String,
    /// Owning mount point.
    pub mount_point: std::path::PathBuf,
    /// Current kernel device identifier (the mount source, e.g. `/dev/sda1`
    /// or a ZFS dataset name); may change across reboots or renumbering.
    pub device_ident: String,
}

/// Probe the filesystem owning `path` for a persistent identity.
///
/// # Errors
///
/// Returns an error if no mount entry covers `path`.
pub fn probe(path: &Path, mounts: &[MountEntry]) -> FsOpsResult<ProbeResult> {
    let entry = mounts::find_owning_mount(mounts, path).ok_or_else(|| FsOpsError::NoMountEntry {
        path: path.to_path_buf(),
    })?;

    let fs_uuid = if entry.fs_type == "zfs" {
        zfs_pool_guid(&entry.mount_source).unwrap_or_else(|| fallback_uuid(entry))
    } else {
        by_uuid_lookup(entry).unwrap_or_else(|| fallback_uuid(entry))
    };

    Ok(ProbeResult {
        fs_uuid: FsUuid(fs_uuid),
        fs_type: entry.fs_type.clone(),
        mount_point: entry.mount_point.clone(),
        device_ident: entry.mount_source.clone(),
    })
}

/// Shell out to `zfs get -H -o value guid <pool>` for the pool backing a ZFS
/// dataset mount source (`pool/dataset/...` -> `pool`).
fn zfs_pool_guid(mount_source: &str) -> Option<String> {
    let pool = mount_source.split('/').next()?;
    let output = Command::new("zfs")
        .args(["get", "-H", "-o", "value", "guid", pool])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let guid = String::from_utf8(output.stdout).ok()?;
    let guid = guid.trim();
    if guid.is_empty() {
        None
    } else {
        Some(guid.to_string())
    }
}

/// Scan `/dev/disk/by-uuid/*` symlinks, `stat`-ing each target and comparing
/// its device number against the mount's `major:minor`, to find the
/// persistent filesystem UUID for a block-backed mount.
fn by_uuid_lookup(entry: &MountEntry) -> Option<String> {
    let dir = fs::read_dir("/dev/disk/by-uuid").ok()?;
    for dirent in dir.flatten() {
        let link_path = dirent.path();
        let Ok(target_stat) = stat(&link_path) else {
            continue;
        };
        let rdev = target_stat.st_rdev;
        let major = libc_major_raw(rdev);
        let minor = libc_minor_raw(rdev);
        if (major, minor) == entry.dev {
            return dirent.file_name().into_string().ok();
        }
    }
    None
}

// `nix` does not expose major()/minor() decomposition directly on all
// targets; Linux device numbers are encoded as documented in
// `<sys/sysmacros.h>`.
const fn libc_major_raw(dev: u64) -> u32 {
    (((dev >> 8) & 0xfff) | ((dev >> 32) & !0xfff)) as u32
}

const fn libc_minor_raw(dev: u64) -> u32 {
    ((dev & 0xff) | ((dev >> 12) & !0xff)) as u32
}

/// Deterministic SHA-256 fallback identity for mounts with no discoverable
/// persistent UUID. Stable across runs for the same mount source/fs type
/// pair, so it behaves like a real UUID for catalog purposes even though it
/// carries no hardware meaning.
fn fallback_uuid(entry: &MountEntry) -> String {
    let mut hasher = Sha256::new();
    hasher.update(entry.mount_source.as_bytes());
    hasher.update(b"\0");
    hasher.update(entry.fs_type.as_bytes());
    let digest = hasher.finalize();
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(fs_type: &str, mount_source: &str) -> MountEntry {
        MountEntry {
            dev: (0, 0),
            root: "/".to_string(),
            mount_point: std::path::PathBuf::from("/mnt/x"),
            fs_type: fs_type.to_string(),
            mount_source: mount_source.to_string(),
        }
    }

    #[test]
    fn fallback_uuid_is_deterministic_for_same_inputs() {
        let a = fallback_uuid(&entry("overlay", "overlay"));
        let b = fallback_uuid(&entry("overlay", "overlay"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn fallback_uuid_differs_across_mount_sources() {
        let a = fallback_uuid(&entry("overlay", "overlay-one"));
        let b = fallback_uuid(&entry("overlay", "overlay-two"));
        assert_ne!(a, b);
    }

    #[test]
    fn major_minor_decode_matches_known_values() {
        // 8:1 (e.g. /dev/sda1) encodes as (major << 8) | minor for low values.
        let dev: u64 = (8u64 << 8) | 1u64;
        assert_eq!(libc_major_raw(dev), 8);
        assert_eq!(libc_minor_raw(dev), 1);
    }
}
