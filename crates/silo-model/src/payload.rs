//! Payload fingerprints and the torrent instances that reference them.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::device::DeviceId;

/// Hashing mode requested for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashMode {
    /// Compute only the sample hash.
    Fast,
    /// Compute both the sample hash and the full digest.
    Full,
    /// Compute full digests for active rows lacking them; leave sample
    /// hashes and already-digested rows untouched.
    Upgrade,
}

/// The on-disk content tree a torrent references, identified by a
/// fingerprint over its manifest.
///
/// `payload_hash` is `None` until every member file has a full digest, and is
/// device-independent by construction (the manifest contains only relative
/// paths, sizes, and digests).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// 256-bit digest of the canonical manifest, or `None` if any member
    /// file still lacks a full digest.
    pub payload_hash: Option<String>,
    /// Device the payload currently resides on.
    pub device_id: DeviceId,
    /// Path to the payload root, relative to the device's preferred mount.
    pub relative_root: String,
    /// Number of member files.
    pub file_count: i64,
    /// Total bytes across member files.
    pub total_bytes: i64,
    /// When the manifest was last (re)computed.
    pub last_built_at: DateTime<Utc>,
}

impl Payload {
    /// Whether this payload can be compared by identity. Any code path that
    /// compares payload identity must refuse to proceed when this is
    /// `false` (spec §9 "payload hash null handling").
    #[must_use]
    pub const fn has_identity(&self) -> bool {
        self.payload_hash.is_some()
    }
}

/// A torrent tracked by the external torrent client, identified by its
/// infohash. Multiple instances may reference one payload ("siblings").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentInstance {
    /// Infohash reported by the torrent client.
    pub infohash: String,
    /// Payload this instance's content root indexes to, if fully hashed.
    pub payload_hash: Option<String>,
    /// Device owning the resolved content root.
    pub device_id: DeviceId,
    /// Save path as reported by the client.
    pub save_path: String,
    /// Resolved content root: the client's `content_path` when present,
    /// otherwise `save_path / name`.
    pub content_root: String,
    /// Client-reported category, if any.
    pub category: Option<String>,
    /// Client-reported tags.
    pub tags: BTreeSet<String>,
    /// When this instance was last refreshed from the client.
    pub last_seen: DateTime<Utc>,
}

impl TorrentInstance {
    /// Whether this instance carries a given tag.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Build the canonical manifest for a payload: the lexicographically sorted
/// sequence of `(relative-path-within-root, size, digest)` joined with a
/// fixed delimiter, ready to be hashed by the caller.
///
/// Deterministic under any collation, since sorting and joining both operate
/// byte-wise on the supplied strings (spec §4.5 step 4).
///
/// # Panics
///
/// Panics if any `digest` is `None`; callers must only invoke this once every
/// member file has a full digest (spec §9 "payload hash null handling").
#[must_use]
pub fn build_manifest(mut members: Vec<(String, u64, Option<String>)>) -> String {
    members.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
    let mut manifest = String::new();
    for (path, size, digest) in members {
        let digest = digest.expect("build_manifest requires every member to have a full digest");
        manifest.push_str(&path);
        manifest.push('\t');
        manifest.push_str(&size.to_string());
        manifest.push('\t');
        manifest.push_str(&digest);
        manifest.push('\n');
    }
    manifest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_manifest_sorts_paths_byte_wise() {
        let members = vec![
            ("b/2.bin".to_string(), 20, Some("d2".to_string())),
            ("a/1.bin".to_string(), 10, Some("d1".to_string())),
        ];
        let manifest = build_manifest(members);
        let first_line = manifest.lines().next().unwrap();
        assert!(first_line.starts_with("a/1.bin"));
    }

    #[test]
    fn build_manifest_is_deterministic_regardless_of_input_order() {
        let a = build_manifest(vec![
            ("x".to_string(), 1, Some("h1".to_string())),
            ("y".to_string(), 2, Some("h2".to_string())),
        ]);
        let b = build_manifest(vec![
            ("y".to_string(), 2, Some("h2".to_string())),
            ("x".to_string(), 1, Some("h1".to_string())),
        ]);
        assert_eq!(a, b);
    }

    #[test]
    #[should_panic(expected = "full digest")]
    fn build_manifest_panics_on_missing_digest() {
        let _ = build_manifest(vec![("x".to_string(), 1, None)]);
    }

    #[test]
    fn payload_identity_requires_hash() {
        let payload = Payload {
            payload_hash: None,
            device_id: DeviceId(1),
            relative_root: "p".to_string(),
            file_count: 1,
            total_bytes: 1,
            last_built_at: Utc::now(),
        };
        assert!(!payload.has_identity());
    }
}
