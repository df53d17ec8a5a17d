//! Configuration document shapes.
//!
//! [`RawConfig`] mirrors the on-disk TOML document field-for-field, with
//! every field optional so a partial file is legal. [`SiloConfig`] is the
//! fully resolved, validated configuration the rest of the toolkit consumes.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Default catalog database path when neither the TOML file nor
/// `SILO_CATALOG_PATH` specify one.
pub const DEFAULT_CATALOG_PATH: &str = "silo.db";

/// Default number of concurrent hashing workers.
pub const DEFAULT_HASH_CONCURRENCY: usize = 4;

/// Default freshness window: a seeding-domain root must have been scanned
/// within this many seconds of a rehome plan being computed.
pub const DEFAULT_FRESHNESS_SECS: u64 = 86_400;

/// Default suffix appended to a duplicate file while a hardlink action backs
/// it up before verifying the replacement link.
pub const DEFAULT_BACKUP_SUFFIX: &str = ".silo-bak";

/// On-disk TOML document shape. Every field is optional; missing fields fall
/// back to defaults or environment variables during resolution.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfig {
    /// Path to the catalog database file.
    pub catalog_path: Option<PathBuf>,
    /// Directory prefixes considered part of the seeding domain.
    #[serde(default)]
    pub seeding_domain_roots: Vec<PathBuf>,
    /// Template used to compute a new payload's target root on a device when
    /// no existing sibling payload is found, e.g. `/cold/data/{payload_hash}`.
    pub pool_payload_root_template: Option<String>,
    /// Number of concurrent hashing workers used by the scanner.
    pub hash_concurrency: Option<usize>,
    /// Freshness window, in seconds, for the rehome planner's scan-coverage
    /// check.
    pub freshness_secs: Option<u64>,
    /// Suffix appended to a duplicate path while the link executor backs it
    /// up.
    pub backup_suffix: Option<String>,
    /// Torrent client connection settings.
    #[serde(default)]
    pub client: RawClientConfig,
}

/// On-disk torrent client settings. Credentials are normally supplied via
/// environment variables instead and take precedence when set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawClientConfig {
    /// Base URL of the torrent client's WebUI API.
    pub url: Option<String>,
    /// Username for session authentication.
    pub username: Option<String>,
    /// Password for session authentication.
    pub password: Option<String>,
}

/// Torrent client connection settings, fully resolved.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the torrent client's WebUI API.
    pub url: String,
    /// Username for session authentication.
    pub username: String,
    /// Password for session authentication.
    pub password: String,
}

/// Fully resolved configuration consumed by the rest of the toolkit.
#[derive(Debug, Clone)]
pub struct SiloConfig {
    /// Path to the catalog database file.
    pub catalog_path: PathBuf,
    /// Directory prefixes considered part of the seeding domain.
    pub seeding_domain_roots: Vec<PathBuf>,
    /// Template used to compute a new payload's target root.
    pub pool_payload_root_template: String,
    /// Number of concurrent hashing workers used by the scanner.
    pub hash_concurrency: usize,
    /// Freshness window for the rehome planner's scan-coverage check.
    pub freshness: Duration,
    /// Suffix appended to a duplicate path while the link executor backs it
    /// up.
    pub backup_suffix: String,
    /// Torrent client connection settings.
    pub client: ClientConfig,
}

impl SiloConfig {
    /// Render the payload pool root for a given payload hash by substituting
    /// the `{payload_hash}` placeholder in [`Self::pool_payload_root_template`].
    #[must_use]
    pub fn pool_payload_root(&self, payload_hash: &str) -> PathBuf {
        PathBuf::from(
            self.pool_payload_root_template
                .replace("{payload_hash}", payload_hash),
        )
    }

    /// Whether `path` lies under any configured seeding-domain root.
    #[must_use]
    pub fn is_in_seeding_domain(&self, path: &std::path::Path) -> bool {
        self.seeding_domain_roots
            .iter()
            .any(|root| path.starts_with(root))
    }
}
