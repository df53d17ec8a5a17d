//! Errors produced by path resolution and filesystem probing.
//!
//! # Design
//! - Structured, constant-message errors with operation/path context, in
//!   the same style as the catalog store and scanner error types.
//! - Preserve source errors without interpolating context into messages.

use std::io;
use std::path::PathBuf;

use silo_model::error::{Classify, ErrorKind};
use thiserror::Error;

/// Result type for path resolution and probing operations.
pub type FsOpsResult<T> = Result<T, FsOpsError>;

/// Errors produced by the path resolver and filesystem probe.
#[derive(Debug, Error)]
pub enum FsOpsError {
    /// Canonicalization failed because the final target does not exist or
    /// is not reachable.
    #[error("path canonicalization failed")]
    Canonicalize {
        /// Path that could not be canonicalized.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The mount table could not be read or parsed.
    #[error("mount table unavailable")]
    MountTable {
        /// Underlying IO error reading `/proc/self/mountinfo`.
        source: io::Error,
    },
    /// No mount entry covers the given path.
    #[error("no mount entry covers path")]
    NoMountEntry {
        /// Path that could not be resolved to a mount.
        path: PathBuf,
    },
    /// A POSIX `stat` call failed while probing a path or device.
    #[error("stat failed during probe")]
    Stat {
        /// Path that could not be stat-ed.
        path: PathBuf,
        /// Underlying nix error.
        source: nix::Error,
    },
    /// No persistent filesystem UUID could be determined and the
    /// deterministic fallback could not be computed.
    #[error("filesystem uuid probe failed")]
    UuidProbe {
        /// Mount source that could not be identified.
        mount_source: String,
    },
    /// A mutating filesystem operation (`rename`, `link`, `remove_file`)
    /// failed.
    #[error("filesystem operation '{operation}' failed on '{path}'")]
    Mutate {
        /// Operation name, e.g. `rename`, `hard_link`, `remove_file`.
        operation: &'static str,
        /// Path the operation targeted.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
}

impl Classify for FsOpsError {
    fn classify(&self) -> ErrorKind {
        match self {
            Self::Canonicalize { .. } | Self::NoMountEntry { .. } => ErrorKind::PathResolution,
            Self::MountTable { .. } | Self::Stat { .. } | Self::UuidProbe { .. } => {
                ErrorKind::Probe
            }
            Self::Mutate { .. } => ErrorKind::Filesystem,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn classify_maps_variants_to_kinds() {
        let canonicalize = FsOpsError::Canonicalize {
            path: PathBuf::from("/missing"),
            source: io::Error::other("missing"),
        };
        assert_eq!(canonicalize.classify(), ErrorKind::PathResolution);
        assert!(canonicalize.source().is_some());

        let no_mount = FsOpsError::NoMountEntry {
            path: PathBuf::from("/missing"),
        };
        assert_eq!(no_mount.classify(), ErrorKind::PathResolution);

        let mount_table = FsOpsError::MountTable {
            source: io::Error::other("io"),
        };
        assert_eq!(mount_table.classify(), ErrorKind::Probe);

        let uuid_probe = FsOpsError::UuidProbe {
            mount_source: "/dev/sda1".to_string(),
        };
        assert_eq!(uuid_probe.classify(), ErrorKind::Probe);
    }
}
