//! Cross-cutting error kind taxonomy.
//!
//! # Design
//! - Every crate in the workspace owns its own `thiserror` error type, in the
//!   same `{operation, path, source}` struct-variant style the catalog store
//!   and filesystem pipeline use.
//! - Each of those error types implements [`Classify`] so planners and
//!   executors can collect uniform `reasons[]`/"last error text" without
//!   collapsing crate-specific detail into one god enum.

use std::fmt;

/// Coarse-grained error category surfaced to users and recorded on plans,
/// actions, and scan sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Canonicalization or bind-mount resolution failed.
    PathResolution,
    /// Filesystem-UUID or mount probing failed.
    Probe,
    /// The catalog store rejected or failed to execute an operation.
    Catalog,
    /// Content hashing failed.
    Hash,
    /// A POSIX filesystem operation (stat/link/rename/unlink) failed.
    Filesystem,
    /// The external torrent client API returned an error or timed out.
    ClientApi,
    /// A safety policy (external consumer, scan freshness, no-blind-copy) was
    /// violated; this always produces a BLOCK decision rather than a partial
    /// apply.
    Policy,
    /// A post-condition check (checksum, inode, file count) failed.
    Verification,
    /// The operation was cancelled cooperatively between steps.
    Cancelled,
}

impl ErrorKind {
    /// Stable lowercase label used in log fields and plan JSON.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PathResolution => "path_resolution",
            Self::Probe => "probe",
            Self::Catalog => "catalog",
            Self::Hash => "hash",
            Self::Filesystem => "filesystem",
            Self::ClientApi => "client_api",
            Self::Policy => "policy",
            Self::Verification => "verification",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implemented by every crate-local error type so cross-cutting callers
/// (planners, executors, session/audit rows) can classify a failure without
/// matching on crate-specific variants.
pub trait Classify {
    /// Return the coarse-grained category this error falls into.
    fn classify(&self) -> ErrorKind;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_round_trips_through_str() {
        let kinds = [
            ErrorKind::PathResolution,
            ErrorKind::Probe,
            ErrorKind::Catalog,
            ErrorKind::Hash,
            ErrorKind::Filesystem,
            ErrorKind::ClientApi,
            ErrorKind::Policy,
            ErrorKind::Verification,
            ErrorKind::Cancelled,
        ];
        for kind in kinds {
            assert_eq!(kind.to_string(), kind.as_str());
        }
    }

    #[test]
    fn error_kind_serializes_snake_case() {
        let value = serde_json::to_value(ErrorKind::ClientApi).unwrap();
        assert_eq!(value, serde_json::json!("client_api"));
    }
}
