//! Errors produced by the link planner and executor.

use silo_model::error::{Classify, ErrorKind};
use thiserror::Error;

/// Result type for link planning and execution operations.
pub type LinkResult<T> = Result<T, LinkError>;

/// Errors produced while planning or executing a hardlink dedup plan.
#[derive(Debug, Error)]
pub enum LinkError {
    /// A catalog read or write failed.
    #[error("catalog operation failed during link planning")]
    Catalog {
        /// Underlying store error.
        #[source]
        source: silo_store::StoreError,
    },
    /// A filesystem mutation (stat/rename/link/unlink) failed.
    #[error("filesystem operation failed during link execution")]
    FsOps {
        /// Underlying filesystem error.
        #[source]
        source: silo_fsops::FsOpsError,
    },
    /// A plan was requested for a name that does not exist.
    #[error("link plan '{name}' not found")]
    PlanNotFound {
        /// Requested plan name.
        name: String,
    },
}

impl From<silo_store::StoreError> for LinkError {
    fn from(source: silo_store::StoreError) -> Self {
        Self::Catalog { source }
    }
}

impl From<silo_fsops::FsOpsError> for LinkError {
    fn from(source: silo_fsops::FsOpsError) -> Self {
        Self::FsOps { source }
    }
}

impl Classify for LinkError {
    fn classify(&self) -> ErrorKind {
        match self {
            Self::Catalog { .. } => ErrorKind::Catalog,
            Self::FsOps { .. } => ErrorKind::Filesystem,
            Self::PlanNotFound { .. } => ErrorKind::Catalog,
        }
    }
}
