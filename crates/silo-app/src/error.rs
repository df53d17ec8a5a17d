//! Application-facing error type and exit code mapping.
//!
//! Mirrors the CLI surface's documented policy: 0 success; nonzero for
//! argument error, catalog error, plan-blocked, or execution failure.

use silo_model::error::{Classify, ErrorKind};

/// Result alias used throughout the application crate.
pub type AppResult<T> = Result<T, AppError>;

/// Errors surfaced at the `silo-rehome` process boundary.
#[derive(Debug)]
pub enum AppError {
    /// The operator supplied an invalid argument, selector, or scope.
    Argument(String),
    /// A catalog, filesystem, or client-api call failed.
    Catalog(anyhow::Error),
    /// A rehome plan resolved to BLOCK and was not applied.
    PlanBlocked(String),
    /// An apply started but failed partway and was rolled back, or otherwise
    /// could not complete.
    Execution(anyhow::Error),
}

impl AppError {
    /// Construct an [`AppError::Argument`] from a message.
    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument(message.into())
    }

    /// Process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Argument(_) => 2,
            Self::Catalog(_) => 3,
            Self::PlanBlocked(_) => 4,
            Self::Execution(_) => 5,
        }
    }

    /// Human-readable message to print on stderr.
    #[must_use]
    pub fn display_message(&self) -> String {
        match self {
            Self::Argument(message) | Self::PlanBlocked(message) => message.clone(),
            Self::Catalog(error) | Self::Execution(error) => format!("{error:#}"),
        }
    }

    /// Route a classified error into the matching variant.
    fn from_classified<E>(error: E) -> Self
    where
        E: std::error::Error + Classify + Send + Sync + 'static,
    {
        let kind = Classify::classify(&error);
        let error = anyhow::Error::new(error);
        match kind {
            ErrorKind::Policy => Self::PlanBlocked(error.to_string()),
            ErrorKind::Hash | ErrorKind::Filesystem | ErrorKind::Verification | ErrorKind::Cancelled => {
                Self::Execution(error)
            }
            ErrorKind::PathResolution | ErrorKind::Probe | ErrorKind::Catalog | ErrorKind::ClientApi => {
                Self::Catalog(error)
            }
        }
    }
}

impl From<silo_store::StoreError> for AppError {
    fn from(error: silo_store::StoreError) -> Self {
        Self::from_classified(error)
    }
}

impl From<silo_rehome::RehomeError> for AppError {
    fn from(error: silo_rehome::RehomeError) -> Self {
        Self::from_classified(error)
    }
}

impl From<silo_config::ConfigError> for AppError {
    fn from(error: silo_config::ConfigError) -> Self {
        Self::Argument(error.to_string())
    }
}

impl From<silo_client::ClientError> for AppError {
    fn from(error: silo_client::ClientError) -> Self {
        Self::Catalog(error.into())
    }
}
