//! CLI-facing error type and exit code mapping.
//!
//! Every core crate's error type classifies into a [`silo_model::ErrorKind`];
//! this module folds that taxonomy into the four exit-code buckets the CLI
//! surface promises: argument error, catalog error, plan-blocked, and
//! execution failure.

use silo_model::error::{Classify, ErrorKind};

/// Result alias used throughout the CLI crate.
pub type CliResult<T> = Result<T, CliError>;

/// Errors surfaced at the CLI boundary, carrying enough detail to print a
/// message and choose a process exit code.
#[derive(Debug)]
pub enum CliError {
    /// The user supplied an invalid argument, selector, or flag combination.
    Argument(String),
    /// A catalog, filesystem, or client-api call failed.
    Catalog(anyhow::Error),
    /// A rehome or link plan refused to proceed (a policy check blocked it).
    PlanBlocked(String),
    /// An operation started but failed partway and could not complete.
    Execution(anyhow::Error),
}

impl CliError {
    /// Construct an [`CliError::Argument`] from a message.
    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument(message.into())
    }

    /// Process exit code for this error, per the CLI surface's documented
    /// policy: 0 success; nonzero for argument error, catalog error,
    /// plan-blocked, or execution failure.
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

impl From<silo_store::StoreError> for CliError {
    fn from(error: silo_store::StoreError) -> Self {
        Self::from_classified(error)
    }
}

impl From<silo_scan::ScanError> for CliError {
    fn from(error: silo_scan::ScanError) -> Self {
        Self::from_classified(error)
    }
}

impl From<silo_payload::PayloadError> for CliError {
    fn from(error: silo_payload::PayloadError) -> Self {
        Self::from_classified(error)
    }
}

impl From<silo_link::LinkError> for CliError {
    fn from(error: silo_link::LinkError) -> Self {
        Self::from_classified(error)
    }
}

impl From<silo_config::ConfigError> for CliError {
    fn from(error: silo_config::ConfigError) -> Self {
        Self::Argument(error.to_string())
    }
}

impl From<silo_client::ClientError> for CliError {
    fn from(error: silo_client::ClientError) -> Self {
        Self::Catalog(error.into())
    }
}
