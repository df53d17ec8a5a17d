//! Errors produced by the catalog store.

use silo_model::error::{Classify, ErrorKind};
use thiserror::Error;

/// Result type for catalog store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors produced while reading from or writing to the catalog.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Migrations failed to apply against the catalog database.
    #[error("catalog migration failed")]
    Migrate {
        /// Underlying sqlx migration error.
        #[source]
        source: sqlx::migrate::MigrateError,
    },
    /// A query against the catalog failed.
    #[error("catalog query failed: {operation}")]
    Query {
        /// Name of the operation that failed, for log correlation.
        operation: &'static str,
        /// Underlying sqlx error.
        #[source]
        source: sqlx::Error,
    },
    /// A device referenced by id or fs_uuid does not exist in the catalog.
    #[error("device not found: {identifier}")]
    DeviceNotFound {
        /// The id or fs_uuid that was looked up.
        identifier: String,
    },
    /// A row's stored data could not be decoded into the expected domain type.
    #[error("corrupt catalog row in {table}: {reason}")]
    Decode {
        /// Table the offending row came from.
        table: &'static str,
        /// Human-readable description of the decode failure.
        reason: String,
    },
}

impl Classify for StoreError {
    fn classify(&self) -> ErrorKind {
        ErrorKind::Catalog
    }
}

/// Wrap a fallible sqlx call with the operation name that produced it.
pub(crate) fn query_ctx(operation: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |source| StoreError::Query { operation, source }
}
