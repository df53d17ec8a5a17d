//! Errors produced while hashing file contents.

use std::io;
use std::path::PathBuf;

use silo_model::error::{Classify, ErrorKind};
use thiserror::Error;

/// Result type for hashing operations.
pub type HashResult<T> = Result<T, HashError>;

/// Errors produced by the fast-sample and full digest routines.
#[derive(Debug, Error)]
pub enum HashError {
    /// The file could not be opened for reading.
    #[error("failed to open file for hashing")]
    Open {
        /// Path that could not be opened.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A read or seek failed partway through hashing.
    #[error("read failed while hashing")]
    Read {
        /// Path being hashed when the read failed.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
}

impl Classify for HashError {
    fn classify(&self) -> ErrorKind {
        ErrorKind::Hash
    }
}
