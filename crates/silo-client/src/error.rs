//! Structured errors for the torrent client.

use thiserror::Error;

/// Result alias used throughout this crate.
pub type ClientResult<T> = Result<T, ClientError>;

/// Structured errors emitted by [`crate::TorrentClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The underlying HTTP request could not be sent or the connection was
    /// dropped mid-flight.
    #[error("request failed during '{operation}': {source}")]
    Request {
        /// Client operation that failed (e.g. `login`, `list_torrents`).
        operation: &'static str,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The client responded with a non-success status code.
    #[error("'{operation}' returned unexpected status {status}: {body}")]
    UnexpectedStatus {
        /// Client operation that failed.
        operation: &'static str,
        /// HTTP status code returned.
        status: u16,
        /// Response body, truncated for readability.
        body: String,
    },

    /// The response body could not be decoded into the expected shape.
    #[error("failed to decode response for '{operation}': {source}")]
    Decode {
        /// Client operation that failed.
        operation: &'static str,
        /// Underlying deserialization error.
        #[source]
        source: reqwest::Error,
    },

    /// Authentication with the torrent client failed.
    #[error("authentication failed: {reason}")]
    Login {
        /// Human-readable failure reason.
        reason: String,
    },

    /// A named torrent was not found by the client.
    #[error("torrent '{infohash}' not found")]
    NotFound {
        /// Infohash that was not found.
        infohash: String,
    },
}
