//! Error handling for the purge engine.
//!
//! Failures are isolated at the smallest unit that can contain them:
//! a record fault never fails its batch, a failed batch never aborts its
//! siblings, and only a listing failure ends an attempt early.

use thiserror::Error;

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, PurgeError>;

/// Main error type for the purge engine
#[derive(Error, Debug)]
pub enum PurgeError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The store could not be queried for record identifiers.
    /// Fatal to the current attempt; no batches are dispatched.
    #[error("Listing failed: {0}")]
    List(String),

    /// A credential's connection could not be established
    #[error("Connection error for client {client_id}: {message}")]
    Connection {
        /// Client id of the credential that failed to connect
        client_id: String,
        /// Underlying failure
        message: String,
    },

    /// The delete request for one batch could not be submitted at all
    #[error("Batch submission failed: {0}")]
    Batch(String),

    /// Errors surfaced by the record store implementation
    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
