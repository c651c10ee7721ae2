//! Collaborator error types.

use thiserror::Error;

/// Errors from exam lookup backends.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The backend answered with an error status.
    #[error("lookup API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The backend returned something that is not an exam definition.
    #[error("invalid exam definition from backend: {0}")]
    InvalidDefinition(String),

    /// The request timed out.
    #[error("lookup timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),
}

/// Errors from result persisters.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The store file could not be written.
    #[error("failed to write result store {path}: {message}")]
    Io { path: String, message: String },

    /// The result could not be encoded.
    #[error("failed to encode result: {0}")]
    Encode(String),

    /// The backend answered with an error status.
    #[error("results API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("results request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),
}
