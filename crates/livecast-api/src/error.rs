//! Error types for the provider client.

use thiserror::Error;

/// Errors that can occur calling the streaming provider.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Structured error returned by the provider.
    #[error("provider error {code}: {message}")]
    Api {
        /// Machine-readable error code.
        code: i64,
        /// Human-readable message.
        message: String,
    },

    /// Network failure reaching the provider.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Invalid API base URL.
    #[error("invalid API base URL: {0}")]
    InvalidUrl(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Response that fits no expected shape.
    #[error("unexpected provider response: {0}")]
    Unexpected(String),
}
