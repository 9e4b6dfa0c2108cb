//! Generation error types.

use thiserror::Error;

/// Errors that can occur while asking the backend for a vendor reply.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// No credentials were configured. Fatal for generation; never retried.
    #[error("No generation credentials configured")]
    PoolEmpty,

    /// The backend answered with a non-success status.
    #[error("Generation backend returned HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// HTTP request failed.
    #[error("Generation request failed: {0}")]
    RequestFailed(String),

    /// A single attempt exceeded its deadline.
    #[error("Generation attempt timed out after {0}ms")]
    Timeout(u64),

    /// Backend could not be reached.
    #[error("Generation backend unavailable: {0}")]
    Unavailable(String),

    /// Response body was not the expected JSON.
    #[error("Failed to parse generation response: {0}")]
    ParseError(String),

    /// Every credential was tried without a usable reply.
    #[error("All {attempts} generation attempts failed: {last_error}")]
    AttemptsExhausted {
        /// Number of attempts made.
        attempts: usize,
        /// Error of the final attempt.
        last_error: String,
    },

    /// Configuration error.
    #[error("Generation configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GenerationError::Timeout(0)
        } else if err.is_connect() {
            GenerationError::Unavailable(err.to_string())
        } else if err.is_decode() {
            GenerationError::ParseError(err.to_string())
        } else {
            GenerationError::RequestFailed(err.to_string())
        }
    }
}
