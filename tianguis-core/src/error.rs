//! Error types for the tianguis core library.

use thiserror::Error;

use crate::types::AccountId;

/// Top-level error type for all core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// No vendor with the given id exists in the catalog.
    #[error("Vendor not found: {0}")]
    VendorNotFound(String),

    /// A caller-supplied transcript failed validation.
    #[error("Invalid transcript: {0}")]
    InvalidTranscript(String),

    /// A profile with this display name already exists.
    #[error("Display name already taken: {0}")]
    DuplicateName(String),

    /// A progress write was attempted before the account's initial load.
    #[error("Progress for account {0} has not been loaded yet")]
    ProgressNotLoaded(AccountId),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, CoreError>;
