//! Error types for questlog-core

use thiserror::Error;

/// Result type alias using questlog-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in questlog-core operations.
///
/// Remote-store failures are deliberately absent here: they are confined to
/// [`crate::remote::RemoteError`] and converted to `sync-failed`
/// notifications at the adapter boundary, never propagated into the
/// completion-event path.
#[derive(Error, Debug)]
pub enum Error {
    /// Local store error
    #[error("Local store error: {0}")]
    LocalStore(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Habit not found
    #[error("Habit not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
