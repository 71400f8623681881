//! Error types for opening and configuring the SQLite engine.

use thiserror::Error;

/// Errors that can occur while setting up a SQLite-backed store.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// Configuration file I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// A configuration value is unusable (e.g. an invalid error pattern).
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;
