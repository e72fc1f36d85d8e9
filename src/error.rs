// src/error.rs

use std::fmt;

/// Storage error enum.
/// Centralizes the failure kinds the persistence layer can surface.
#[derive(Debug)]
pub enum StorageError {
    /// The record store failed or rejected a read/write.
    Store(String),

    /// A labeled unit of work failed; everything inside it was rolled back.
    Transaction { label: String, message: String },

    /// A persisted value could not be decoded into its entity form.
    Encoding(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Store(msg) => write!(f, "store failure: {}", msg),
            StorageError::Transaction { label, message } => {
                write!(f, "unit of work '{}' failed: {}", label, message)
            }
            StorageError::Encoding(msg) => write!(f, "encoding failure: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

/// Converts `sqlx::Error` into `StorageError::Store`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Store(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Encoding(err.to_string())
    }
}
