//! Error types for geomhist-storage

use std::fmt;
use thiserror::Error;

/// Storage error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Database errors (SQLite)
    Database,
    /// Serialization/deserialization errors (JSON columns, timestamps)
    Serialization,
    /// `(feature_id, version)` already present in the store
    DuplicateVersion,
    /// Changeset id already present in the store
    DuplicateChangeset,
    /// A store lock was poisoned by a panicking writer
    Lock,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Database => "database",
            ErrorKind::Serialization => "serialization",
            ErrorKind::DuplicateVersion => "duplicate_version",
            ErrorKind::DuplicateChangeset => "duplicate_changeset",
            ErrorKind::Lock => "lock",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Storage error type
#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct StorageError {
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub kind: ErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // Convenience constructors
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization, message)
    }

    pub fn duplicate_version(feature_id: i64, version: i64) -> Self {
        Self::new(
            ErrorKind::DuplicateVersion,
            format!("Version {} of feature {} is already stored", version, feature_id),
        )
    }

    pub fn duplicate_changeset(changeset_id: i64) -> Self {
        Self::new(
            ErrorKind::DuplicateChangeset,
            format!("Changeset {} is already stored", changeset_id),
        )
    }

    pub fn lock(what: &str) -> Self {
        Self::new(ErrorKind::Lock, format!("{} lock poisoned", what))
    }

    /// True when the error reports a record that is already stored
    pub fn is_duplicate(&self) -> bool {
        matches!(self.kind, ErrorKind::DuplicateVersion | ErrorKind::DuplicateChangeset)
    }
}

// SQLite error conversions
#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::database(format!("SQLite error: {}", err)).with_source(err)
    }
}

// JSON error conversions
impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::serialization(format!("JSON error: {}", err)).with_source(err)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, StorageError>;
