//! Error types for geomhist-core
//!
//! Ingestion errors are fatal to the run. Analysis-time data problems are not
//! errors at all: they are `GeometryChange::DataError` classifications, and
//! only infrastructure failures (storage, I/O) travel through this type.

use std::fmt;

use geomhist_storage::StorageError;
use thiserror::Error;

use crate::config::ConfigError;

/// Where in the edit log an element sits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogPosition {
    /// 1-based ordinal of the element in document order
    pub element: u64,
    /// Byte offset of the reader when the element was decoded
    pub byte_offset: u64,
}

impl fmt::Display for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element #{} (byte {})", self.element, self.byte_offset)
    }
}

/// Main error type for geomhist-core operations
#[derive(Debug, Error)]
pub enum HistoryError {
    /// A log element is missing a required attribute or carries an invalid value
    #[error("Malformed <{element}> at {position}: {reason}")]
    MalformedElement {
        position: LogPosition,
        element: String,
        reason: String,
    },

    /// The log is not well-formed XML
    #[error("XML error at {position}: {source}")]
    Xml {
        position: LogPosition,
        #[source]
        source: quick_xml::Error,
    },

    /// Storage error
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Reading or writing analysis records failed
    #[error("Report error: {0}")]
    Report(String),
}

impl HistoryError {
    pub fn malformed(
        position: LogPosition,
        element: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        HistoryError::MalformedElement {
            position,
            element: element.into(),
            reason: reason.into(),
        }
    }

    pub fn report(msg: impl Into<String>) -> Self {
        HistoryError::Report(msg.into())
    }

    /// Position in the log, for ingestion errors
    pub fn position(&self) -> Option<LogPosition> {
        match self {
            HistoryError::MalformedElement { position, .. } | HistoryError::Xml { position, .. } => {
                Some(*position)
            }
            _ => None,
        }
    }
}

/// Result type alias for geomhist operations
pub type Result<T> = std::result::Result<T, HistoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_display_names_position() {
        let err = HistoryError::malformed(
            LogPosition {
                element: 12,
                byte_offset: 340,
            },
            "node",
            "attribute 'id': invalid digit in 'x1'",
        );
        assert_eq!(
            err.to_string(),
            "Malformed <node> at element #12 (byte 340): attribute 'id': invalid digit in 'x1'"
        );
        assert_eq!(err.position().map(|p| p.element), Some(12));
    }

    #[test]
    fn test_storage_error_is_transparent() {
        let err: HistoryError = StorageError::duplicate_version(5, 2).into();
        assert!(err.to_string().starts_with("[duplicate_version]"));
        assert!(err.position().is_none());
    }
}
