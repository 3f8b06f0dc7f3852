//! Error types shared by every layer of the store

use serde::Serialize;
use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Coarse classification of a [`StoreError`], surfaced to callers alongside the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    NotFound,
    VersionConflict,
    PropertyNotFound,
    ConstraintViolation,
    Unavailable,
    TransactionAborted,
    InvalidInput,
    SchemaMismatch,
    Storage,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::VersionConflict => "version_conflict",
            ErrorKind::PropertyNotFound => "property_not_found",
            ErrorKind::ConstraintViolation => "constraint_violation",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::TransactionAborted => "transaction_aborted",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::SchemaMismatch => "schema_mismatch",
            ErrorKind::Storage => "storage",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("version conflict at '{path}': version {attempted} is not greater than {current}")]
    VersionConflict {
        path: String,
        attempted: u64,
        current: u64,
    },

    #[error("property '{property}' on '{entity_type}' does not exist or is not a list")]
    PropertyNotFound {
        entity_type: String,
        property: String,
    },

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("write batch aborted at operation {index}: {source}")]
    TransactionAborted {
        index: usize,
        #[source]
        source: Box<StoreError>,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::VersionConflict { .. } => ErrorKind::VersionConflict,
            StoreError::PropertyNotFound { .. } => ErrorKind::PropertyNotFound,
            StoreError::ConstraintViolation(_) => ErrorKind::ConstraintViolation,
            StoreError::Unavailable(_) => ErrorKind::Unavailable,
            StoreError::TransactionAborted { .. } => ErrorKind::TransactionAborted,
            StoreError::InvalidInput(_) => ErrorKind::InvalidInput,
            StoreError::SchemaMismatch(_) => ErrorKind::SchemaMismatch,
            StoreError::Io(_) | StoreError::Json(_) => ErrorKind::Storage,
        }
    }

    /// Kind of the innermost error (unwraps aborted transactions)
    pub fn root_kind(&self) -> ErrorKind {
        match self {
            StoreError::TransactionAborted { source, .. } => source.root_kind(),
            other => other.kind(),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        StoreError::InvalidInput(message.into())
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        StoreError::NotFound(message.into())
    }

    pub(crate) fn unavailable(message: impl Into<String>) -> Self {
        StoreError::Unavailable(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_kind_unwraps_aborted_batch() {
        let err = StoreError::TransactionAborted {
            index: 1,
            source: Box::new(StoreError::PropertyNotFound {
                entity_type: "Person".to_string(),
                property: "cats".to_string(),
            }),
        };

        assert_eq!(err.kind(), ErrorKind::TransactionAborted);
        assert_eq!(err.root_kind(), ErrorKind::PropertyNotFound);
        assert!(err.to_string().contains("operation 1"));
    }

    #[test]
    fn test_io_errors_are_storage_kind() {
        let err: StoreError = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }
}
