//! Error taxonomy shared by every backend

use thiserror::Error;

/// Result type for data object operations
pub type Result<T> = std::result::Result<T, DataObjectError>;

/// Errors surfaced by the data object layer.
///
/// Backend-native errors are translated into one of these variants at the edge of each backend,
/// so callers can decide on retries without knowing which store is active. Nothing is retried
/// automatically.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataObjectError {
    /// Malformed request or a payload that cannot be serialized. Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The target of an update does not exist. Get reports absence as a response instead.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Concurrency token mismatch, or a create over an existing id
    #[error("Version conflict: {0}")]
    Conflict(String),

    /// Transport or I/O failure talking to the store
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Missing or invalid settings, raised only while building a backend
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The active backend cannot perform this operation
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// An I/O edge was reached from a restricted context without elevation
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

/// Coarse error classification for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    BackendUnavailable,
    Configuration,
    Unsupported,
    PermissionDenied,
}

impl DataObjectError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            DataObjectError::Validation(_) => ErrorKind::Validation,
            DataObjectError::NotFound(_) => ErrorKind::NotFound,
            DataObjectError::Conflict(_) => ErrorKind::Conflict,
            DataObjectError::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            DataObjectError::Configuration(_) => ErrorKind::Configuration,
            DataObjectError::Unsupported(_) => ErrorKind::Unsupported,
            DataObjectError::PermissionDenied(_) => ErrorKind::PermissionDenied,
        }
    }

    /// True for version conflicts; callers re-fetch and retry these
    pub fn is_conflict(&self) -> bool {
        matches!(self, DataObjectError::Conflict(_))
    }

    /// True when retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DataObjectError::BackendUnavailable(_) | DataObjectError::Conflict(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let conflict = DataObjectError::Conflict("seq_no 3 != 4".to_string());
        assert_eq!(conflict.kind(), ErrorKind::Conflict);
        assert!(conflict.is_conflict());
        assert!(conflict.is_transient());

        let invalid = DataObjectError::Validation("bad".to_string());
        assert!(!invalid.is_transient());
        assert_eq!(invalid.to_string(), "Validation error: bad");
    }
}
