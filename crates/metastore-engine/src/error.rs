//! Engine error types

use thiserror::Error;

/// Errors raised by [`crate::DocumentEngine`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Concurrency token mismatch, or create over an existing document
    #[error("[{id}]: version conflict, {reason}")]
    VersionConflict {
        index: String,
        id: String,
        reason: String,
    },

    /// Update target does not exist
    #[error("[{id}]: document missing in index [{index}]")]
    DocumentMissing { index: String, id: String },

    /// Search target does not exist
    #[error("no such index [{0}]")]
    IndexNotFound(String),

    /// Source bytes are not a JSON object
    #[error("failed to parse document source: {0}")]
    MapperParsing(String),

    /// Malformed search source or query
    #[error("failed to parse search source: {0}")]
    QueryParsing(String),
}

impl EngineError {
    /// HTTP-style status for this error
    pub fn status(&self) -> u16 {
        match self {
            EngineError::VersionConflict { .. } => 409,
            EngineError::DocumentMissing { .. } | EngineError::IndexNotFound(_) => 404,
            EngineError::MapperParsing(_) | EngineError::QueryParsing(_) => 400,
        }
    }

    /// Error type name in the usual `snake_case` form
    pub fn error_type(&self) -> &'static str {
        match self {
            EngineError::VersionConflict { .. } => "version_conflict_engine_exception",
            EngineError::DocumentMissing { .. } => "document_missing_exception",
            EngineError::IndexNotFound(_) => "index_not_found_exception",
            EngineError::MapperParsing(_) => "mapper_parsing_exception",
            EngineError::QueryParsing(_) => "parsing_exception",
        }
    }
}
