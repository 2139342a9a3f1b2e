//! Error types for the djx core library.
//!
//! These cover infrastructure failures only. Expected domain outcomes have
//! their own typed results: validation yields
//! [`ValidationError`](crate::validator::ValidationError)s, execution yields a
//! failed [`TraceRecord`](crate::models::TraceRecord), and planning yields a
//! [`PlannerFailure`](crate::planner::PlannerFailure).

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Comprehensive error type for djx infrastructure operations.
#[derive(Error, Debug)]
pub enum DjxError {
    /// Plan catalog connection or query errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: rusqlite::Error,
    },
    /// Plan not found for the given ID
    #[error("Plan with ID {id} not found")]
    PlanNotFound { id: String },
    /// Run not found in the trace store
    #[error("Run with ID {id} not found")]
    RunNotFound { id: String },
    /// File system operation errors
    #[error("File system error at path '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        source: std::io::Error,
    },
    /// XDG directory specification errors
    #[error("XDG directory error: {0}")]
    XdgDirectory(String),
    /// Invalid input validation errors
    #[error("Invalid input for field '{field}': {reason}")]
    InvalidInput { field: String, reason: String },
    /// JSON serialization/deserialization errors
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
    /// YAML plan or recipe document errors
    #[error("YAML error: {source}")]
    Yaml {
        #[from]
        source: serde_yaml::Error,
    },
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
    /// Trace store writer is unavailable or an append did not complete
    #[error("Trace store error: {message}")]
    TraceStore { message: String },
}

/// Builder for creating database errors with optional context.
pub struct DatabaseErrorBuilder {
    message: String,
}

impl DatabaseErrorBuilder {
    /// Create a new database error builder with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Build the error with the given source.
    pub fn with_source(self, source: rusqlite::Error) -> DjxError {
        DjxError::Database {
            message: self.message,
            source,
        }
    }
}

/// Builder for creating input validation errors.
pub struct InvalidInputBuilder {
    field: String,
}

impl InvalidInputBuilder {
    /// Create a new invalid input error builder for a field.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    /// Build the error with the given reason.
    pub fn with_reason(self, reason: impl Into<String>) -> DjxError {
        DjxError::InvalidInput {
            field: self.field,
            reason: reason.into(),
        }
    }
}

impl DjxError {
    /// Creates a builder for database errors.
    pub fn database(message: impl Into<String>) -> DatabaseErrorBuilder {
        DatabaseErrorBuilder::new(message)
    }

    /// Creates a builder for input validation errors.
    pub fn invalid_input(field: impl Into<String>) -> InvalidInputBuilder {
        InvalidInputBuilder::new(field)
    }

    /// Creates a trace store error.
    pub fn trace_store(message: impl Into<String>) -> Self {
        DjxError::TraceStore {
            message: message.into(),
        }
    }
}

/// Specialized extension trait for database-related Results.
pub trait DatabaseResultExt<T> {
    /// Map database errors with a message.
    fn db_context(self, message: &str) -> Result<T>;
}

impl<T> DatabaseResultExt<T> for std::result::Result<T, rusqlite::Error> {
    fn db_context(self, message: &str) -> Result<T> {
        self.map_err(|e| DjxError::database(message).with_source(e))
    }
}

/// Extension trait attaching the offending path to I/O errors.
pub trait IoResultExt<T> {
    /// Map an I/O error into [`DjxError::FileSystem`] for `path`.
    fn fs_context(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, path: &Path) -> Result<T> {
        self.map_err(|source| DjxError::FileSystem {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Result type alias for djx operations
pub type Result<T> = std::result::Result<T, DjxError>;
