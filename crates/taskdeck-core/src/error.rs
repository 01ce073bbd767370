use thiserror::Error;

use crate::types::{SortField, SortOrder};

/// Top-level error type for the taskdeck service.
///
/// Validation and not-found variants are expected outcomes that handlers
/// report directly. Everything else is treated as a server-side failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TaskdeckError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Invalid sortBy '{value}'. Must be one of: {}", SortField::ALLOWED.join(", "))]
    InvalidSortField { value: String },

    #[error("Invalid sortOrder '{value}'. Must be one of: {}", SortOrder::ALLOWED.join(", "))]
    InvalidSortOrder { value: String },

    #[error("Todo {0} not found")]
    NotFound(i64),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TaskdeckError {
    /// Shorthand for a field-level validation failure.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        TaskdeckError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<toml::de::Error> for TaskdeckError {
    fn from(err: toml::de::Error) -> Self {
        TaskdeckError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for TaskdeckError {
    fn from(err: toml::ser::Error) -> Self {
        TaskdeckError::Config(err.to_string())
    }
}

/// A specialized `Result` type for taskdeck operations.
pub type Result<T> = std::result::Result<T, TaskdeckError>;
