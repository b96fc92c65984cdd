use thiserror::Error;

use crate::app::AppError;

/// Errors surfaced to the command line
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Operation cancelled by user")]
    UserCancelled,

    #[error("Validation error: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Learned state is busy, try again: {message}")]
    Busy { message: String },

    #[error("Storage operation failed: {message}")]
    Storage { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CliError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput { message: message.into() }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage { message: message.into() }
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

impl From<AppError> for CliError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::InvalidQuery(e) => Self::validation("query", e.to_string()),
            AppError::Schema(e) => Self::validation("tables", e.to_string()),
            AppError::Busy { .. } => Self::Busy { message: err.to_string() },
            AppError::IO(_) | AppError::Store(_) => Self::storage(err.to_string()),
            other => Self::Internal { message: other.to_string() },
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::Storage {
                message: "File not found".to_string()
            },
            std::io::ErrorKind::PermissionDenied => Self::Storage {
                message: "Permission denied".to_string()
            },
            _ => Self::Storage { message: err.to_string() }
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidInput {
            message: format!("JSON error: {}", err)
        }
    }
}
