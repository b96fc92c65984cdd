use crate::config::ConfigError;
use crate::feedback::FeedbackError;
use crate::schema::SchemaError;
use crate::semantic::{EmbeddingError, QueryError};
use crate::storage::StoreError;
use crate::training::TrainingError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("invalid query: {0}")]
    InvalidQuery(#[from] QueryError),

    #[error("learned state still busy after {attempts} attempts")]
    Busy { attempts: u32 },

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("feedback error: {0}")]
    Feedback(#[from] FeedbackError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("training error: {0}")]
    Training(#[from] TrainingError),

    #[error("io error: {0:?}")]
    IO(#[from] std::io::Error),

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}

/// Errors that can be a lock timeout worth retrying.
pub trait Retryable {
    fn is_busy(&self) -> bool;
}

impl Retryable for FeedbackError {
    fn is_busy(&self) -> bool {
        FeedbackError::is_busy(self)
    }
}

impl Retryable for StoreError {
    fn is_busy(&self) -> bool {
        StoreError::is_busy(self)
    }
}

impl Retryable for TrainingError {
    fn is_busy(&self) -> bool {
        TrainingError::is_busy(self)
    }
}
