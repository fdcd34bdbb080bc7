//! Error types shared across the system

use thiserror::Error;

/// Base error type for the entire system
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("concurrency error: {0}")]
    Concurrency(String),

    #[error("infrastructure error: {0}")]
    Infrastructure(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl DomainError {
    /// True when the error represents a vanished record, which the
    /// reconcilers treat as a no-op rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
