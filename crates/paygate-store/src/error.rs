//! Store error types

use paygate_types::GatewayError;
use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate: {0}")]
    Duplicate(String),

    /// Optimistic-version collision; the caller lost the write race
    #[error("version conflict: {0}")]
    Conflict(String),

    #[error("query error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => GatewayError::NotFound(msg),
            StoreError::Duplicate(msg) => GatewayError::Conflict(msg),
            StoreError::Conflict(msg) => GatewayError::Conflict(msg),
            other => GatewayError::Internal(other.to_string()),
        }
    }
}
