//! Error types for wiffi-store

use errors::{ErrorCategory, GatewayError, GatewayErrorTrait};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid object id: {0}")]
    InvalidId(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl GatewayErrorTrait for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "OBJECT_NOT_FOUND",
            Self::AlreadyExists(_) => "OBJECT_EXISTS",
            Self::InvalidId(_) => "INVALID_OBJECT_ID",
            Self::SerializationError(_) => "SERIALIZATION_ERROR",
            Self::Unavailable(_) => "STORE_UNAVAILABLE",
            Self::Other(_) => "STORE_ERROR",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::AlreadyExists(_) => ErrorCategory::Conflict,
            Self::InvalidId(_) => ErrorCategory::Validation,
            Self::SerializationError(_) => ErrorCategory::Internal,
            Self::Unavailable(_) | Self::Other(_) => ErrorCategory::Storage,
        }
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(resource) => GatewayError::NotFound { resource },
            StoreError::AlreadyExists(id) => GatewayError::AlreadyExists(id),
            other => GatewayError::Storage(other.to_string()),
        }
    }
}
