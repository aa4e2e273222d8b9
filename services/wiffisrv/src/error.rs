//! Error handling for the Wiffi gateway service

use errors::{ErrorCategory, GatewayError, GatewayErrorTrait};
use thiserror::Error;
use wiffi_store::StoreError;

/// Gateway service error type
#[derive(Error, Debug, Clone)]
pub enum WiffiSrvError {
    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Socket and file errors
    #[error("IO error: {0}")]
    IoError(String),

    /// Listener setup and accept errors
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Datagram content errors (missing address, missing module type)
    #[error("Datagram error: {0}")]
    DatagramError(String),

    /// Datagram from an address that is not configured
    #[error("Unregistered Wiffi with ip {0}")]
    UnknownDevice(String),

    /// Required data point missing from the store
    #[error("Point error: {0}")]
    PointError(String),

    /// Object store failures
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Invalid extension rule expressions and similar
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Result type alias for the gateway service
pub type Result<T> = std::result::Result<T, WiffiSrvError>;

impl WiffiSrvError {
    pub fn config(msg: impl Into<String>) -> Self {
        WiffiSrvError::ConfigError(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        WiffiSrvError::ConnectionError(msg.into())
    }

    pub fn datagram(msg: impl Into<String>) -> Self {
        WiffiSrvError::DatagramError(msg.into())
    }

    pub fn point(msg: impl Into<String>) -> Self {
        WiffiSrvError::PointError(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        WiffiSrvError::StorageError(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        WiffiSrvError::ValidationError(msg.into())
    }
}

// ============================================================================
// From implementations for external error types
// ============================================================================

impl From<std::io::Error> for WiffiSrvError {
    fn from(err: std::io::Error) -> Self {
        WiffiSrvError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for WiffiSrvError {
    fn from(err: serde_json::Error) -> Self {
        WiffiSrvError::DatagramError(format!("JSON: {err}"))
    }
}

impl From<figment::Error> for WiffiSrvError {
    fn from(err: figment::Error) -> Self {
        WiffiSrvError::ConfigError(err.to_string())
    }
}

impl From<regex::Error> for WiffiSrvError {
    fn from(err: regex::Error) -> Self {
        WiffiSrvError::ValidationError(format!("Regex: {err}"))
    }
}

impl From<StoreError> for WiffiSrvError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => WiffiSrvError::PointError(format!("not found: {id}")),
            other => WiffiSrvError::StorageError(other.to_string()),
        }
    }
}

// ============================================================================
// Conversion from WiffiSrvError to GatewayError at the process boundary
// ============================================================================

impl From<WiffiSrvError> for GatewayError {
    fn from(err: WiffiSrvError) -> Self {
        match err {
            WiffiSrvError::ConfigError(msg) => GatewayError::Configuration(msg),
            WiffiSrvError::IoError(msg) => GatewayError::Io(std::io::Error::other(msg)),
            WiffiSrvError::ConnectionError(reason) => GatewayError::ConnectionFailed {
                endpoint: "wiffisrv".to_string(),
                reason,
            },
            WiffiSrvError::DatagramError(msg) => GatewayError::Datagram(msg),
            WiffiSrvError::UnknownDevice(ip) => GatewayError::UnknownDevice(ip),
            WiffiSrvError::PointError(msg) => GatewayError::NotFound {
                resource: format!("Point: {}", msg),
            },
            WiffiSrvError::StorageError(msg) => GatewayError::Storage(msg),
            WiffiSrvError::ValidationError(msg) => GatewayError::Validation(msg),
            WiffiSrvError::InternalError(msg) => GatewayError::Internal(msg),
        }
    }
}

impl GatewayErrorTrait for WiffiSrvError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigError(_) => "WIFFISRV_CONFIG_ERROR",
            Self::IoError(_) => "WIFFISRV_IO_ERROR",
            Self::ConnectionError(_) => "WIFFISRV_CONNECTION_ERROR",
            Self::DatagramError(_) => "WIFFISRV_DATAGRAM_ERROR",
            Self::UnknownDevice(_) => "WIFFISRV_UNKNOWN_DEVICE",
            Self::PointError(_) => "WIFFISRV_POINT_ERROR",
            Self::StorageError(_) => "WIFFISRV_STORAGE_ERROR",
            Self::ValidationError(_) => "WIFFISRV_VALIDATION_ERROR",
            Self::InternalError(_) => "WIFFISRV_INTERNAL_ERROR",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError(_) => ErrorCategory::Configuration,
            Self::IoError(_) | Self::InternalError(_) => ErrorCategory::Internal,
            Self::ConnectionError(_) => ErrorCategory::Connection,
            Self::DatagramError(_) => ErrorCategory::Protocol,
            Self::UnknownDevice(_) | Self::PointError(_) => ErrorCategory::NotFound,
            Self::StorageError(_) => ErrorCategory::Storage,
            Self::ValidationError(_) => ErrorCategory::Validation,
        }
    }

    // Unregistered senders log at warn, every other dropped datagram at error
    fn log_level(&self) -> tracing::Level {
        match self {
            Self::UnknownDevice(_) => tracing::Level::WARN,
            _ => tracing::Level::ERROR,
        }
    }
}
