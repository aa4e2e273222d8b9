//! Unified error handling for the Wiffi gateway
//!
//! This module provides the error type shared by the gateway binary and its
//! libraries. Service crates keep their own domain error enums and convert
//! into [`GatewayError`] at the process boundary.

use thiserror::Error;

// ============================================================================
// GatewayError - Main error type
// ============================================================================

/// Main error type for the gateway process
#[derive(Debug, Error)]
pub enum GatewayError {
    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    // ======================================
    // Storage Errors
    // ======================================
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    // ======================================
    // Protocol & Communication Errors
    // ======================================
    #[error("Framing error: {0}")]
    Framing(String),

    #[error("Datagram error: {0}")]
    Datagram(String),

    #[error("Unregistered device: {0}")]
    UnknownDevice(String),

    #[error("Connection failed: {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    // ======================================
    // Validation Errors
    // ======================================
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Pattern error: {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    // ======================================
    // File & I/O Errors
    // ======================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ======================================
    // Service & Runtime Errors
    // ======================================
    #[error("Service startup failed: {0}")]
    StartupFailed(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using GatewayError
pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for GatewayError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Deserialization(err.to_string())
    }
}

impl From<std::num::ParseIntError> for GatewayError {
    fn from(err: std::num::ParseIntError) -> Self {
        Self::Validation(format!("Invalid integer: {}", err))
    }
}

// Helper macros for creating errors
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::GatewayError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::GatewayError::Configuration(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! validation_error {
    ($msg:expr) => {
        $crate::GatewayError::Validation($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::GatewayError::Validation(format!($fmt, $($arg)*))
    };
}

// ============================================================================
// GatewayError implements GatewayErrorTrait
// ============================================================================

impl GatewayErrorTrait for GatewayError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::MissingConfig(_) => "MISSING_CONFIG",

            Self::Storage(_) => "STORAGE_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",

            Self::Framing(_) => "FRAMING_ERROR",
            Self::Datagram(_) => "DATAGRAM_ERROR",
            Self::UnknownDevice(_) => "UNKNOWN_DEVICE",
            Self::ConnectionFailed { .. } => "CONNECTION_FAILED",

            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidPattern { .. } => "INVALID_PATTERN",

            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Deserialization(_) => "DESERIALIZATION_ERROR",

            Self::StartupFailed(_) => "STARTUP_FAILED",
            Self::ShutdownError(_) => "SHUTDOWN_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Other(_) => "OTHER_ERROR",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) | Self::InvalidConfig { .. } | Self::MissingConfig(_) => {
                ErrorCategory::Configuration
            },

            Self::Storage(_) => ErrorCategory::Storage,

            Self::NotFound { .. } | Self::UnknownDevice(_) => ErrorCategory::NotFound,

            Self::AlreadyExists(_) => ErrorCategory::Conflict,

            Self::Framing(_) | Self::Datagram(_) => ErrorCategory::Protocol,

            Self::ConnectionFailed { .. } => ErrorCategory::Connection,

            Self::Validation(_) | Self::InvalidPattern { .. } => ErrorCategory::Validation,

            Self::Io(_)
            | Self::Serialization(_)
            | Self::Deserialization(_)
            | Self::StartupFailed(_)
            | Self::ShutdownError(_)
            | Self::Internal(_) => ErrorCategory::Internal,

            Self::Other(_) => ErrorCategory::Unknown,
        }
    }
}

// ============================================================================
// Gateway Error Trait - Architectural layer
// ============================================================================

/// Error category enum - used for classification and log routing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    // Infrastructure layer
    Configuration,
    Storage,

    // Business logic layer
    Validation,
    NotFound,
    Conflict,

    // Protocol/communication layer
    Protocol,
    Connection,

    // System level
    Internal,

    // Others
    Unknown,
}

/// Gateway error capability trait
///
/// Each crate keeps its own domain-specific error type (e.g. `StoreError`,
/// `WiffiSrvError`) and gains a common interface by implementing this trait.
pub trait GatewayErrorTrait: std::error::Error + Send + Sync + 'static {
    /// Get error code (for logs)
    fn error_code(&self) -> &'static str;

    /// Get error category
    fn category(&self) -> ErrorCategory;

    /// Whether the error is worth retrying (default implementation is category-based)
    fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Connection | ErrorCategory::Storage
        )
    }

    /// Get log level
    fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self.category() {
            ErrorCategory::Internal | ErrorCategory::Storage => Level::ERROR,
            ErrorCategory::Connection | ErrorCategory::Protocol => Level::WARN,
            ErrorCategory::Validation | ErrorCategory::NotFound => Level::INFO,
            _ => Level::WARN,
        }
    }
}
