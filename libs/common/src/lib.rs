//! Shared building blocks for the Wiffi gateway services
//!
//! Provides:
//! - logging bootstrap (console, daily rolling files, wire log)
//! - startup banner and service metadata
//! - common startup arguments
//! - shutdown signal handling

pub mod bootstrap_args;
pub mod logging;
pub mod service_bootstrap;
pub mod shutdown;

pub use bootstrap_args::ServiceArgs;
pub use service_bootstrap::ServiceInfo;

// Re-export common dependencies
pub use anyhow;
pub use tokio;
