//! Common startup arguments for gateway services
//!
//! Each service parses its own clap `Args` and converts them into
//! [`ServiceArgs`] for the shared bootstrap code.

use std::path::PathBuf;

/// Common service startup arguments
#[derive(Debug, Clone)]
pub struct ServiceArgs {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Optional bind address override (e.g., 0.0.0.0:8189)
    pub bind_address: Option<String>,

    /// Configuration file given on the command line
    pub config: Option<PathBuf>,

    /// Disable colored output
    pub no_color: bool,

    /// Only validate configuration without starting service
    pub validate: bool,
}

impl Default for ServiceArgs {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            bind_address: None,
            config: None,
            no_color: false,
            validate: false,
        }
    }
}

impl ServiceArgs {
    /// Parse log level string to tracing::Level
    pub fn parse_log_level(&self) -> tracing::Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "warn" | "warning" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => tracing::Level::INFO,
        }
    }

    /// Resolve the configuration file path
    ///
    /// Priority: `--config` > `{SERVICE}_CONFIG` env > `config/{service}.yaml`
    pub fn config_path(&self, service_name: &str) -> PathBuf {
        if let Some(path) = &self.config {
            return path.clone();
        }

        let env_var = format!("{}_CONFIG", service_name.to_uppercase());
        if let Ok(path) = std::env::var(&env_var) {
            return PathBuf::from(path);
        }

        PathBuf::from(format!("config/{}.yaml", service_name))
    }
}
