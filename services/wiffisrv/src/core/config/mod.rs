//! Configuration loading and validation
//!
//! Sources, lowest priority first:
//! 1. built-in defaults
//! 2. the configuration file (YAML, TOML or JSON by extension)
//! 3. `WIFFISRV_` environment variables, `__` separates nesting levels
//!    (`WIFFISRV_SERVER__PORT=8189`)

pub mod types;

pub use types::{
    AppConfig, DeviceConfig, ExtensionRuleConfig, LoggingConfig, NativePointDef, ServerConfig,
    ServiceConfig, DEFAULT_PORT,
};

use crate::error::{Result, WiffiSrvError};
use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "WIFFISRV_";

/// Configuration manager
#[derive(Debug)]
pub struct ConfigManager {
    config: AppConfig,
    path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration from a file merged over the defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| WiffiSrvError::config("Invalid file extension"))?;

        let figment = Figment::from(Serialized::defaults(AppConfig::default()));
        let figment = match extension {
            "json" => figment.merge(Json::file(path)),
            "toml" => figment.merge(Toml::file(path)),
            "yaml" | "yml" => figment.merge(Yaml::file(path)),
            _ => {
                return Err(WiffiSrvError::config(format!(
                    "Unsupported config format: {}",
                    extension
                )))
            },
        };

        let config = Self::extract(figment)?;
        info!(
            "Loaded configuration from {} ({} devices)",
            path.display(),
            config.devices.len()
        );

        Ok(Self {
            config,
            path: Some(path.to_path_buf()),
        })
    }

    /// Defaults plus environment overrides, without a file
    pub fn from_env() -> Result<Self> {
        let config = Self::extract(Figment::from(Serialized::defaults(AppConfig::default())))?;
        Ok(Self { config, path: None })
    }

    /// Wrap an already built configuration
    pub fn from_config(config: AppConfig) -> Self {
        Self { config, path: None }
    }

    fn extract(figment: Figment) -> Result<AppConfig> {
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| WiffiSrvError::config(format!("Failed to parse config: {}", e)))
    }

    /// Re-read the file this manager was loaded from
    pub fn reload(&mut self) -> Result<&AppConfig> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| WiffiSrvError::config("Configuration was not loaded from a file"))?;
        let fresh = Self::from_file(&path)?;
        fresh.validate()?;
        self.config = fresh.config;
        debug!("Configuration reloaded from {}", path.display());
        Ok(&self.config)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Check the configuration for values the gateway cannot run with
    pub fn validate(&self) -> Result<()> {
        validate_config(&self.config)
    }
}

/// Validate an application configuration
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.server.port == 0 {
        return Err(WiffiSrvError::config("server.port must not be 0"));
    }
    if config.server.max_buffer_size == 0 {
        return Err(WiffiSrvError::config(
            "server.max_buffer_size must be greater than 0",
        ));
    }

    let mut addresses = HashSet::new();
    for device in &config.devices {
        if device.ip.trim().is_empty() {
            continue;
        }
        if !addresses.insert(device.ip.as_str()) {
            return Err(WiffiSrvError::config(format!(
                "Duplicate device address: {}",
                device.ip
            )));
        }
    }

    let mut native_ids = HashSet::new();
    for point in &config.native_points {
        if point.id.trim().is_empty() {
            return Err(WiffiSrvError::config("Native point with empty id"));
        }
        if !native_ids.insert(point.id.as_str()) {
            return Err(WiffiSrvError::config(format!(
                "Duplicate native point: {}",
                point.id
            )));
        }
    }

    crate::core::extensions::ExtensionRules::compile(&config.extensions)?;
    Ok(())
}
