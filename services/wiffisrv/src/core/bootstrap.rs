//! Service bootstrap and initialization
//!
//! This module handles:
//! - command line arguments
//! - logging configuration
//! - configuration validation
//! - bind address selection
//! - configuration reload on SIGUSR1

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use common::service_bootstrap::ServiceInfo;
use errors::{GatewayError, GatewayResult};

use crate::core::config::{ConfigManager, LoggingConfig, DEFAULT_PORT};
use crate::core::gateway::Gateway;

pub use common::bootstrap_args::ServiceArgs;

/// Environment variables for the bind address
const HOST_ENV: &str = "SERVICE_HOST";
const PORT_ENV: &str = "SERVICE_PORT";

/// Command-line arguments for wiffisrv
#[derive(Parser, Clone, Debug)]
#[command(
    name = "wiffisrv",
    version = env!("CARGO_PKG_VERSION"),
    about = "Wiffi telemetry gateway",
    long_about = None
)]
pub struct Args {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(short = 'c', long, env = "WIFFISRV_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to the configured level
    #[arg(short = 'l', long)]
    pub log_level: Option<String>,

    /// Bind address for the datagram listener
    #[arg(short = 'b', long)]
    pub bind_address: Option<String>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Validation mode - only validate configuration without starting service
    #[arg(long)]
    pub validate: bool,
}

impl From<Args> for ServiceArgs {
    fn from(args: Args) -> Self {
        ServiceArgs {
            log_level: args.log_level.unwrap_or_else(|| "info".to_string()),
            bind_address: args.bind_address,
            config: args.config,
            no_color: args.no_color,
            validate: args.validate,
        }
    }
}

pub fn service_info() -> ServiceInfo {
    ServiceInfo::new("wiffisrv", "Wiffi Telemetry Gateway", DEFAULT_PORT)
        .with_version(env!("CARGO_PKG_VERSION"))
}

/// Initialize logging from command line and configuration
///
/// A level given on the command line wins over the configured one.
pub fn initialize_logging(
    args: &Args,
    service_info: &ServiceInfo,
    logging: &LoggingConfig,
) -> GatewayResult<()> {
    common::service_bootstrap::load_development_env();

    let mut service_args: ServiceArgs = args.clone().into();
    if args.log_level.is_none() {
        service_args.log_level = logging.level.clone();
    }

    common::service_bootstrap::init_logging(
        service_info,
        &service_args,
        logging.dir.as_deref(),
        logging.enable_wire_log,
    )
    .map_err(|e| GatewayError::Configuration(format!("Failed to init logging: {}", e)))
}

/// Validate configuration and print a summary
pub fn validate_configuration(manager: &ConfigManager) -> GatewayResult<()> {
    debug!("Validating configuration");
    manager.validate()?;

    let config = manager.config();
    info!("Service: {}", config.service.name);
    if let Some(desc) = &config.service.description {
        info!("Description: {}", desc);
    }
    info!("Listener: {}", config.server.bind_address());

    info!("Found {} device(s)", config.devices.len());
    for device in &config.devices {
        info!(
            "  Wiffi {}: {} (room: {})",
            device.ip,
            if device.name.is_empty() { "-" } else { device.name.as_str() },
            device.room.as_deref().unwrap_or("-")
        );
    }
    info!(
        "{} native point(s), {} extension rule(s)",
        config.native_points.len(),
        config.extensions.len()
    );

    info!("Configuration validation completed successfully");
    Ok(())
}

/// Determine bind address from multiple sources
/// Priority: CLI > Config file > ENV > Default
///
/// `config_loaded` is true when the listener settings came from a
/// configuration file; they then win over the environment even when they
/// equal the defaults.
pub fn determine_bind_address(
    cli_arg: Option<String>,
    config_host: &str,
    config_port: u16,
    config_loaded: bool,
) -> String {
    if let Some(addr) = cli_arg {
        info!("Using bind address from command line: {}", addr);
        return addr;
    }

    if config_loaded {
        let config_addr = format!("{}:{}", config_host, config_port);
        info!("Using bind address from configuration: {}", config_addr);
        return config_addr;
    }

    bind_address_from_env(config_host, |key| std::env::var(key).ok())
}

fn bind_address_from_env(
    default_host: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> String {
    let port = lookup(PORT_ENV)
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    let host = lookup(HOST_ENV)
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| default_host.to_string());

    format!("{}:{}", host, port)
}

/// Reload configuration and resync the registry on SIGUSR1
///
/// A configuration that fails to load or validate is logged and ignored.
#[cfg(unix)]
pub fn spawn_reload_on_sigusr1(
    mut manager: ConfigManager,
    gateway: Arc<Gateway>,
    token: CancellationToken,
) -> Option<tokio::task::JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sig = match signal(SignalKind::user_defined1()) {
        Ok(sig) => sig,
        Err(e) => {
            warn!("Failed to install SIGUSR1 handler: {}. Reload disabled", e);
            return None;
        },
    };

    Some(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                received = sig.recv() => {
                    if received.is_none() {
                        break;
                    }
                    info!("SIGUSR1 received, reloading configuration");
                    let config = match manager.reload() {
                        Ok(config) => config.clone(),
                        Err(e) => {
                            error!("Configuration reload failed: {}", e);
                            continue;
                        },
                    };
                    let current = common::logging::get_log_level();
                    if let Some(filter) = changed_log_filter(&current, &config.service.logging.level) {
                        if let Err(e) = common::logging::set_log_level(&filter) {
                            warn!("{}", e);
                        }
                    }
                    if let Err(e) = gateway.reload(&config).await {
                        error!("Registry synchronization after reload failed: {}", e);
                    }
                },
            }
        }
    }))
}

/// New filter when the configured level differs from the active default
/// level; per-target directives of the active filter are kept
#[cfg_attr(not(unix), allow(dead_code))]
fn changed_log_filter(current: &str, configured: &str) -> Option<String> {
    let configured = configured.trim();
    let (level, directives) = match current.split_once(',') {
        Some((level, directives)) => (level, Some(directives)),
        None => (current, None),
    };
    if configured.is_empty() || configured.eq_ignore_ascii_case(level) {
        return None;
    }
    Some(match directives {
        Some(directives) => format!("{},{}", configured, directives),
        None => configured.to_string(),
    })
}

#[cfg(not(unix))]
pub fn spawn_reload_on_sigusr1(
    _manager: ConfigManager,
    _gateway: Arc<Gateway>,
    _token: CancellationToken,
) -> Option<tokio::task::JoinHandle<()>> {
    None
}
