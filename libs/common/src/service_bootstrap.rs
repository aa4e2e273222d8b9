//! Unified service bootstrap utilities
//!
//! Startup banner, logging initialization and environment setup shared by
//! gateway services.

use crate::bootstrap_args::ServiceArgs;
use crate::logging::{self, LogConfig};
use tracing::info;

/// Service metadata for startup
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    /// Service name (e.g., "wiffisrv")
    pub name: String,
    /// Service version
    pub version: String,
    /// Service description
    pub description: String,
    /// Default listen port
    pub default_port: u16,
}

impl ServiceInfo {
    /// Create new service info
    pub fn new(name: impl Into<String>, description: impl Into<String>, default_port: u16) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: description.into(),
            default_port,
        }
    }

    /// Override the version (services pass their own `CARGO_PKG_VERSION`)
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

/// Print unified startup banner for any service
pub fn print_startup_banner(service: &ServiceInfo) {
    let banner = match service.name.as_str() {
        "wiffisrv" => {
            r#"
 ██╗    ██╗██╗███████╗███████╗██╗███████╗██████╗ ██╗   ██╗
 ██║    ██║██║██╔════╝██╔════╝██║██╔════╝██╔══██╗██║   ██║
 ██║ █╗ ██║██║█████╗  █████╗  ██║███████╗██████╔╝██║   ██║
 ██║███╗██║██║██╔══╝  ██╔══╝  ██║╚════██║██╔══██╗╚██╗ ██╔╝
 ╚███╔███╔╝██║██║     ██║     ██║███████║██║  ██║ ╚████╔╝
  ╚══╝╚══╝ ╚═╝╚═╝     ╚═╝     ╚═╝╚══════╝╚═╝  ╚═╝  ╚═══╝
            "#
        },
        _ => {
            r#"
 ██╗    ██╗██╗███████╗███████╗██╗
 ██║    ██║██║██╔════╝██╔════╝██║
 ██║ █╗ ██║██║█████╗  █████╗  ██║
 ██║███╗██║██║██╔══╝  ██╔══╝  ██║
 ╚███╔███╔╝██║██║     ██║     ██║
  ╚══╝╚══╝ ╚═╝╚═╝     ╚═╝     ╚═╝
            "#
        },
    };

    info!("{}", banner);
    info!("");
    info!(" {} v{}", service.name.to_uppercase(), service.version);
    info!(" {}", service.description);
    info!(" Default Port: {}", service.default_port);
    info!("");
}

/// Initialize logging for a service
///
/// Log root directory priority:
/// 1. `WIFFI_LOG_DIR` environment variable
/// 2. `config_dir` (from the service configuration)
/// 3. `logs`
///
/// Files are written below `<log root>/<service name>/`. With
/// `enable_wire_log` raw traffic logged under [`logging::WIRE_TARGET`] goes to
/// a separate `<service name>_wire` file.
pub fn init_logging(
    service: &ServiceInfo,
    args: &ServiceArgs,
    config_dir: Option<&str>,
    enable_wire_log: bool,
) -> anyhow::Result<()> {
    logging::init_log_root(config_dir);

    let log_config = LogConfig {
        service_name: service.name.clone(),
        log_dir: logging::get_log_root().join(&service.name),
        console_level: args.parse_log_level(),
        ansi: !args.no_color,
        enable_wire_log,
        ..Default::default()
    };

    logging::init_with_config(log_config).map_err(|e| anyhow::anyhow!("{}", e))?;
    Ok(())
}

/// Load environment variables in development mode
///
/// In debug builds, reads `.env` and sets variables that are not already set.
/// Release builds leave the environment untouched.
pub fn load_development_env() {
    #[cfg(debug_assertions)]
    {
        if let Ok(content) = std::fs::read_to_string(".env") {
            for (key, value) in parse_env_lines(&content) {
                if std::env::var(key).is_err() {
                    std::env::set_var(key, value);
                }
            }
        }
    }
}

/// Parse `KEY=VALUE` lines, skipping comments and blank lines
fn parse_env_lines(content: &str) -> Vec<(&str, &str)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
        .collect()
}
