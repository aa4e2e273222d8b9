//! Wiffi telemetry gateway service

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use common::shutdown::wait_for_shutdown;
use errors::{GatewayError, GatewayResult};
use wiffi_store::{MemoryStore, ObjectStore};

use wiffisrv::core::bootstrap::{self, Args, ServiceArgs};
use wiffisrv::core::config::{ConfigManager, LoggingConfig};
use wiffisrv::{Gateway, WiffiServer};

#[tokio::main]
async fn main() -> GatewayResult<()> {
    let args = Args::parse();
    let service_args: ServiceArgs = args.clone().into();
    let service_info = bootstrap::service_info();

    // Logging settings come from the configuration, so load it first
    let config_path = service_args.config_path(&service_info.name);
    let loaded = ConfigManager::from_file(&config_path);
    let logging = match &loaded {
        Ok(manager) => manager.config().service.logging.clone(),
        Err(_) => LoggingConfig::default(),
    };

    bootstrap::initialize_logging(&args, &service_info, &logging)?;
    common::logging::enable_sighup_log_reopen();
    if !args.no_color {
        common::service_bootstrap::print_startup_banner(&service_info);
    }

    let manager = loaded.map_err(|e| {
        error!("Failed to load {}: {}", config_path.display(), e);
        GatewayError::from(e)
    })?;
    if !config_path.exists() {
        warn!(
            "Configuration file {} not found, using defaults",
            config_path.display()
        );
    }
    info!("Configuration: {}", config_path.display());

    // Validation mode: validate and exit
    if args.validate {
        bootstrap::validate_configuration(&manager)?;
        info!("Validation completed successfully");
        return Ok(());
    }
    manager.validate()?;

    let config = manager.config().clone();
    let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
    let gateway = Arc::new(Gateway::new(store, &config)?);

    if let Err(e) = gateway.start().await {
        error!("Initial registry synchronization failed (continuing anyway): {}", e);
    }

    let bind_address = bootstrap::determine_bind_address(
        service_args.bind_address.clone(),
        &config.server.host,
        config.server.port,
        config_path.exists(),
    );
    let server = WiffiServer::bind(&bind_address, gateway.clone(), config.server.max_buffer_size)
        .await?;

    let token = CancellationToken::new();
    let reload_handle = bootstrap::spawn_reload_on_sigusr1(manager, gateway.clone(), token.clone());
    let mut server_handle = tokio::spawn(server.serve(token.clone()));

    info!("Service started successfully");

    let outcome = tokio::select! {
        signal = wait_for_shutdown() => {
            info!("Shutdown signal received ({}), stopping", signal);
            token.cancel();
            server_handle.await
        },
        finished = &mut server_handle => {
            token.cancel();
            finished
        },
    };

    if let Some(handle) = reload_handle {
        let _ = handle.await;
    }

    match outcome {
        Ok(Ok(())) => {
            info!("Service shutdown complete");
            Ok(())
        },
        Ok(Err(e)) => {
            error!("Server stopped with error: {}", e);
            Err(e.into())
        },
        Err(e) => Err(GatewayError::Internal(format!("Server task failed: {}", e))),
    }
}
