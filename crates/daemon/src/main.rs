//! Hostward Daemon - Main Entry Point
//! Loads configuration, wires adapters into the services, serves JSON-RPC.

mod config;
mod logging;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use config::DaemonConfig;
use hostward_api_rpc::{RpcServer, RpcServerConfig};
use hostward_core::application::{AccountService, HostService};
use hostward_core::port::time_provider::SystemTimeProvider;
use hostward_infra_sqlite::{
    create_pool, run_migrations, SqliteAccountRepository, SqliteHostRepository,
};
use hostward_infra_ssh::{FsCommandCatalog, SshConnector};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration and logging
    let config = DaemonConfig::load()?;
    let log_dir = config.log_dir();
    let _log_guard = logging::init(config.log.format, log_dir.as_deref())?;

    info!("Hostward daemon v{} starting...", VERSION);

    // 2. Database
    let db_path = config.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    info!(db_path = %db_path.display(), "Initializing database...");

    let pool = create_pool(&config.database_url())
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    // 3. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let hosts = Arc::new(SqliteHostRepository::new(pool.clone()));
    let accounts = Arc::new(SqliteAccountRepository::new(
        pool.clone(),
        time_provider.clone(),
    ));

    let catalog_root = config.catalog_root();
    let catalog = Arc::new(
        FsCommandCatalog::new(&catalog_root, config.catalog_refresh(), time_provider.clone())
            .context("command catalog unavailable")?,
    );
    info!(
        root = %catalog_root.display(),
        refresh_secs = config.catalog.refresh_secs,
        "Command catalog ready"
    );

    let connector = Arc::new(SshConnector::new(
        config.dial_timeout(),
        config.command_timeout(),
    ));

    let host_service = HostService::new(
        hosts.clone(),
        accounts.clone(),
        connector.clone(),
        catalog.clone(),
        time_provider,
    );
    let account_service = AccountService::new(hosts, accounts, connector, catalog);

    // 4. Start JSON-RPC server
    let rpc_server = RpcServer::new(
        RpcServerConfig {
            host: config.rpc.host.clone(),
            port: config.rpc.port,
        },
        host_service,
        account_service,
    );
    let (addr, rpc_handle) = rpc_server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!(addr = %addr, "System ready. Press Ctrl+C to shutdown");

    // 5. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    rpc_handle.stopped().await;
    pool.close().await;

    info!("Shutdown complete.");

    Ok(())
}
