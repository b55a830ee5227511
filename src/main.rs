//! Watcher daemon entrypoint: env-driven configuration, component wiring,
//! hourly clock subscription.

use driftwatch::config::ConfigReader;
use driftwatch::discovery::engine::ChainDiscoveryEngine;
use driftwatch::notify::{DiscordClient, NotificationClient};
use driftwatch::storage::WatcherDb;
use driftwatch::utils::config::Settings;
use driftwatch::utils::rpc::{build_http_provider, RpcChainHead};
use driftwatch::watcher::{DigestWindow, DiscoveryWatcher, InMemoryMetrics};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Validate environment files and load defaults before runtime initialization.
    driftwatch::utils::env_guard::harden_env_setup();

    // Default to `info` when `RUST_LOG` is unset or invalid to avoid silent startup.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::from_env()?;
    tracing::info!(
        projects_dir = %settings.projects_dir.display(),
        db_path = %settings.db_path.display(),
        "[STARTUP] settings resolved"
    );

    let provider = Arc::new(build_http_provider(&settings.eth_rpc_url)?);

    // Probe RPC connectivity early so configuration failures are visible
    // immediately instead of surfacing on the first hourly tick.
    {
        use alloy::providers::Provider;
        match provider.get_block_number().await {
            Ok(n) => tracing::info!(block = n, "[STARTUP] RPC connectivity OK"),
            Err(e) => tracing::warn!("[STARTUP] RPC connectivity failure: {}", e),
        }
    }

    let notifier: Option<Arc<dyn NotificationClient>> = match DiscordClient::from_env() {
        Some(client) => {
            tracing::info!("[STARTUP] Discord notifications enabled");
            Some(Arc::new(client))
        }
        None => {
            tracing::warn!("[STARTUP] no Discord webhooks configured; notifications disabled");
            None
        }
    };

    let watcher = Arc::new(DiscoveryWatcher::new(
        Arc::new(RpcChainHead::new(provider.clone(), settings.rpc_retries)),
        Arc::new(ChainDiscoveryEngine::new(provider, settings.rpc_retries)),
        notifier,
        Arc::new(ConfigReader::new(settings.projects_dir.clone())),
        Arc::new(WatcherDb::open(&settings.db_path)?),
        Arc::new(InMemoryMetrics::new()),
        DigestWindow::new(settings.digest_local_hour, settings.digest_utc_offset_hours),
    ));

    let handle = watcher.start();
    tracing::info!("[STARTUP] watcher running; next cycle on the hour boundary");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("failed to listen for shutdown signal: {e}"))?;
    tracing::info!("[STARTUP] shutdown requested; draining queue");
    handle.shutdown().await;

    Ok(())
}
