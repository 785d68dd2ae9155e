//! vlinkd: rendezvous and relay daemon.

use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, Result};

use vlink_api::ApiState;
use vlink_core::config::{ConfigError, VlinkConfig};
use vlink_services::{FileCatalog, Rendezvous};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = VlinkConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let mut config = resolve_config(VlinkConfig::load())?;

    if let Some(arg) = std::env::args().nth(1) {
        config.server.port = arg
            .parse()
            .with_context(|| format!("invalid port argument {arg:?}"))?;
    }

    let bind: IpAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {:?}", config.server.bind))?;
    let addr = SocketAddr::new(bind, config.server.port);

    let catalog = match &config.catalog.persist_path {
        Some(path) => FileCatalog::with_persistence(path.clone()),
        None => FileCatalog::new(),
    };
    tracing::info!(
        files = catalog.len(),
        persisted = config.catalog.persist_path.is_some(),
        token = config.catalog.control_token.is_some(),
        "catalog ready"
    );
    let hub = Rendezvous::new(catalog, config.catalog.control_token.clone());
    let state = ApiState::new(hub, &config);

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("shutdown signal received");
    };

    tracing::info!(
        static_dir = %config.server.static_dir.display(),
        chunk_size = config.transfer.chunk_size,
        "vlinkd starting"
    );
    vlink_api::serve(state, addr, shutdown).await
}

/// An unreadable or unparsable config file falls back to defaults. Settings
/// that fail validation stop the daemon.
fn resolve_config(loaded: Result<VlinkConfig, ConfigError>) -> Result<VlinkConfig> {
    match loaded {
        Ok(config) => Ok(config),
        Err(e @ ConfigError::Invalid(_)) => {
            Err(e).context("refusing to start with invalid configuration")
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to load config, using defaults");
            Ok(VlinkConfig::default())
        }
    }
}
