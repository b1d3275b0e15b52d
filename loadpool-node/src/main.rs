mod args;

use std::fs::read_to_string;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::args::Args;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use loadpool_manager::sources::{SlotPoolLoad, DEFAULT_SLOT_PREFIX};
use loadpool_manager::{ServerLoadConfig, ServerLoadManager};
use loadpool_store::{RedisStore, SharedStorage};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // the pool type may be given on the command line only, validate after overrides
    let content = read_to_string(Path::new(&args.config_file))
        .context(format!("Failed to read config file {}", args.config_file))?;
    let mut config = ServerLoadConfig::parse_yaml(&content)?;

    if let Some(pool_type) = args.pool_type {
        config.pool_type = pool_type;
    }

    if let Some(store_addr) = args.store_addr {
        let (host, port) = store_addr
            .rsplit_once(':')
            .ok_or_else(|| anyhow!("store address must be host:port, got {}", store_addr))?;
        config.host = host.to_string();
        config.port = port
            .parse()
            .context(format!("Failed to parse store port: {}", port))?;
    }
    config.validate()?;

    info!(
        host = %config.host,
        port = config.port,
        pool_type = %config.pool_type,
        "connecting to shared store"
    );
    let store = SharedStorage::Redis(RedisStore::connect(config.redis_options()).await?);
    let slots = Arc::new(SlotPoolLoad::new(
        store.clone(),
        config.keyspace().namespace(),
        DEFAULT_SLOT_PREFIX,
        args.slots,
    ));
    let manager = ServerLoadManager::new(&config, store, slots)?;

    manager.register().await?;
    info!(instance_id = %manager.id(), "joined the pool");

    let interval = config.refresh_interval().unwrap_or(DEFAULT_REFRESH_INTERVAL);
    let refresh = manager.spawn_refresh(interval).await;

    let mut report = tokio::time::interval(interval);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            signal = &mut shutdown => {
                signal.context("Failed to listen for Ctrl-C")?;
                break;
            }
            _ = report.tick() => {
                let snapshot = manager.snapshot().await;
                info!(
                    leader = snapshot.leader() == Some(manager.id().as_str()),
                    idle = snapshot.idle().unwrap_or("-"),
                    load = snapshot.load_of(manager.id().as_str()),
                    members = snapshot.len(),
                    "pool status"
                );
            }
        }
    }

    info!("shutting down");
    refresh.stop().await;
    manager.unregister().await?;
    manager.end(false).await?;

    Ok(())
}
