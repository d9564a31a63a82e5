use aggregator_core::AggregatorConfig;
use aggregator_providers::HttpProviderApi;
use aggregator_sync::{AggregatorEngine, ChainStore, CompositeSink, LogSink};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (ignore if not found)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(Level::INFO.into())
                .add_directive("aggregator_providers=info".parse()?)
                .add_directive("aggregator_sync=info".parse()?),
        )
        .init();

    info!("Midnight aggregator starting...");

    let config = AggregatorConfig::from_env();
    info!(
        primary = config.primary.is_some(),
        secondary = config.secondary.is_some(),
        fallback_enabled = config.fallback.enabled,
        poll_secs = config.poll.interval_secs,
        "Configuration loaded"
    );
    if config.primary.is_none() && config.secondary.is_none() {
        // The registry is re-read every cycle, so the daemon keeps polling
        // and picks up providers once configured.
        warn!("No Midnight provider configured; cycles will fail until one is set");
    }

    let store = Arc::new(ChainStore::new());

    let mut sink = CompositeSink::new();
    sink.add_sink(Arc::new(LogSink));
    sink.add_sink(store.clone());

    let api = Arc::new(HttpProviderApi::new());
    let mut engine = AggregatorEngine::new(config, api, Arc::new(sink));

    // Setup shutdown signal
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received (Ctrl+C)");
        shutdown_tx_clone.send(()).ok();
    });

    // Spawn status printer
    let store_clone = store.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(30));
        loop {
            ticker.tick().await;
            let stats = store_clone.stats();
            info!(
                latest_height = ?store_clone.latest_block().and_then(|b| b.height),
                provider = ?store_clone.latest_provider(),
                block_interval_secs = ?store_clone.block_interval_secs(),
                accepted = stats.blocks_accepted,
                backfilled = stats.blocks_backfilled,
                failed_cycles = stats.cycles_failed,
                last_error = ?stats.last_error,
                "Status"
            );
        }
    });

    if let Err(e) = engine.run(shutdown_rx).await {
        error!(error = %e, "Aggregator engine error");
        std::process::exit(1);
    }

    info!("Midnight aggregator shutdown complete");
    Ok(())
}
