use aggregator_core::{AggregatorConfig, AggregatorError, Result};
use aggregator_providers::{build_registry, resolve_latest_block, resolve_latest_epoch, BoxedApi};
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::reconciler::GapReconciler;
use crate::sink::BlockSink;

/// Polling driver: one fetch-and-reconcile cycle per tick, plus a slower
/// epoch poll. Cycles run on a single task, so two cycles for the same
/// stream never overlap; a slow upstream simply delays the next tick
/// (missed ticks are skipped, not queued).
pub struct AggregatorEngine {
    config: AggregatorConfig,
    api: BoxedApi,
    sink: Arc<dyn BlockSink>,
    reconciler: GapReconciler,
}

impl AggregatorEngine {
    pub fn new(config: AggregatorConfig, api: BoxedApi, sink: Arc<dyn BlockSink>) -> Self {
        Self {
            config,
            api,
            sink,
            reconciler: GapReconciler::new(),
        }
    }

    /// Run until the shutdown signal arrives. A failed cycle is reported
    /// and the next one proceeds; polling itself never stops on upstream
    /// errors.
    pub async fn run(&mut self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        let poll_secs = self.config.poll.interval_secs.max(1);
        let epoch_secs = self.config.poll.epoch_interval_secs.max(1);

        let mut block_ticker = interval(Duration::from_secs(poll_secs));
        block_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut epoch_ticker = interval(Duration::from_secs(epoch_secs));
        epoch_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            poll_secs,
            epoch_secs,
            "aggregator engine started"
        );

        loop {
            select! {
                _ = shutdown.recv() => {
                    info!("shutdown signal received");
                    break;
                }
                _ = block_ticker.tick() => {
                    self.block_cycle().await;
                }
                _ = epoch_ticker.tick() => {
                    self.epoch_cycle().await;
                }
            }
        }

        info!("aggregator engine shutdown complete");
        Ok(())
    }

    async fn block_cycle(&mut self) {
        // Rebuilt every cycle so configuration changes apply on next poll.
        let registry = build_registry(&self.config);

        match resolve_latest_block(self.api.as_ref(), &registry).await {
            Ok(resolved) => {
                self.reconciler
                    .reconcile(self.api.as_ref(), self.sink.as_ref(), resolved)
                    .await;
            }
            Err(e) => {
                warn!(error = %e, "block poll cycle failed");
                self.sink.on_cycle_error(&e);
            }
        }
    }

    async fn epoch_cycle(&self) {
        let registry = build_registry(&self.config);

        match resolve_latest_epoch(self.api.as_ref(), &registry).await {
            Ok(resolved) => {
                self.sink.on_epoch(resolved.provider.id(), &resolved.epoch);
            }
            Err(AggregatorError::NoEpochProvider) => {
                debug!("no fallback provider registered, skipping epoch poll");
            }
            Err(e) => {
                warn!(error = %e, "epoch poll cycle failed");
                self.sink.on_cycle_error(&e);
            }
        }
    }
}
