use aggregator_core::{AggregatorError, NormalizedBlock, NormalizedEpoch, NormalizedTx};
use std::sync::Arc;
use tracing::{info, warn};

/// A block accepted by the reconciler, delivered to sinks in ascending
/// height order within one cycle.
#[derive(Debug, Clone)]
pub struct AcceptedBlock {
    /// Id of the provider that supplied the block.
    pub provider: &'static str,
    pub block: NormalizedBlock,
    pub txs: Vec<NormalizedTx>,
    /// Timestamp of the previously accepted block, the baseline for block
    /// rate computation downstream. `None` on cold start or when the
    /// previous timestamp was unknown.
    pub prev_timestamp: Option<String>,
    /// Whether this block was recovered through a gap backfill rather than
    /// resolved directly.
    pub backfilled: bool,
}

/// Consumer-facing event sink fed by the reconciliation step.
pub trait BlockSink: Send + Sync {
    fn on_block(&self, accepted: &AcceptedBlock);

    fn on_epoch(&self, _provider: &str, _epoch: &NormalizedEpoch) {}

    /// A whole poll cycle failed. Consumers keep their last known-good
    /// state and surface the error alongside it.
    fn on_cycle_error(&self, _err: &AggregatorError) {}
}

/// Fans events out to every registered sink.
#[derive(Default)]
pub struct CompositeSink {
    sinks: Vec<Arc<dyn BlockSink>>,
}

impl CompositeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sink(&mut self, sink: Arc<dyn BlockSink>) {
        self.sinks.push(sink);
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl BlockSink for CompositeSink {
    fn on_block(&self, accepted: &AcceptedBlock) {
        for sink in &self.sinks {
            sink.on_block(accepted);
        }
    }

    fn on_epoch(&self, provider: &str, epoch: &NormalizedEpoch) {
        for sink in &self.sinks {
            sink.on_epoch(provider, epoch);
        }
    }

    fn on_cycle_error(&self, err: &AggregatorError) {
        for sink in &self.sinks {
            sink.on_cycle_error(err);
        }
    }
}

/// Sink that logs accepted blocks and cycle failures.
pub struct LogSink;

impl BlockSink for LogSink {
    fn on_block(&self, accepted: &AcceptedBlock) {
        info!(
            provider = accepted.provider,
            height = ?accepted.block.height,
            hash = %accepted.block.hash,
            tx_count = accepted.block.tx_count,
            backfilled = accepted.backfilled,
            "block accepted"
        );
    }

    fn on_epoch(&self, provider: &str, epoch: &NormalizedEpoch) {
        info!(
            provider = provider,
            epoch = epoch.epoch_number,
            blocks = epoch.block_count,
            txs = epoch.tx_count,
            "epoch updated"
        );
    }

    fn on_cycle_error(&self, err: &AggregatorError) {
        warn!(error = %err, "poll cycle failed; keeping last known-good state");
    }
}
