use aggregator_core::{AggregatorError, NormalizedBlock, NormalizedEpoch};
use chrono::DateTime;
use std::collections::VecDeque;
use std::sync::RwLock;

use crate::sink::{AcceptedBlock, BlockSink};

/// How many recent blocks the store retains for consumers.
const RECENT_BLOCKS_CAP: usize = 120;

/// Aggregation counters.
#[derive(Debug, Clone, Default)]
pub struct ChainStats {
    pub blocks_accepted: u64,
    pub blocks_backfilled: u64,
    pub cycles_failed: u64,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct Snapshot {
    latest_block: Option<NormalizedBlock>,
    latest_provider: Option<&'static str>,
    recent_blocks: VecDeque<NormalizedBlock>,
    latest_epoch: Option<NormalizedEpoch>,
    /// Seconds between the last two accepted blocks, when both carried
    /// parseable timestamps.
    block_interval_secs: Option<i64>,
    stats: ChainStats,
}

/// In-memory last-known-good state for the display layer.
///
/// A failed cycle only bumps the failure counters; previously accepted
/// data is never cleared, so consumers can render stale data alongside an
/// explicit error indicator.
#[derive(Default)]
pub struct ChainStore {
    inner: RwLock<Snapshot>,
}

impl ChainStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest_block(&self) -> Option<NormalizedBlock> {
        self.inner.read().unwrap().latest_block.clone()
    }

    pub fn latest_provider(&self) -> Option<&'static str> {
        self.inner.read().unwrap().latest_provider
    }

    pub fn latest_epoch(&self) -> Option<NormalizedEpoch> {
        self.inner.read().unwrap().latest_epoch.clone()
    }

    pub fn recent_blocks(&self) -> Vec<NormalizedBlock> {
        self.inner.read().unwrap().recent_blocks.iter().cloned().collect()
    }

    pub fn block_interval_secs(&self) -> Option<i64> {
        self.inner.read().unwrap().block_interval_secs
    }

    pub fn stats(&self) -> ChainStats {
        self.inner.read().unwrap().stats.clone()
    }
}

impl BlockSink for ChainStore {
    fn on_block(&self, accepted: &AcceptedBlock) {
        let mut snap = self.inner.write().unwrap();

        snap.block_interval_secs = interval_secs(
            accepted.prev_timestamp.as_deref(),
            &accepted.block.timestamp,
        );

        snap.latest_block = Some(accepted.block.clone());
        snap.latest_provider = Some(accepted.provider);
        snap.recent_blocks.push_back(accepted.block.clone());
        while snap.recent_blocks.len() > RECENT_BLOCKS_CAP {
            snap.recent_blocks.pop_front();
        }

        snap.stats.blocks_accepted += 1;
        if accepted.backfilled {
            snap.stats.blocks_backfilled += 1;
        }
        // A successful block clears the error indicator.
        snap.stats.last_error = None;
    }

    fn on_epoch(&self, _provider: &str, epoch: &NormalizedEpoch) {
        self.inner.write().unwrap().latest_epoch = Some(epoch.clone());
    }

    fn on_cycle_error(&self, err: &AggregatorError) {
        let mut snap = self.inner.write().unwrap();
        snap.stats.cycles_failed += 1;
        snap.stats.last_error = Some(err.to_string());
    }
}

/// Whole seconds between two ISO-8601 timestamps, `None` when either is
/// missing or unparseable.
fn interval_secs(prev: Option<&str>, current: &str) -> Option<i64> {
    let prev = DateTime::parse_from_rfc3339(prev?).ok()?;
    let current = DateTime::parse_from_rfc3339(current).ok()?;
    Some((current - prev).num_seconds())
}
