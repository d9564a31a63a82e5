//! Gap reconciliation between polls.
//!
//! Polling is lossy: fixed-interval sampling can skip blocks produced
//! faster than the poll period. The reconciler keeps a single cursor over
//! the last seen height and backfills bounded ranges of missed blocks so a
//! burst cannot cause unbounded catch-up latency.

use aggregator_core::{NormalizedBlock, NormalizedTx, ProviderConfig};
use aggregator_providers::{normalize_block, normalize_txs, ProviderApi, ResolvedBlock};
use tracing::{debug, info, warn};

use crate::sink::{AcceptedBlock, BlockSink};

/// Upper bound on blocks recovered in one backfill. Deeper gaps are closed
/// incrementally across subsequent polls.
pub const MAX_BACKFILL_BLOCKS: u64 = 30;

/// Last-seen-height cursor. `Unknown` marks an observation without usable
/// height semantics and is distinct from both "no prior observation" and
/// any valid height (including 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cursor {
    #[default]
    Uninitialized,
    Tracking(u64),
    Unknown,
}

/// Owns the last-seen-height cursor and the last accepted block. State is
/// process-local; a restart is a cold start and deliberately triggers no
/// backfill for history predating it.
#[derive(Default)]
pub struct GapReconciler {
    cursor: Cursor,
    last_accepted: Option<NormalizedBlock>,
}

impl GapReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn last_accepted(&self) -> Option<&NormalizedBlock> {
        self.last_accepted.as_ref()
    }

    /// Reconcile one resolved latest block against the cursor.
    ///
    /// Never fails: every degraded path accepts what it can and keeps the
    /// cursor moving forward.
    pub async fn reconcile(
        &mut self,
        api: &dyn ProviderApi,
        sink: &dyn BlockSink,
        resolved: ResolvedBlock,
    ) {
        let ResolvedBlock {
            provider,
            block,
            txs,
        } = resolved;

        match (block.height, self.cursor) {
            (None, _) => {
                // Cannot reason about gaps without a height; take the block
                // as-is and mark the cursor invalid.
                warn!(
                    provider = provider.id(),
                    hash = %block.hash,
                    "resolved block has no usable height"
                );
                self.accept(sink, provider.id(), block, txs, false);
                self.cursor = Cursor::Unknown;
            }
            (Some(h), Cursor::Uninitialized | Cursor::Unknown) => {
                self.accept(sink, provider.id(), block, txs, false);
                self.cursor = Cursor::Tracking(h);
            }
            (Some(h), Cursor::Tracking(p)) if h <= p => {
                debug!(
                    provider = provider.id(),
                    height = h,
                    last_seen = p,
                    "stale or duplicate observation, skipping"
                );
            }
            (Some(h), Cursor::Tracking(p)) if h == p + 1 => {
                self.accept(sink, provider.id(), block, txs, false);
                self.cursor = Cursor::Tracking(h);
            }
            (Some(h), Cursor::Tracking(p)) => {
                self.backfill(api, sink, &provider, p, h, block, txs).await;
            }
        }
    }

    /// Close a gap by replaying `[p+1, min(h, p+MAX_BACKFILL_BLOCKS)]` from
    /// the provider that supplied the latest block, serially and in
    /// ascending height order. A failed range fetch degrades to accepting
    /// only the resolved latest block; forward progress beats perfect
    /// contiguity.
    async fn backfill(
        &mut self,
        api: &dyn ProviderApi,
        sink: &dyn BlockSink,
        provider: &ProviderConfig,
        p: u64,
        h: u64,
        latest_block: NormalizedBlock,
        latest_txs: Vec<NormalizedTx>,
    ) {
        let from = p + 1;
        let cap_end = h.min(p + MAX_BACKFILL_BLOCKS);
        info!(
            provider = provider.id(),
            from,
            to = cap_end,
            missed = h - p - 1,
            "gap detected, backfilling"
        );

        let raw_range = match api.block_range(provider, from).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    provider = provider.id(),
                    error = %e,
                    "range fetch failed, accepting latest block only"
                );
                self.accept(sink, provider.id(), latest_block, latest_txs, false);
                self.cursor = Cursor::Tracking(h);
                return;
            }
        };

        let mut blocks: Vec<NormalizedBlock> = raw_range
            .iter()
            .map(|raw| normalize_block(provider.kind, raw))
            .filter(|b| !b.hash.is_empty())
            .filter(|b| matches!(b.height, Some(x) if x >= from && x <= cap_end))
            .collect();
        blocks.sort_by_key(|b| b.height);

        if blocks.is_empty() {
            warn!(
                provider = provider.id(),
                from, "range fetch returned no usable blocks, accepting latest block only"
            );
            self.accept(sink, provider.id(), latest_block, latest_txs, false);
            self.cursor = Cursor::Tracking(h);
            return;
        }

        for block in blocks {
            // A per-block tx failure must not abort the whole range; the
            // block is accepted with transactions unknown.
            let txs = match api.block_txs(provider, &block.hash).await {
                Ok(raw) => normalize_txs(provider.kind, &raw),
                Err(e) => {
                    warn!(
                        provider = provider.id(),
                        height = ?block.height,
                        error = %e,
                        "tx fetch failed during backfill, accepting block without transactions"
                    );
                    Vec::new()
                }
            };

            let height = block.height.unwrap_or(from);
            self.accept(sink, provider.id(), block, txs, true);
            self.cursor = Cursor::Tracking(height);
        }
    }

    fn accept(
        &mut self,
        sink: &dyn BlockSink,
        provider: &'static str,
        block: NormalizedBlock,
        txs: Vec<NormalizedTx>,
        backfilled: bool,
    ) {
        let prev_timestamp = self
            .last_accepted
            .as_ref()
            .map(|b| b.timestamp.clone())
            .filter(|t| !t.is_empty());

        let accepted = AcceptedBlock {
            provider,
            block: block.clone(),
            txs,
            prev_timestamp,
            backfilled,
        };
        sink.on_block(&accepted);
        self.last_accepted = Some(block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggregator_core::{AggregatorError, ProviderKind, Result};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Serves a synthetic chain with a fixed tip; records range calls.
    struct FakeApi {
        tip: u64,
        fail_range: bool,
        fail_txs_for_height: Option<u64>,
        range_calls: AtomicUsize,
        range_from: Mutex<Vec<u64>>,
    }

    impl FakeApi {
        fn new(tip: u64) -> Self {
            Self {
                tip,
                fail_range: false,
                fail_txs_for_height: None,
                range_calls: AtomicUsize::new(0),
                range_from: Mutex::new(Vec::new()),
            }
        }

        fn raw_block(height: u64) -> Value {
            json!({
                "hash": format!("0x{height:x}"),
                "height": height,
                "timestamp": 1_700_000_000 + height * 6,
            })
        }
    }

    #[async_trait]
    impl ProviderApi for FakeApi {
        async fn latest_block(&self, provider: &ProviderConfig) -> Result<Value> {
            Err(AggregatorError::provider(provider.id(), "not used"))
        }

        async fn block_range(&self, provider: &ProviderConfig, from: u64) -> Result<Vec<Value>> {
            self.range_calls.fetch_add(1, Ordering::SeqCst);
            self.range_from.lock().unwrap().push(from);
            if self.fail_range {
                return Err(AggregatorError::provider(provider.id(), "range endpoint down"));
            }
            if from > self.tip {
                return Ok(Vec::new());
            }
            let to = self.tip.min(from + 29);
            Ok((from..=to).map(Self::raw_block).collect())
        }

        async fn block_txs(&self, provider: &ProviderConfig, hash: &str) -> Result<Value> {
            if let Some(h) = self.fail_txs_for_height {
                if hash == format!("0x{h:x}") {
                    return Err(AggregatorError::provider(provider.id(), "tx endpoint down"));
                }
            }
            Ok(json!([{ "hash": format!("{hash}-tx0") }]))
        }

        async fn latest_epoch(&self, provider: &ProviderConfig) -> Result<Value> {
            Err(AggregatorError::provider(provider.id(), "not used"))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        blocks: Mutex<Vec<AcceptedBlock>>,
    }

    impl RecordingSink {
        fn heights(&self) -> Vec<Option<u64>> {
            self.blocks
                .lock()
                .unwrap()
                .iter()
                .map(|a| a.block.height)
                .collect()
        }
    }

    impl BlockSink for RecordingSink {
        fn on_block(&self, accepted: &AcceptedBlock) {
            self.blocks.lock().unwrap().push(accepted.clone());
        }
    }

    fn provider() -> ProviderConfig {
        ProviderConfig::new(ProviderKind::PrimaryIndexer, "https://idx.example", None)
    }

    fn resolved(height: u64) -> ResolvedBlock {
        ResolvedBlock {
            provider: provider(),
            block: NormalizedBlock {
                hash: format!("0x{height:x}"),
                height: Some(height),
                timestamp: format!("2023-11-14T22:13:{:02}.000Z", height % 60),
                tx_count: 0,
                size: None,
            },
            txs: Vec::new(),
        }
    }

    async fn tracking_at(
        reconciler: &mut GapReconciler,
        api: &FakeApi,
        sink: &RecordingSink,
        height: u64,
    ) {
        reconciler.reconcile(api, sink, resolved(height)).await;
        assert_eq!(reconciler.cursor(), Cursor::Tracking(height));
    }

    #[tokio::test]
    async fn cold_start_accepts_directly() {
        let api = FakeApi::new(50);
        let sink = RecordingSink::default();
        let mut reconciler = GapReconciler::new();

        reconciler.reconcile(&api, &sink, resolved(50)).await;

        assert_eq!(reconciler.cursor(), Cursor::Tracking(50));
        assert_eq!(sink.heights(), vec![Some(50)]);
        assert_eq!(api.range_calls.load(Ordering::SeqCst), 0);
        // No baseline on cold start.
        assert!(sink.blocks.lock().unwrap()[0].prev_timestamp.is_none());
    }

    #[tokio::test]
    async fn contiguous_successor_needs_no_range() {
        let api = FakeApi::new(101);
        let sink = RecordingSink::default();
        let mut reconciler = GapReconciler::new();
        tracking_at(&mut reconciler, &api, &sink, 100).await;

        reconciler.reconcile(&api, &sink, resolved(101)).await;

        assert_eq!(reconciler.cursor(), Cursor::Tracking(101));
        assert_eq!(sink.heights(), vec![Some(100), Some(101)]);
        assert_eq!(api.range_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stale_observation_changes_nothing() {
        let api = FakeApi::new(100);
        let sink = RecordingSink::default();
        let mut reconciler = GapReconciler::new();
        tracking_at(&mut reconciler, &api, &sink, 100).await;

        reconciler.reconcile(&api, &sink, resolved(99)).await;

        assert_eq!(reconciler.cursor(), Cursor::Tracking(100));
        assert_eq!(sink.heights(), vec![Some(100)]);
    }

    #[tokio::test]
    async fn duplicate_height_is_idempotent() {
        let api = FakeApi::new(100);
        let sink = RecordingSink::default();
        let mut reconciler = GapReconciler::new();
        tracking_at(&mut reconciler, &api, &sink, 100).await;
        let before = reconciler.last_accepted().cloned();

        reconciler.reconcile(&api, &sink, resolved(100)).await;

        assert_eq!(reconciler.cursor(), Cursor::Tracking(100));
        assert_eq!(sink.heights(), vec![Some(100)]);
        assert_eq!(reconciler.last_accepted().cloned(), before);
    }

    #[tokio::test]
    async fn gap_is_backfilled_ascending() {
        let api = FakeApi::new(105);
        let sink = RecordingSink::default();
        let mut reconciler = GapReconciler::new();
        tracking_at(&mut reconciler, &api, &sink, 100).await;

        reconciler.reconcile(&api, &sink, resolved(105)).await;

        assert_eq!(reconciler.cursor(), Cursor::Tracking(105));
        assert_eq!(
            sink.heights(),
            vec![Some(100), Some(101), Some(102), Some(103), Some(104), Some(105)]
        );
        assert_eq!(*api.range_from.lock().unwrap(), vec![101]);

        // Each backfilled block uses the previous block as its baseline.
        let blocks = sink.blocks.lock().unwrap();
        let backfilled = &blocks[1];
        assert!(backfilled.backfilled);
        assert_eq!(
            backfilled.prev_timestamp.as_deref(),
            Some(blocks[0].block.timestamp.as_str())
        );
        assert_eq!(
            blocks[2].prev_timestamp.as_deref(),
            Some(blocks[1].block.timestamp.as_str())
        );
    }

    #[tokio::test]
    async fn deep_gap_is_capped_at_max_range() {
        let api = FakeApi::new(140);
        let sink = RecordingSink::default();
        let mut reconciler = GapReconciler::new();
        tracking_at(&mut reconciler, &api, &sink, 100).await;

        reconciler.reconcile(&api, &sink, resolved(140)).await;

        // 30 blocks [101, 130]; the next poll continues catch-up.
        assert_eq!(reconciler.cursor(), Cursor::Tracking(130));
        let heights = sink.heights();
        assert_eq!(heights.len(), 1 + 30);
        assert_eq!(heights[1], Some(101));
        assert_eq!(*heights.last().unwrap(), Some(130));
    }

    #[tokio::test]
    async fn range_failure_degrades_to_latest_only() {
        let mut api = FakeApi::new(105);
        api.fail_range = true;
        let sink = RecordingSink::default();
        let mut reconciler = GapReconciler::new();
        tracking_at(&mut reconciler, &api, &sink, 100).await;

        reconciler.reconcile(&api, &sink, resolved(105)).await;

        // Forward progress over perfect contiguity.
        assert_eq!(reconciler.cursor(), Cursor::Tracking(105));
        assert_eq!(sink.heights(), vec![Some(100), Some(105)]);
    }

    #[tokio::test]
    async fn tx_failure_during_backfill_is_tolerated() {
        let mut api = FakeApi::new(103);
        api.fail_txs_for_height = Some(102);
        let sink = RecordingSink::default();
        let mut reconciler = GapReconciler::new();
        tracking_at(&mut reconciler, &api, &sink, 100).await;

        reconciler.reconcile(&api, &sink, resolved(103)).await;

        assert_eq!(reconciler.cursor(), Cursor::Tracking(103));
        assert_eq!(
            sink.heights(),
            vec![Some(100), Some(101), Some(102), Some(103)]
        );
        let blocks = sink.blocks.lock().unwrap();
        assert!(!blocks[1].txs.is_empty());
        // Block 102 accepted with transactions unknown.
        assert!(blocks[2].txs.is_empty());
        assert!(!blocks[3].txs.is_empty());
    }

    #[tokio::test]
    async fn heightless_block_marks_cursor_unknown() {
        let api = FakeApi::new(100);
        let sink = RecordingSink::default();
        let mut reconciler = GapReconciler::new();
        tracking_at(&mut reconciler, &api, &sink, 100).await;

        let mut heightless = resolved(0);
        heightless.block.height = None;
        heightless.block.hash = "0xnoheight".into();
        reconciler.reconcile(&api, &sink, heightless).await;

        assert_eq!(reconciler.cursor(), Cursor::Unknown);
        assert_eq!(sink.heights(), vec![Some(100), None]);
        assert_eq!(api.range_calls.load(Ordering::SeqCst), 0);

        // Recovery: the next finite observation re-enters tracking directly.
        reconciler.reconcile(&api, &sink, resolved(120)).await;
        assert_eq!(reconciler.cursor(), Cursor::Tracking(120));
        assert_eq!(api.range_calls.load(Ordering::SeqCst), 0);
    }
}
