//! Provider resolution: try providers in registry order, return the first
//! full success, and aggregate every failure reason when all are exhausted.

use aggregator_core::{
    AggregatorError, NormalizedBlock, NormalizedEpoch, NormalizedTx, ProviderConfig, Result,
};
use tracing::{info, warn};

use crate::client::ProviderApi;
use crate::normalize::{normalize_block, normalize_epoch, normalize_txs};

/// A latest-block resolution, tagged with the provider that produced it.
#[derive(Debug, Clone)]
pub struct ResolvedBlock {
    pub provider: ProviderConfig,
    pub block: NormalizedBlock,
    pub txs: Vec<NormalizedTx>,
}

/// A latest-epoch resolution, tagged with the provider that produced it.
#[derive(Debug, Clone)]
pub struct ResolvedEpoch {
    pub provider: ProviderConfig,
    pub epoch: NormalizedEpoch,
}

/// Resolve the latest block and its transactions.
///
/// A provider qualifies only if its latest-block fetch succeeds, the block
/// normalizes to a non-empty hash, and the transaction fetch for that hash
/// succeeds. Any failure disqualifies the provider for this call and the
/// next one in ranking order is tried. If every provider is disqualified
/// the error lists each provider's reason; partial data is never returned
/// as success.
pub async fn resolve_latest_block(
    api: &dyn ProviderApi,
    registry: &[ProviderConfig],
) -> Result<ResolvedBlock> {
    if registry.is_empty() {
        return Err(AggregatorError::NoProvidersConfigured);
    }

    let mut failures = Vec::with_capacity(registry.len());
    for provider in registry {
        match try_latest_block(api, provider).await {
            Ok(resolved) => {
                info!(
                    provider = provider.id(),
                    height = ?resolved.block.height,
                    hash = %resolved.block.hash,
                    tx_count = resolved.block.tx_count,
                    "resolved latest block"
                );
                return Ok(resolved);
            }
            Err(e) => {
                warn!(provider = provider.id(), error = %e, "provider disqualified for this cycle");
                failures.push(failure_reason(provider, &e));
            }
        }
    }

    Err(AggregatorError::AllProvidersFailed(failures.join("; ")))
}

/// Resolve the latest epoch. Restricted to fallback-kind providers;
/// Midnight-style providers do not implement epoch semantics upstream.
/// Fails before any network access when no fallback provider is registered.
pub async fn resolve_latest_epoch(
    api: &dyn ProviderApi,
    registry: &[ProviderConfig],
) -> Result<ResolvedEpoch> {
    let eligible: Vec<_> = registry.iter().filter(|p| !p.kind.is_midnight()).collect();
    if eligible.is_empty() {
        return Err(AggregatorError::NoEpochProvider);
    }

    let mut failures = Vec::with_capacity(eligible.len());
    for provider in eligible {
        match api.latest_epoch(provider).await {
            Ok(raw) => {
                let epoch = normalize_epoch(&raw);
                info!(
                    provider = provider.id(),
                    epoch = epoch.epoch_number,
                    "resolved latest epoch"
                );
                return Ok(ResolvedEpoch {
                    provider: provider.clone(),
                    epoch,
                });
            }
            Err(e) => {
                warn!(provider = provider.id(), error = %e, "epoch fetch failed");
                failures.push(failure_reason(provider, &e));
            }
        }
    }

    Err(AggregatorError::AllProvidersFailed(failures.join("; ")))
}

async fn try_latest_block(api: &dyn ProviderApi, provider: &ProviderConfig) -> Result<ResolvedBlock> {
    let raw = api.latest_block(provider).await?;
    let block = normalize_block(provider.kind, &raw);
    if block.hash.is_empty() {
        return Err(AggregatorError::provider(
            provider.id(),
            "latest block has no hash",
        ));
    }

    let raw_txs = api.block_txs(provider, &block.hash).await?;
    let txs = normalize_txs(provider.kind, &raw_txs);

    Ok(ResolvedBlock {
        provider: provider.clone(),
        block,
        txs,
    })
}

/// One `provider-id: message` entry for the aggregate failure report.
fn failure_reason(provider: &ProviderConfig, err: &AggregatorError) -> String {
    match err {
        AggregatorError::Provider { message, .. } => format!("{}: {}", provider.id(), message),
        other => format!("{}: {}", provider.id(), other),
    }
}
