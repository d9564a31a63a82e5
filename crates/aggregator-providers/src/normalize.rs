//! Provider response normalization.
//!
//! Upstreams are not guaranteed to use one naming convention, so every
//! canonical field is extracted through an ordered list of alternate key
//! names, first-present-wins. Malformed input never panics past this
//! boundary; it degrades to the documented defaults (empty hash, `None`
//! height, empty timestamp, 0 tx count, `None` size) and the caller decides
//! whether the result is usable.

use aggregator_core::{NormalizedBlock, NormalizedEpoch, NormalizedTx, ProviderKind};
use chrono::{DateTime, SecondsFormat};
use serde_json::Value;

/// Ordered alternate key names per canonical block field, one table per
/// provider kind.
struct BlockFieldMap {
    hash: &'static [&'static str],
    height: &'static [&'static str],
    timestamp: &'static [&'static str],
    tx_count: &'static [&'static str],
    size: &'static [&'static str],
    /// Key under which the block may embed its transaction list, used as a
    /// tx-count fallback when no count field is present.
    tx_list: &'static [&'static str],
}

const MIDNIGHT_FIELDS: BlockFieldMap = BlockFieldMap {
    hash: &["hash", "blockHash"],
    height: &["height", "number", "blockHeight"],
    timestamp: &["timestamp", "time"],
    tx_count: &["txCount", "transactionsCount", "transactions_count"],
    size: &["size"],
    tx_list: &["transactions", "txs"],
};

const FALLBACK_FIELDS: BlockFieldMap = BlockFieldMap {
    hash: &["hash", "id"],
    height: &["height", "blockHeight", "number"],
    timestamp: &["time", "timestamp", "createdAt"],
    tx_count: &["txCount", "transactionCount", "txsCount"],
    size: &["size", "bytes"],
    tx_list: &["txHashes", "transactions"],
};

impl BlockFieldMap {
    const fn for_kind(kind: ProviderKind) -> &'static BlockFieldMap {
        match kind {
            ProviderKind::PrimaryIndexer | ProviderKind::SecondaryGateway => &MIDNIGHT_FIELDS,
            ProviderKind::FallbackExplorer => &FALLBACK_FIELDS,
        }
    }
}

/// First value present under any of the given keys.
fn first_present<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|k| raw.get(k))
        .filter(|v| !v.is_null())
}

/// Lenient non-negative integer extraction: accepts JSON numbers, decimal
/// strings, and `0x`-prefixed hex strings (the Midnight node reports block
/// heights hex-encoded).
fn as_u64_lenient(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    let s = value.as_str()?.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

/// Timestamp extraction: numeric values are whole seconds since epoch and
/// are converted to ISO-8601; strings pass through unchanged; anything else
/// is unknown (empty string).
fn iso_timestamp(value: &Value) -> String {
    if let Some(secs) = value.as_i64() {
        return epoch_secs_to_iso(secs);
    }
    if let Some(secs) = value.as_f64() {
        return epoch_secs_to_iso(secs as i64);
    }
    value.as_str().unwrap_or_default().to_string()
}

fn epoch_secs_to_iso(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

/// Normalize a raw block object for the given provider kind.
pub fn normalize_block(kind: ProviderKind, raw: &Value) -> NormalizedBlock {
    let fields = BlockFieldMap::for_kind(kind);

    let hash = first_present(raw, fields.hash)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let height = first_present(raw, fields.height).and_then(as_u64_lenient);

    let timestamp = first_present(raw, fields.timestamp)
        .map(iso_timestamp)
        .unwrap_or_default();

    let tx_count = first_present(raw, fields.tx_count)
        .and_then(as_u64_lenient)
        .or_else(|| {
            first_present(raw, fields.tx_list)
                .and_then(Value::as_array)
                .map(|txs| txs.len() as u64)
        })
        .unwrap_or(0);

    let size = first_present(raw, fields.size).and_then(as_u64_lenient);

    NormalizedBlock {
        hash,
        height,
        timestamp,
        tx_count,
        size,
    }
}

/// Normalize a raw transaction payload for the given provider kind.
///
/// The fallback explorer returns a plain array of hash strings with no
/// per-tx size data; Midnight-style providers return an array of objects
/// with a `hash` field (or an identifier fallback) and optional size.
/// Entries without a usable hash are dropped; a non-array payload yields an
/// empty list.
pub fn normalize_txs(kind: ProviderKind, raw: &Value) -> Vec<NormalizedTx> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };

    match kind {
        ProviderKind::FallbackExplorer => items
            .iter()
            .filter_map(Value::as_str)
            .map(|hash| NormalizedTx {
                hash: hash.to_string(),
                size: None,
            })
            .collect(),
        _ => items
            .iter()
            .filter_map(|tx| {
                let hash = first_present(tx, &["hash", "identifier", "id"])?
                    .as_str()?
                    .to_string();
                let size = tx.get("size").and_then(as_u64_lenient);
                Some(NormalizedTx { hash, size })
            })
            .collect(),
    }
}

/// Normalize a raw epoch object. Counts default to 0; the end time is
/// `None` when unknown (passed through as reported otherwise).
pub fn normalize_epoch(raw: &Value) -> NormalizedEpoch {
    let epoch_number = first_present(raw, &["epoch", "epochNumber", "number"])
        .and_then(as_u64_lenient)
        .unwrap_or(0);

    let block_count = first_present(raw, &["blockCount", "blocksCount", "block_count"])
        .and_then(as_u64_lenient)
        .unwrap_or(0);

    let tx_count = first_present(raw, &["txCount", "transactionsCount", "tx_count"])
        .and_then(as_u64_lenient)
        .unwrap_or(0);

    let epoch_end_time = first_present(raw, &["endTime", "epochEndTime", "end_time"])
        .and_then(Value::as_str)
        .map(String::from);

    NormalizedEpoch {
        epoch_number,
        block_count,
        tx_count,
        epoch_end_time,
    }
}
