use serde::{Deserialize, Serialize};

/// Closed set of upstream provider kinds. The kind selects which
/// normalization rules apply to a provider's raw responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    /// Midnight-style indexer, preferred source.
    PrimaryIndexer,
    /// Midnight-style gateway, same response shape as the indexer.
    SecondaryGateway,
    /// Third-party explorer with its own response shape; opt-in only.
    FallbackExplorer,
}

impl ProviderKind {
    /// Stable string identifier used in logs and failure reports.
    pub const fn id(&self) -> &'static str {
        match self {
            ProviderKind::PrimaryIndexer => "primary-indexer",
            ProviderKind::SecondaryGateway => "secondary-gateway",
            ProviderKind::FallbackExplorer => "fallback-explorer",
        }
    }

    /// Midnight-style providers share one response shape and do not
    /// implement epoch queries upstream.
    pub const fn is_midnight(&self) -> bool {
        matches!(
            self,
            ProviderKind::PrimaryIndexer | ProviderKind::SecondaryGateway
        )
    }
}

/// Auth header injected into every request to a provider. Only present
/// when both the header name and the credential are configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeader {
    pub name: String,
    pub value: String,
}

/// One configured upstream source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Root URL, normalized to carry no trailing slash. Non-empty for any
    /// provider present in the registry.
    pub base_url: String,
    pub auth: Option<AuthHeader>,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind, base_url: &str, auth: Option<AuthHeader>) -> Self {
        Self {
            kind,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        }
    }

    pub fn id(&self) -> &'static str {
        self.kind.id()
    }
}

/// Canonical block record produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBlock {
    /// Block hash; a block with an empty hash is not a valid fetch result.
    pub hash: String,
    /// Block height. `None` means the upstream reported no usable height;
    /// callers cannot gap-reason about such a block.
    pub height: Option<u64>,
    /// ISO-8601 timestamp, or empty string when unknown.
    pub timestamp: String,
    /// Number of transactions in the block, 0 when not reported.
    pub tx_count: u64,
    /// Byte size, `None` when unknown (never coerced to 0).
    pub size: Option<u64>,
}

/// Canonical transaction record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTx {
    pub hash: String,
    pub size: Option<u64>,
}

/// Canonical epoch record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEpoch {
    pub epoch_number: u64,
    pub block_count: u64,
    pub tx_count: u64,
    pub epoch_end_time: Option<String>,
}
