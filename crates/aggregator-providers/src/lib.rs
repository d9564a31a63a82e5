mod client;
mod normalize;
mod registry;
mod resolver;

pub use client::{BoxedApi, HttpProviderApi, ProviderApi};
pub use normalize::{normalize_block, normalize_epoch, normalize_txs};
pub use registry::build_registry;
pub use resolver::{resolve_latest_block, resolve_latest_epoch, ResolvedBlock, ResolvedEpoch};
