pub mod config;
pub mod error;
pub mod types;

pub use config::{AggregatorConfig, EndpointConfig, FallbackConfig, PollConfig};
pub use error::{AggregatorError, Result};
pub use types::{
    AuthHeader, NormalizedBlock, NormalizedEpoch, NormalizedTx, ProviderConfig, ProviderKind,
};
