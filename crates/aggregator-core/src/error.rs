use thiserror::Error;

#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error("invalid provider URL: {0}")]
    InvalidUrl(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("provider {provider} failed: {message}")]
    Provider { provider: String, message: String },

    #[error("no providers configured")]
    NoProvidersConfigured,

    #[error("no fallback provider configured for epoch queries")]
    NoEpochProvider,

    #[error("all providers failed: {0}")]
    AllProvidersFailed(String),

    #[error("malformed upstream payload: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AggregatorError {
    /// Build a per-provider failure carrying the provider id and the
    /// upstream status or message, for the aggregate failure report.
    pub fn provider(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: id.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
