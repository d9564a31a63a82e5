use std::env;

use crate::types::AuthHeader;

/// Configuration for one Midnight-style endpoint (indexer or gateway).
#[derive(Debug, Clone, Default)]
pub struct EndpointConfig {
    pub url: String,
    pub auth_header: Option<String>,
    pub api_key: Option<String>,
}

impl EndpointConfig {
    /// Read one endpoint from `{prefix}_URL` / `{prefix}_AUTH_HEADER` /
    /// `{prefix}_API_KEY`. An absent or empty URL means "not configured".
    fn from_env(prefix: &str) -> Option<Self> {
        let url = env::var(format!("{prefix}_URL"))
            .ok()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())?;

        Some(Self {
            url,
            auth_header: env::var(format!("{prefix}_AUTH_HEADER")).ok(),
            api_key: env::var(format!("{prefix}_API_KEY")).ok(),
        })
    }

    /// Auth header, present only when both the header name and key are set.
    pub fn auth(&self) -> Option<AuthHeader> {
        match (&self.auth_header, &self.api_key) {
            (Some(name), Some(value)) if !name.is_empty() && !value.is_empty() => {
                Some(AuthHeader {
                    name: name.clone(),
                    value: value.clone(),
                })
            }
            _ => None,
        }
    }
}

/// Configuration for the opt-in third-party fallback explorer.
#[derive(Debug, Clone)]
pub struct FallbackConfig {
    pub enabled: bool,
    pub url: Option<String>,
    pub auth_header: String,
    pub api_key: Option<String>,
}

impl FallbackConfig {
    pub fn from_env() -> Self {
        let enabled = env::var("FALLBACK_EXPLORER_ENABLED")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        let url = env::var("FALLBACK_EXPLORER_URL")
            .ok()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        let auth_header =
            env::var("FALLBACK_EXPLORER_AUTH_HEADER").unwrap_or_else(|_| "x-api-key".to_string());

        let api_key = env::var("FALLBACK_EXPLORER_API_KEY")
            .ok()
            .filter(|k| !k.is_empty());

        Self {
            enabled,
            url,
            auth_header,
            api_key,
        }
    }
}

/// Polling cadence configuration.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Block poll interval in seconds (default: 5)
    pub interval_secs: u64,
    /// Epoch poll interval in seconds (default: 60)
    pub epoch_interval_secs: u64,
}

impl PollConfig {
    pub fn from_env() -> Self {
        let interval_secs = env::var("POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        let epoch_interval_secs = env::var("EPOCH_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        Self {
            interval_secs,
            epoch_interval_secs,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            epoch_interval_secs: 60,
        }
    }
}

/// Complete aggregator configuration from environment variables.
///
/// Absence of a provider's variables means that provider is not
/// configured, never an error; "no providers at all" is surfaced at
/// resolution time, not here.
#[derive(Debug, Clone, Default)]
pub struct AggregatorConfig {
    pub primary: Option<EndpointConfig>,
    pub secondary: Option<EndpointConfig>,
    pub fallback: FallbackConfig,
    pub poll: PollConfig,
}

impl AggregatorConfig {
    pub fn from_env() -> Self {
        Self {
            primary: EndpointConfig::from_env("MIDNIGHT_INDEXER"),
            secondary: EndpointConfig::from_env("MIDNIGHT_GATEWAY"),
            fallback: FallbackConfig::from_env(),
            poll: PollConfig::from_env(),
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            auth_header: "x-api-key".to_string(),
            api_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_auth_requires_both_parts() {
        let ep = EndpointConfig {
            url: "https://idx.example".into(),
            auth_header: Some("authorization".into()),
            api_key: None,
        };
        assert!(ep.auth().is_none());

        let ep = EndpointConfig {
            url: "https://idx.example".into(),
            auth_header: Some("authorization".into()),
            api_key: Some("secret".into()),
        };
        let auth = ep.auth().unwrap();
        assert_eq!(auth.name, "authorization");
        assert_eq!(auth.value, "secret");
    }

    #[test]
    fn empty_auth_parts_are_ignored() {
        let ep = EndpointConfig {
            url: "https://idx.example".into(),
            auth_header: Some(String::new()),
            api_key: Some("secret".into()),
        };
        assert!(ep.auth().is_none());
    }
}
