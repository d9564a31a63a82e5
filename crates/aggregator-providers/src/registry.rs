use aggregator_core::{AggregatorConfig, AuthHeader, ProviderConfig, ProviderKind};
use tracing::warn;

/// Build the ordered provider registry from configuration.
///
/// Order is significant: primary indexer, then secondary gateway, then the
/// fallback explorer. Providers without a configured URL are omitted
/// entirely, never included disabled. The fallback is appended only when it
/// is enabled, credentialed, and at least one Midnight-style provider is
/// already registered; it must never become the sole data source.
///
/// Pure configuration assembly, re-evaluated per fetch cycle so config
/// changes take effect on the next poll. No network I/O.
pub fn build_registry(config: &AggregatorConfig) -> Vec<ProviderConfig> {
    let mut providers = Vec::new();

    if let Some(ep) = &config.primary {
        providers.push(ProviderConfig::new(
            ProviderKind::PrimaryIndexer,
            &ep.url,
            ep.auth(),
        ));
    }

    if let Some(ep) = &config.secondary {
        providers.push(ProviderConfig::new(
            ProviderKind::SecondaryGateway,
            &ep.url,
            ep.auth(),
        ));
    }

    let fb = &config.fallback;
    if fb.enabled {
        match (&fb.url, &fb.api_key) {
            (Some(_), Some(_)) if providers.is_empty() => {
                warn!(
                    "fallback explorer is enabled and credentialed but no Midnight provider \
                     is configured; refusing to use the fallback as the sole data source"
                );
            }
            (Some(url), Some(key)) => {
                providers.push(ProviderConfig::new(
                    ProviderKind::FallbackExplorer,
                    url,
                    Some(AuthHeader {
                        name: fb.auth_header.clone(),
                        value: key.clone(),
                    }),
                ));
            }
            _ => {}
        }
    }

    providers
}
