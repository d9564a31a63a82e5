//! HTTP access to provider REST endpoints.
//!
//! All provider kinds expose the same endpoint shapes (`/blocks/latest`,
//! `/blocks/{hash}/txs`, `/epochs/latest`); only the response payloads
//! differ, which is the normalizer's concern. Midnight passthrough
//! responses arrive JSON-RPC shaped, so a `{result, error}` envelope is
//! unwrapped here: a present `error` field is a failure regardless of HTTP
//! status.

use aggregator_core::{AggregatorError, ProviderConfig, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;

/// Fetch operations the resolver and reconciler need from a provider.
///
/// Boxed behind a trait so resolution and reconciliation can be exercised
/// against in-process fakes without network access.
#[async_trait]
pub trait ProviderApi: Send + Sync {
    /// Fetch the latest block object.
    async fn latest_block(&self, provider: &ProviderConfig) -> Result<Value>;

    /// Fetch an ordered ascending range of up to 30 blocks starting at
    /// `from_height`. An empty list means `from_height` is past the tip.
    async fn block_range(&self, provider: &ProviderConfig, from_height: u64) -> Result<Vec<Value>>;

    /// Fetch the transaction descriptors for a block hash.
    async fn block_txs(&self, provider: &ProviderConfig, hash: &str) -> Result<Value>;

    /// Fetch the latest epoch object.
    async fn latest_epoch(&self, provider: &ProviderConfig) -> Result<Value>;
}

/// Boxed provider API for sharing across tasks.
pub type BoxedApi = Arc<dyn ProviderApi>;

/// `reqwest`-backed implementation of [`ProviderApi`].
#[derive(Clone)]
pub struct HttpProviderApi {
    client: Client,
}

impl HttpProviderApi {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    async fn get_json(
        &self,
        provider: &ProviderConfig,
        path: &str,
        query: Option<(&str, String)>,
    ) -> Result<Value> {
        let url = format!("{}/{}", provider.base_url, path);
        let mut request = self.client.get(&url);

        if let Some((key, value)) = query {
            request = request.query(&[(key, value)]);
        }
        if let Some(auth) = &provider.auth {
            request = request.header(&auth.name, &auth.value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AggregatorError::provider(provider.id(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AggregatorError::provider(
                provider.id(),
                format!("http {status} from {url}: {}", truncate(&body, 200)),
            ));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| AggregatorError::provider(provider.id(), format!("invalid json: {e}")))?;

        unwrap_envelope(provider, value)
    }
}

impl Default for HttpProviderApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderApi for HttpProviderApi {
    async fn latest_block(&self, provider: &ProviderConfig) -> Result<Value> {
        self.get_json(provider, "blocks/latest", None).await
    }

    async fn block_range(&self, provider: &ProviderConfig, from_height: u64) -> Result<Vec<Value>> {
        let value = self
            .get_json(
                provider,
                "blocks/latest",
                Some(("fromHeight", from_height.to_string())),
            )
            .await?;

        match value {
            Value::Array(blocks) => Ok(blocks),
            other => Err(AggregatorError::provider(
                provider.id(),
                format!("expected block array, got: {}", truncate(&other.to_string(), 120)),
            )),
        }
    }

    async fn block_txs(&self, provider: &ProviderConfig, hash: &str) -> Result<Value> {
        self.get_json(provider, &format!("blocks/{hash}/txs"), None)
            .await
    }

    async fn latest_epoch(&self, provider: &ProviderConfig) -> Result<Value> {
        self.get_json(provider, "epochs/latest", None).await
    }
}

/// Unwrap a JSON-RPC style `{result, error}` envelope. A present non-null
/// `error` is a failure carrying the upstream message; a present `result`
/// replaces the envelope; anything else passes through untouched.
fn unwrap_envelope(provider: &ProviderConfig, value: Value) -> Result<Value> {
    let mut map = match value {
        Value::Object(map) => map,
        other => return Ok(other),
    };

    if let Some(err) = map.get("error").filter(|e| !e.is_null()) {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| err.to_string());
        return Err(AggregatorError::provider(provider.id(), message));
    }

    if let Some(result) = map.remove("result") {
        return Ok(result);
    }

    Ok(Value::Object(map))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggregator_core::ProviderKind;
    use serde_json::json;

    fn provider() -> ProviderConfig {
        ProviderConfig::new(ProviderKind::PrimaryIndexer, "https://idx.example", None)
    }

    #[test]
    fn envelope_error_is_failure_even_with_ok_status() {
        let value = json!({ "result": null, "error": { "message": "block not found" } });
        let err = unwrap_envelope(&provider(), value).unwrap_err();
        assert!(err.to_string().contains("block not found"));
    }

    #[test]
    fn envelope_result_is_unwrapped() {
        let value = json!({ "jsonrpc": "2.0", "id": 1, "result": { "height": 5 } });
        let unwrapped = unwrap_envelope(&provider(), value).unwrap();
        assert_eq!(unwrapped, json!({ "height": 5 }));
    }

    #[test]
    fn plain_objects_pass_through() {
        let value = json!({ "hash": "0xabc", "height": 5 });
        let unwrapped = unwrap_envelope(&provider(), value.clone()).unwrap();
        assert_eq!(unwrapped, value);
    }
}
