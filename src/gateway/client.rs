//! The provider gateway.
//!
//! One entry point for every remote generation call: resolves the
//! provider, enforces its rate budget, applies its auth-header shape,
//! performs the HTTP call, logs the exchange, and classifies the outcome
//! into a typed result.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::rate_limiter::{RateLimitSnapshot, RateLimiter};
use crate::error::{Error, Result};
use crate::providers::{AuthScheme, Capability, Provider, ProviderRegistry};
use crate::storage::{ApiLogEntry, SqliteStorage};

const REQUEST_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Listing entry for a registered provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSummary {
    pub name: String,
    pub display_name: String,
    pub capabilities: Vec<Capability>,
    pub has_key: bool,
    pub rate: RateLimitSnapshot,
}

/// Result of a connection test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub provider: String,
    pub status: String,
    pub rate: RateLimitSnapshot,
}

/// Gateway over all registered providers.
pub struct Gateway {
    providers: ProviderRegistry,
    limiter: RateLimiter,
    keys: HashMap<String, String>,
    client: Client,
    request_log: Option<Arc<SqliteStorage>>,
}

impl Gateway {
    /// Create a gateway over a provider registry with stored API keys.
    ///
    /// Each provider's default rate budget is registered with the limiter.
    pub fn new(providers: ProviderRegistry, keys: HashMap<String, String>) -> Self {
        let limiter = RateLimiter::new();
        for provider in providers.iter() {
            limiter.register(&provider.name, provider.limits);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client with timeout defaults: {}", e);
                Client::new()
            });

        Self {
            providers,
            limiter,
            keys,
            client,
            request_log: None,
        }
    }

    /// Attach a request log sink. Log writes are fire-and-forget and never
    /// block or fail the main call.
    pub fn with_request_log(mut self, storage: Arc<SqliteStorage>) -> Self {
        self.request_log = Some(storage);
        self
    }

    /// The rate limiter (shared snapshot access).
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Summaries of all registered providers.
    pub fn list_providers(&self) -> Vec<ProviderSummary> {
        self.providers
            .iter()
            .map(|provider| ProviderSummary {
                name: provider.name.clone(),
                display_name: provider.display_name.clone(),
                capabilities: provider.capabilities(),
                has_key: self
                    .keys
                    .get(&provider.name)
                    .is_some_and(|k| !k.is_empty()),
                rate: self.limiter.snapshot(&provider.name),
            })
            .collect()
    }

    /// Perform a generation request against a provider capability.
    ///
    /// Returns the parsed JSON response body on success; capability-specific
    /// extraction of content and metadata happens in the generators.
    pub async fn request(
        &self,
        provider_name: &str,
        capability: Capability,
        payload: Value,
        api_key_override: Option<&str>,
    ) -> Result<Value> {
        let provider = self
            .providers
            .get(provider_name)
            .ok_or_else(|| Error::InvalidProvider(provider_name.to_string()))?;

        // Check the budget before touching the network.
        self.limiter.check_and_consume(provider_name)?;

        let api_key = api_key_override
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .or_else(|| {
                self.keys
                    .get(provider_name)
                    .filter(|k| !k.is_empty())
                    .cloned()
            })
            .ok_or_else(|| Error::MissingKey(provider_name.to_string()))?;

        let endpoint = provider
            .endpoint(capability)
            .ok_or_else(|| Error::InvalidEndpoint {
                provider: provider_name.to_string(),
                capability: capability.to_string(),
            })?;

        debug!("POST {} ({})", endpoint, provider_name);

        let mut request = self
            .client
            .post(&endpoint)
            .header(ACCEPT, "application/json")
            .json(&payload);
        request = apply_auth(request, &provider.auth, &api_key);

        let start = Instant::now();
        let response = request.send().await;
        let duration = start.elapsed();

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                self.log_exchange(provider_name, &endpoint, &payload, &e.to_string(), None, duration);
                return Err(e.into());
            }
        };

        let status = response.status();
        let headers = response.headers().clone();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                self.log_exchange(provider_name, &endpoint, &payload, &e.to_string(), Some(status.as_u16()), duration);
                return Err(e.into());
            }
        };

        self.log_exchange(
            provider_name,
            &endpoint,
            &payload,
            &body,
            Some(status.as_u16()),
            duration,
        );

        info!(
            "{} {} -> {} ({}ms)",
            provider_name,
            capability,
            status.as_u16(),
            duration.as_millis()
        );

        if !status.is_success() {
            let raw: Option<Value> = serde_json::from_str(&body).ok();
            return Err(Error::Api {
                status: status.as_u16(),
                message: extract_error_message(raw.as_ref()),
                raw,
            });
        }

        // Remote rate-limit headers override local bookkeeping.
        self.limiter.update_from_headers(provider_name, &headers);

        serde_json::from_str(&body).map_err(|e| Error::Api {
            status: status.as_u16(),
            message: format!("Invalid JSON in response body: {}", e),
            raw: None,
        })
    }

    /// Test connectivity for a provider with an explicit API key.
    ///
    /// Builds a minimal capability-appropriate payload; any 2xx response
    /// counts as connected.
    pub async fn test_connection(
        &self,
        provider_name: &str,
        api_key: &str,
    ) -> Result<ConnectionStatus> {
        let provider = self
            .providers
            .get(provider_name)
            .ok_or_else(|| Error::InvalidProvider(provider_name.to_string()))?;

        if api_key.is_empty() {
            return Err(Error::MissingKey(provider_name.to_string()));
        }

        let capability = test_capability(&provider);
        let payload =
            crate::providers::payloads::test_payload(provider_name, capability, &provider.test_prompt);

        self.request(provider_name, capability, payload, Some(api_key))
            .await?;

        Ok(ConnectionStatus {
            provider: provider.display_name.clone(),
            status: "connected".to_string(),
            rate: self.limiter.snapshot(provider_name),
        })
    }

    fn log_exchange(
        &self,
        provider: &str,
        endpoint: &str,
        payload: &Value,
        response: &str,
        status: Option<u16>,
        duration: Duration,
    ) {
        let storage = match &self.request_log {
            Some(storage) => storage.clone(),
            None => return,
        };

        let entry = ApiLogEntry {
            provider: provider.to_string(),
            endpoint: endpoint.to_string(),
            request_data: payload.to_string(),
            response_data: response.to_string(),
            status_code: status,
            duration_secs: duration.as_secs_f64(),
            timestamp: Utc::now(),
        };

        tokio::spawn(async move {
            if let Err(e) = storage.log_api_request(&entry).await {
                warn!("Failed to record API log entry: {}", e);
            }
        });
    }
}

/// Apply a provider's auth-header shape to a request.
fn apply_auth(
    request: reqwest::RequestBuilder,
    auth: &AuthScheme,
    api_key: &str,
) -> reqwest::RequestBuilder {
    match auth {
        AuthScheme::Bearer => request.bearer_auth(api_key),
        AuthScheme::Raw => request.header(AUTHORIZATION, api_key),
        AuthScheme::Header(name) => request.header(name.as_str(), api_key),
    }
}

/// Pick the capability a connection test should exercise.
///
/// Media endpoints take precedence so a test proves the capability the
/// provider was added for; text-only providers fall back to text/chat.
fn test_capability(provider: &Provider) -> Capability {
    for capability in [Capability::Image, Capability::Voice, Capability::Video] {
        if provider.endpoints.contains_key(&capability) {
            return capability;
        }
    }
    if provider.endpoints.contains_key(&Capability::Text) {
        Capability::Text
    } else {
        Capability::Chat
    }
}

/// Extract a human-readable message from a provider error body.
///
/// Providers conventionally report either `{"error": {"message": ...}}` or
/// a top-level `{"message": ...}`.
fn extract_error_message(raw: Option<&Value>) -> String {
    raw.and_then(|body| {
        body.pointer("/error/message")
            .or_else(|| body.get("message"))
            .and_then(|v| v.as_str())
            .map(String::from)
    })
    .unwrap_or_else(|| "API request failed".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderLimits;
    use std::collections::HashMap;

    fn keys_of(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_request_unknown_provider() {
        let gateway = Gateway::new(ProviderRegistry::new(), HashMap::new());

        let err = gateway
            .request("nonexistent", Capability::Chat, serde_json::json!({}), None)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "INVALID_PROVIDER");
    }

    #[tokio::test]
    async fn test_request_missing_key() {
        let gateway = Gateway::new(ProviderRegistry::new(), HashMap::new());

        let err = gateway
            .request("openai", Capability::Chat, serde_json::json!({}), None)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "MISSING_KEY");
    }

    #[tokio::test]
    async fn test_request_empty_override_falls_through() {
        let gateway = Gateway::new(ProviderRegistry::new(), HashMap::new());

        // An empty override must not satisfy the key requirement.
        let err = gateway
            .request("openai", Capability::Chat, serde_json::json!({}), Some(""))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "MISSING_KEY");
    }

    #[tokio::test]
    async fn test_request_unsupported_capability() {
        let gateway = Gateway::new(
            ProviderRegistry::new(),
            keys_of(&[("synthesia", "key-123")]),
        );

        let err = gateway
            .request("synthesia", Capability::Text, serde_json::json!({}), None)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "INVALID_ENDPOINT");
    }

    #[tokio::test]
    async fn test_request_rate_limited_before_dispatch() {
        let mut registry = ProviderRegistry::empty();
        let mut provider = crate::providers::ProviderRegistry::new()
            .get("openai")
            .unwrap()
            .as_ref()
            .clone();
        provider.limits = ProviderLimits {
            requests_per_window: 0,
            window_secs: 60,
        };
        registry.register(provider);

        let gateway = Gateway::new(registry, keys_of(&[("openai", "key-123")]));

        let err = gateway
            .request("openai", Capability::Chat, serde_json::json!({}), None)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "RATE_LIMITED");
        assert!(err.retry_after_secs().is_some());
    }

    #[tokio::test]
    async fn test_test_connection_requires_key() {
        let gateway = Gateway::new(ProviderRegistry::new(), HashMap::new());

        let err = gateway.test_connection("openai", "").await.unwrap_err();
        assert_eq!(err.code(), "MISSING_KEY");
    }

    #[test]
    fn test_test_capability_preference() {
        let registry = ProviderRegistry::new();

        // OpenAI has an image endpoint, which outranks text/chat.
        let openai = registry.get("openai").unwrap();
        assert_eq!(test_capability(&openai), Capability::Image);

        let elevenlabs = registry.get("elevenlabs").unwrap();
        assert_eq!(test_capability(&elevenlabs), Capability::Voice);

        let synthesia = registry.get("synthesia").unwrap();
        assert_eq!(test_capability(&synthesia), Capability::Video);
    }

    #[test]
    fn test_extract_error_message_shapes() {
        let nested = serde_json::json!({"error": {"message": "Invalid API key"}});
        assert_eq!(extract_error_message(Some(&nested)), "Invalid API key");

        let flat = serde_json::json!({"message": "Quota exceeded"});
        assert_eq!(extract_error_message(Some(&flat)), "Quota exceeded");

        let unknown = serde_json::json!({"detail": "something"});
        assert_eq!(extract_error_message(Some(&unknown)), "API request failed");
        assert_eq!(extract_error_message(None), "API request failed");
    }

    #[test]
    fn test_list_providers_reports_keys() {
        let gateway = Gateway::new(
            ProviderRegistry::new(),
            keys_of(&[("openai", "key-123"), ("elevenlabs", "")]),
        );

        let summaries = gateway.list_providers();
        assert_eq!(summaries.len(), 4);

        let by_name: HashMap<&str, &ProviderSummary> =
            summaries.iter().map(|s| (s.name.as_str(), s)).collect();
        assert!(by_name["openai"].has_key);
        assert!(!by_name["elevenlabs"].has_key);
        assert!(!by_name["synthesia"].has_key);
        assert_eq!(by_name["openai"].rate.limit, 60);
    }
}
