//! Content cache.
//!
//! A read-through layer callers consult before invoking a generator, so
//! identical (content type, prompt, settings) requests within the TTL do
//! not hit the remote provider twice. Expiry is wall-clock based; cleanup
//! is a periodic sweep, not an eviction policy.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::generators::GenerationOutput;
use crate::settings::GenerationSettings;
use crate::storage::SqliteStorage;

/// Default cache time-to-live (one day).
pub const DEFAULT_TTL_SECS: u64 = 86_400;

/// Hash identifying one (content type, prompt, settings) request.
pub fn content_hash(content_type: &str, prompt: &str, settings: &GenerationSettings) -> String {
    let canonical = json!({
        "content_type": content_type,
        "prompt": prompt,
        "settings": settings,
    });

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Read-through content cache backed by the storage layer.
#[derive(Clone)]
pub struct ContentCache {
    storage: Arc<SqliteStorage>,
    ttl_secs: u64,
}

impl ContentCache {
    pub fn new(storage: Arc<SqliteStorage>, ttl_secs: u64) -> Self {
        Self { storage, ttl_secs }
    }

    /// Look up a cached generation result.
    pub async fn get(&self, hash: &str) -> Result<Option<GenerationOutput>> {
        let data = match self.storage.get_cached_content(hash).await? {
            Some(data) => data,
            None => return Ok(None),
        };

        // A cache row that no longer parses is treated as a miss.
        let value: serde_json::Value = match serde_json::from_str(&data) {
            Ok(value) => value,
            Err(_) => return Ok(None),
        };

        let content = value
            .get("content")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let meta = value
            .get("meta")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();

        Ok(Some(GenerationOutput::with_meta(content, meta)))
    }

    /// Store a generation result under a hash.
    pub async fn put(
        &self,
        hash: &str,
        content_type: &str,
        output: &GenerationOutput,
    ) -> Result<()> {
        let data = json!({
            "content": output.content,
            "meta": output.meta,
        });
        let expires_at = Utc::now() + Duration::seconds(self.ttl_secs as i64);
        self.storage
            .set_cached_content(hash, content_type, &data.to_string(), expires_at)
            .await
    }

    /// Remove expired entries. Returns the number removed.
    pub async fn sweep(&self) -> Result<usize> {
        self.storage.clean_expired_cache().await
    }
}
