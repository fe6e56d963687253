//! Per-provider rate limiting.
//!
//! Tracks a call budget per provider over a fixed window. The window
//! resets lazily on the next check after it elapses. When a provider's
//! response carries authoritative rate-limit headers, those overwrite the
//! local bookkeeping - remote truth wins.
//!
//! The limiter is process-local and optimistic: concurrent processes each
//! keep their own budget, which can drift from the provider's real quota
//! until the next header update. That drift is an accepted tradeoff.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::providers::ProviderLimits;

/// Rate-limit state for a single provider.
#[derive(Debug, Clone, Copy)]
struct WindowState {
    limit: u32,
    remaining: u32,
    /// Unix timestamp (seconds) when the window resets
    reset_at: u64,
    window_secs: u64,
}

/// Point-in-time view of a provider's rate budget.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the window resets (0 when already elapsed)
    pub resets_in_secs: u64,
}

/// Per-provider rate limiter.
pub struct RateLimiter {
    states: RwLock<HashMap<String, WindowState>>,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl RateLimiter {
    /// Create an empty limiter.
    pub fn new() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
        }
    }

    /// Register a provider's budget. A full window starts immediately.
    pub fn register(&self, provider: &str, limits: ProviderLimits) {
        let now = unix_now();
        let mut states = self.states.write().expect("rate limiter lock poisoned");
        states.insert(
            provider.to_string(),
            WindowState {
                limit: limits.requests_per_window,
                remaining: limits.requests_per_window,
                reset_at: now + limits.window_secs,
                window_secs: limits.window_secs,
            },
        );
    }

    /// Consume one call from the provider's budget.
    ///
    /// Returns `RateLimited` with the seconds until reset when the budget
    /// is exhausted. Providers without a registered budget are not limited.
    pub fn check_and_consume(&self, provider: &str) -> Result<()> {
        self.check_and_consume_at(provider, unix_now())
    }

    fn check_and_consume_at(&self, provider: &str, now: u64) -> Result<()> {
        let mut states = self.states.write().expect("rate limiter lock poisoned");
        let state = match states.get_mut(provider) {
            Some(state) => state,
            None => return Ok(()),
        };

        if now >= state.reset_at {
            state.remaining = state.limit;
            state.reset_at = now + state.window_secs;
        }

        if state.remaining == 0 {
            return Err(Error::RateLimited {
                provider: provider.to_string(),
                retry_after_secs: state.reset_at.saturating_sub(now),
            });
        }

        state.remaining -= 1;
        Ok(())
    }

    /// Overwrite local bookkeeping from a provider's response headers.
    ///
    /// Supports the OpenAI header family (`x-ratelimit-*-requests`, with an
    /// absolute reset timestamp) and the Stability AI family
    /// (`x-ratelimit-*`, with a relative reset in seconds).
    pub fn update_from_headers(&self, provider: &str, headers: &HeaderMap) {
        self.update_from_headers_at(provider, headers, unix_now());
    }

    fn update_from_headers_at(&self, provider: &str, headers: &HeaderMap, now: u64) {
        let mut states = self.states.write().expect("rate limiter lock poisoned");
        let state = match states.get_mut(provider) {
            Some(state) => state,
            None => return,
        };

        if let Some(remaining) = header_u64(headers, "x-ratelimit-remaining-requests") {
            state.remaining = remaining as u32;
            if let Some(limit) = header_u64(headers, "x-ratelimit-limit-requests") {
                state.limit = limit as u32;
            }
            if let Some(reset) = header_u64(headers, "x-ratelimit-reset-requests") {
                state.reset_at = reset;
            }
        } else if let Some(remaining) = header_u64(headers, "x-ratelimit-remaining") {
            state.remaining = remaining as u32;
            if let Some(limit) = header_u64(headers, "x-ratelimit-limit") {
                state.limit = limit as u32;
            }
            if let Some(reset) = header_u64(headers, "x-ratelimit-reset") {
                state.reset_at = now + reset;
            }
        }
    }

    /// Current budget for a provider. Unregistered providers report zeros.
    pub fn snapshot(&self, provider: &str) -> RateLimitSnapshot {
        self.snapshot_at(provider, unix_now())
    }

    fn snapshot_at(&self, provider: &str, now: u64) -> RateLimitSnapshot {
        let states = self.states.read().expect("rate limiter lock poisoned");
        match states.get(provider) {
            Some(state) => RateLimitSnapshot {
                limit: state.limit,
                remaining: if now >= state.reset_at {
                    state.limit
                } else {
                    state.remaining
                },
                resets_in_secs: state.reset_at.saturating_sub(now),
            },
            None => RateLimitSnapshot {
                limit: 0,
                remaining: 0,
                resets_in_secs: 0,
            },
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}
