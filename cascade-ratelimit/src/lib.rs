//! # cascade-ratelimit — sliding-window rate limiter
//!
//! Implements `cascade-protocol`'s [`cascade_protocol::ratelimit::RateLimiter`]
//! trait (component D): a fixed-window-with-reset counter per key, the
//! same `RwLock<HashMap<..>>` shape `cascade-store` and
//! `neuron-state-memory::MemoryStore` use, plus a self-rescheduling
//! cleanup task that sweeps expired windows shortly after they reset.

#![deny(missing_docs)]

use async_trait::async_trait;
use cascade_protocol::duration::DurationMs;
use cascade_protocol::error::RateLimitError;
use cascade_protocol::ratelimit::{RateLimitDecision, RateLimiter, Window};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as i64
}

/// How long after a window's `resetAt` the cleanup sweep considers it
/// safe to drop, giving in-flight readers a margin before the key
/// disappears entirely (spec §5).
pub const CLEANUP_MARGIN: DurationMs = DurationMs::from_millis(1_000);

/// In-memory sliding-window rate limiter.
///
/// `(partition, key)` addressing from spec §3 is the caller's
/// responsibility — callers compose a single string key (e.g.
/// `"function:sum"` or `"principal:alice"`), keeping this type ignorant
/// of partitioning schemes.
pub struct InMemoryRateLimiter {
    windows: RwLock<HashMap<String, Window>>,
    cleanup_task: RwLock<Option<JoinHandle<()>>>,
}

impl InMemoryRateLimiter {
    /// Create a new, empty rate limiter.
    pub fn new() -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            cleanup_task: RwLock::new(None),
        }
    }

    /// Start a background task that calls `cleanup()` every `interval`.
    /// Installing a new schedule cancels any previously running one.
    pub async fn start_auto_cleanup(self: &Arc<Self>, interval: DurationMs) {
        if let Some(handle) = self.cleanup_task.write().await.take() {
            handle.abort();
        }
        let limiter = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.to_std());
            loop {
                ticker.tick().await;
                let _ = limiter.cleanup().await;
            }
        });
        *self.cleanup_task.write().await = Some(handle);
    }

    /// Cancel the background cleanup task, if one is running.
    pub async fn stop_auto_cleanup(&self) {
        if let Some(handle) = self.cleanup_task.write().await.take() {
            handle.abort();
        }
    }

    fn decide(window: &Window, limit: u64) -> RateLimitDecision {
        RateLimitDecision {
            allowed: window.count < limit,
            remaining: limit.saturating_sub(window.count),
            reset_at: window.reset_at,
        }
    }
}

impl Default for InMemoryRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, key: &str, limit: u64, window: DurationMs) -> Result<RateLimitDecision, RateLimitError> {
        let now = now_ms();
        let windows = self.windows.read().await;
        match windows.get(key) {
            Some(w) if w.reset_at > now => Ok(Self::decide(w, limit)),
            _ => Ok(RateLimitDecision {
                allowed: limit > 0,
                remaining: limit,
                reset_at: now + window.as_millis() as i64,
            }),
        }
    }

    async fn increment(&self, key: &str, window: DurationMs) -> Result<Window, RateLimitError> {
        let now = now_ms();
        let mut windows = self.windows.write().await;
        let entry = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            reset_at: now + window.as_millis() as i64,
        });
        if entry.reset_at <= now {
            entry.count = 0;
            entry.reset_at = now + window.as_millis() as i64;
        }
        entry.count += 1;
        Ok(*entry)
    }

    async fn check_and_increment(
        &self,
        key: &str,
        limit: u64,
        window: DurationMs,
    ) -> Result<RateLimitDecision, RateLimitError> {
        let now = now_ms();
        let mut windows = self.windows.write().await;
        let entry = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            reset_at: now + window.as_millis() as i64,
        });
        if entry.reset_at <= now {
            entry.count = 0;
            entry.reset_at = now + window.as_millis() as i64;
        }
        if entry.count >= limit {
            return Ok(Self::decide(entry, limit));
        }
        entry.count += 1;
        Ok(RateLimitDecision {
            allowed: true,
            remaining: limit.saturating_sub(entry.count),
            reset_at: entry.reset_at,
        })
    }

    async fn reset(&self, key: &str) -> Result<(), RateLimitError> {
        self.windows.write().await.remove(key);
        Ok(())
    }

    async fn cleanup(&self) -> Result<usize, RateLimitError> {
        let now = now_ms();
        let margin = CLEANUP_MARGIN.as_millis() as i64;
        let mut windows = self.windows.write().await;
        let before = windows.len();
        windows.retain(|_, w| w.reset_at + margin > now);
        Ok(before - windows.len())
    }
}
