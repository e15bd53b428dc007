//! The rate limiter protocol — component D.

use crate::duration::DurationMs;
use crate::error::RateLimitError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A sliding-window counter for one key, spec §3 "Rate-limit window".
///
/// Invariant: `count <= limit` after any sequence of `checkAndIncrement`
/// calls; `resetAt` never moves backwards within a window's lifetime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Window {
    /// Requests counted in the current window.
    pub count: u64,
    /// When the current window resets (epoch ms).
    pub reset_at: i64,
}

/// Outcome of `check`/`checkAndIncrement`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDecision {
    /// Whether the request is allowed under the limit.
    pub allowed: bool,
    /// Requests remaining in the current window.
    pub remaining: u64,
    /// When the current window resets (epoch ms).
    pub reset_at: i64,
}

/// The rate limiter protocol, component D.
///
/// A distributed sliding-window counter with exactly-once increment
/// semantics per key. `(partition, key)` is single-writer by
/// construction (spec §5) — operations on different keys are
/// independent and require no cross-key coordination.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Read-only: the decision for `key` without mutating state.
    async fn check(&self, key: &str, limit: u64, window: DurationMs) -> Result<RateLimitDecision, RateLimitError>;

    /// Unconditionally increment `key`'s counter, creating a fresh
    /// window if absent or expired.
    async fn increment(&self, key: &str, window: DurationMs) -> Result<Window, RateLimitError>;

    /// Atomic check-then-increment: denies never consume quota.
    async fn check_and_increment(
        &self,
        key: &str,
        limit: u64,
        window: DurationMs,
    ) -> Result<RateLimitDecision, RateLimitError>;

    /// Delete `key`'s window entirely.
    async fn reset(&self, key: &str) -> Result<(), RateLimitError>;

    /// Remove all windows with `resetAt <= now`; returns the count removed.
    async fn cleanup(&self) -> Result<usize, RateLimitError>;
}
