//! Plain configuration shapes, spec §4.A.
//!
//! These are data only — no file/env parsing lives in this core; an
//! embedding application loads values from wherever it likes (spec
//! §1) and hands them to [`crate::CascadeEngine::new`].

use cascade_protocol::duration::DurationMs;
use serde::{Deserialize, Serialize};

/// Parameters for the rate limiter's `(limit, window)` pair, spec §4.D.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub limit: u64,
    /// Window length.
    pub window: DurationMs,
}

impl Default for RateLimitConfig {
    /// 60 requests/minute — not a value spec.md pins down, since rate
    /// limits are function/deployment-specific; this is a workable
    /// starting point for an embedder that hasn't configured one yet.
    fn default() -> Self {
        Self {
            limit: 60,
            window: DurationMs::from_secs(60),
        }
    }
}

/// Bounded cache parameters for the classifier, spec §4.E.
#[cfg(feature = "classify")]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierCacheConfig {
    /// Maximum cached decisions.
    pub capacity: usize,
    /// Time-to-live of a cached decision.
    pub ttl: DurationMs,
}

#[cfg(feature = "classify")]
impl Default for ClassifierCacheConfig {
    fn default() -> Self {
        Self {
            capacity: cascade_classify::DEFAULT_CAPACITY,
            ttl: cascade_classify::DEFAULT_TTL.into(),
        }
    }
}

/// Top-level configuration for a [`crate::CascadeEngine`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Rate-limit parameters applied per function id.
    pub rate_limit: RateLimitConfig,
    /// Classifier cache parameters.
    #[cfg(feature = "classify")]
    pub classifier_cache: ClassifierCacheConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rate_limit_is_one_request_per_second_on_average() {
        let cfg = RateLimitConfig::default();
        assert_eq!(cfg.limit, 60);
        assert_eq!(cfg.window, DurationMs::from_secs(60));
    }

    #[cfg(feature = "classify")]
    #[test]
    fn default_classifier_cache_matches_crate_defaults() {
        let cfg = ClassifierCacheConfig::default();
        assert_eq!(cfg.capacity, cascade_classify::DEFAULT_CAPACITY);
        assert_eq!(cfg.ttl, DurationMs::from(cascade_classify::DEFAULT_TTL));
    }
}
