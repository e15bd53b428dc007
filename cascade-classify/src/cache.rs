//! A bounded, TTL-expiring decision cache over any [`Classifier`] (spec
//! §4.E): "a bounded LRU decision cache (default ≤500 or 1000 entries,
//! default TTL 1 hour) is per request at the hot path to avoid
//! cross-request state leaks; it may be re-used across requests only if
//! strictly immutable."
//!
//! [`CachingClassifier`] is cheap enough to construct fresh per request
//! (the common case). Sharing one instance across requests behind an
//! `Arc` is also safe: every mutation lives behind its internal mutex
//! and is keyed purely by `(functionId, descriptionText)`, so no
//! request ever observes another request's caller-specific state —
//! the "strictly immutable" condition required for reuse.

use async_trait::async_trait;
use cascade_protocol::classify::{Classification, ClassifyRequest, Classifier};
use cascade_protocol::error::ClassifierError;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Default cache capacity (spec §4.E, "default ≤500 or 1000 entries").
pub const DEFAULT_CAPACITY: usize = 500;
/// Default cache entry time-to-live (spec §4.E, "default TTL 1 hour").
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

struct CacheEntry {
    classification: Classification,
    inserted_at: Instant,
}

/// Wraps an inner [`Classifier`] with a bounded, TTL-expiring cache
/// keyed by `(functionId, descriptionText)`.
pub struct CachingClassifier<C> {
    inner: C,
    cache: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl<C: Classifier> CachingClassifier<C> {
    /// Wrap `inner` with the default capacity and TTL.
    pub fn new(inner: C) -> Self {
        Self::with_capacity_and_ttl(inner, DEFAULT_CAPACITY, DEFAULT_TTL)
    }

    /// Wrap `inner` with an explicit capacity and TTL.
    pub fn with_capacity_and_ttl(inner: C, capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    fn cache_key(request: &ClassifyRequest) -> String {
        format!(
            "{}\u{0}{}",
            request.function_id,
            request.description.as_deref().unwrap_or("")
        )
    }
}

#[async_trait]
impl<C: Classifier + Send + Sync> Classifier for CachingClassifier<C> {
    async fn classify(&self, request: &ClassifyRequest) -> Result<Classification, ClassifierError> {
        let key = Self::cache_key(request);

        {
            let mut cache = self.cache.lock().await;
            if let Some(entry) = cache.get(&key) {
                if entry.inserted_at.elapsed() < self.ttl {
                    return Ok(entry.classification.clone());
                }
                cache.pop(&key);
            }
        }

        let classification = self.inner.classify(request).await?;

        let mut cache = self.cache.lock().await;
        cache.put(
            key,
            CacheEntry {
                classification: classification.clone(),
                inserted_at: Instant::now(),
            },
        );

        Ok(classification)
    }
}
