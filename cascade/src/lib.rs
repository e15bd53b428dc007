//! # cascade — the composed tiered cascade engine
//!
//! Wires the protocol traits and their concrete implementations
//! behind one entry point, [`CascadeEngine`], the way
//! `neuron-orch-kit::Kit` wires an orchestrator and a state backend:
//! an `Arc<dyn Trait>`-holding struct with `new`/`with_*` builder
//! methods and a driving method (`Kit::local_runner` here is
//! [`CascadeEngine::run_with_metadata`], with [`CascadeEngine::run`]
//! layered on top when a store is attached).
//!
//! Every collaborator beyond the executor/guard pair is optional and
//! feature-gated (spec §2 data flow): an embedder can compose only the
//! pieces it needs, or pull in `engine` for the complete pipeline —
//! envelope (J) → validator (I) → rate limiter (D) → metadata fetch
//! (B) → classifier (E, if `auto`) → authorization (H, enforced inside
//! the executor) → cascade executor (G) driving the tier dispatcher (F).

#![deny(missing_docs)]

#[cfg(feature = "core")]
mod config;
#[cfg(feature = "core")]
mod envelope;

#[cfg(feature = "core")]
pub use config::EngineConfig;
#[cfg(all(feature = "core", feature = "classify"))]
pub use config::ClassifierCacheConfig;
#[cfg(feature = "core")]
pub use config::RateLimitConfig;
#[cfg(feature = "core")]
pub use envelope::{
    build_response, response_headers, CascadeRequestBody, CascadeResponseBody, ErrorBody,
    ErrorDetail, ResponseMeta,
};

#[cfg(feature = "core")]
use cascade_exec::CascadeExecutor;
#[cfg(feature = "core")]
use cascade_protocol::auth::{AuthorizationGuard, Principal};
#[cfg(feature = "core")]
use cascade_protocol::dispatch::TierHandler;
#[cfg(feature = "core")]
use cascade_protocol::error::{CascadeError, ErrorKind};
#[cfg(feature = "core")]
use cascade_protocol::id::{CascadeId, FunctionId};
#[cfg(feature = "core")]
use cascade_protocol::metadata::FunctionMetadata;
#[cfg(feature = "core")]
use cascade_protocol::tier::{CascadeOptions, CascadeResult, Tier};
#[cfg(feature = "core")]
use std::sync::Arc;
#[cfg(feature = "core")]
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(feature = "classify")]
use cascade_protocol::classify::Classifier;
#[cfg(feature = "logs")]
use cascade_protocol::logs::{LogAggregator, LogEntry, LogLevel};
#[cfg(feature = "ratelimit")]
use cascade_protocol::ratelimit::RateLimiter;
#[cfg(feature = "store")]
use cascade_protocol::store::CodeStore;
#[cfg(feature = "validate")]
use cascade_protocol::validate::{InputValidator, ValidationOutcome};

/// Everything that can go wrong before or around a cascade run, spec
/// §7's propagation boundary one layer up from [`CascadeError`]: the
/// pipeline stages the executor itself never sees (rate limiting,
/// metadata lookup, input validation). Mirrors `cascade_protocol`'s
/// per-concern error shape — `#[non_exhaustive]`, one catch-all arm,
/// a `.kind()` into the same closed [`ErrorKind`] vocabulary.
#[cfg(feature = "core")]
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The caller exceeded its request quota for this function.
    #[error("rate limit exceeded")]
    RateLimited,

    /// No metadata is on record for the requested function/version.
    #[error("function not found: {0}")]
    FunctionNotFound(String),

    /// Input failed structural validation against the function's
    /// declared schema.
    #[error("input failed schema validation")]
    Invalid(ValidationOutcome),

    /// The cascade itself failed — authorization denial, exhaustion,
    /// cancellation, or no tiers available.
    #[error(transparent)]
    Cascade(#[from] CascadeError),

    /// A collaborator (store, rate limiter, classifier) failed.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(feature = "core")]
impl EngineError {
    /// Map to the closed error-kind vocabulary, spec §7.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::RateLimited => ErrorKind::ServiceUnavailable,
            EngineError::FunctionNotFound(_) => ErrorKind::FunctionNotFound,
            EngineError::Invalid(_) => ErrorKind::ValidationError,
            EngineError::Cascade(e) => e.kind(),
            EngineError::Other(_) => ErrorKind::InternalError,
        }
    }
}

#[cfg(feature = "core")]
fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(feature = "core")]
fn generate_cascade_id() -> CascadeId {
    let suffix: u32 = rand::random();
    CascadeId::new(format!("c-{}-{suffix:08x}", now_ms()))
}

/// The composed cascade engine: one executor plus whichever optional
/// collaborators (store, log aggregator, rate limiter, classifier,
/// input validator) the caller wires in.
///
/// Construction follows `Kit`'s shape: [`CascadeEngine::new`] takes the
/// one mandatory collaborator (the authorization guard, since the
/// executor enforces it on every attempt), and each `with_*` method
/// attaches an optional one.
#[cfg(feature = "core")]
pub struct CascadeEngine {
    executor: CascadeExecutor,
    config: EngineConfig,
    #[cfg(feature = "store")]
    store: Option<Arc<dyn CodeStore>>,
    #[cfg(feature = "logs")]
    logs: Option<Arc<dyn LogAggregator>>,
    #[cfg(feature = "ratelimit")]
    rate_limiter: Option<Arc<dyn RateLimiter>>,
    #[cfg(feature = "classify")]
    classifier: Option<Arc<dyn Classifier>>,
    #[cfg(feature = "validate")]
    validator: Option<Arc<dyn InputValidator>>,
}

#[cfg(feature = "core")]
impl CascadeEngine {
    /// Create a new engine around `guard`, with no optional
    /// collaborators and no tier handlers installed yet.
    pub fn new(guard: Arc<dyn AuthorizationGuard>) -> Self {
        Self {
            executor: CascadeExecutor::new(guard),
            config: EngineConfig::default(),
            #[cfg(feature = "store")]
            store: None,
            #[cfg(feature = "logs")]
            logs: None,
            #[cfg(feature = "ratelimit")]
            rate_limiter: None,
            #[cfg(feature = "classify")]
            classifier: None,
            #[cfg(feature = "validate")]
            validator: None,
        }
    }

    /// Apply non-default engine configuration (rate-limit parameters,
    /// classifier cache parameters).
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Install the handler for `tier`, replacing any prior registration.
    pub fn with_handler(mut self, tier: Tier, handler: Arc<dyn TierHandler>) -> Self {
        self.executor = self.executor.with_handler(tier, handler);
        self
    }

    /// Attach a code/metadata store, enabling metadata lookup before
    /// each cascade run.
    #[cfg(feature = "store")]
    pub fn with_store(mut self, store: Arc<dyn CodeStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Attach a log aggregator, enabling per-attempt capture.
    #[cfg(feature = "logs")]
    pub fn with_logs(mut self, logs: Arc<dyn LogAggregator>) -> Self {
        self.logs = Some(logs);
        self
    }

    /// Attach a rate limiter, enabling per-function quota enforcement.
    #[cfg(feature = "ratelimit")]
    pub fn with_rate_limiter(mut self, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    /// Attach a classifier, enabling `startTier: auto` for functions
    /// with no declared `type`.
    #[cfg(feature = "classify")]
    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.executor = self.executor.with_classifier(Arc::clone(&classifier));
        self.classifier = Some(classifier);
        self
    }

    /// Attach an input validator, enabling schema validation of the
    /// request input before any tier runs.
    #[cfg(feature = "validate")]
    pub fn with_validator(mut self, validator: Arc<dyn InputValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Run the full invocation pipeline for `function_id`, spec §2's
    /// data flow: rate limit, fetch metadata, validate input, then
    /// drive the cascade. Returns the assembled response body on a
    /// tier success, or the mapped [`EngineError`] on any stage
    /// failure.
    ///
    /// `version = None` resolves the function's `latest` pointer.
    /// When `store` is not configured, `metadata` must be supplied by
    /// the caller via [`Self::run_with_metadata`] instead — this
    /// method requires a store.
    #[cfg(feature = "store")]
    pub async fn run(
        &self,
        function_id: &FunctionId,
        version: Option<&cascade_protocol::semver::SemVer>,
        input: serde_json::Value,
        options: &CascadeOptions,
        principal: Option<&Principal>,
    ) -> Result<CascadeResponseBody, EngineError> {
        let store = self
            .store
            .as_ref()
            .expect("run() requires a store; use run_with_metadata without one");
        let metadata = store
            .get_metadata(function_id, version)
            .await
            .map_err(|e| EngineError::Other(Box::new(e)))?
            .ok_or_else(|| EngineError::FunctionNotFound(function_id.to_string()))?;

        self.run_with_metadata(metadata, input, options, principal)
            .await
    }

    /// Run the pipeline against an already-resolved `metadata` record,
    /// for embedders that own their own store (or none at all — the
    /// `store` feature disabled case).
    pub async fn run_with_metadata(
        &self,
        metadata: FunctionMetadata,
        input: serde_json::Value,
        options: &CascadeOptions,
        principal: Option<&Principal>,
    ) -> Result<CascadeResponseBody, EngineError> {
        #[cfg(feature = "ratelimit")]
        if let Some(limiter) = &self.rate_limiter {
            let decision = limiter
                .check_and_increment(
                    metadata.id.as_str(),
                    self.config.rate_limit.limit,
                    self.config.rate_limit.window,
                )
                .await
                .map_err(|e| EngineError::Other(Box::new(e)))?;
            if !decision.allowed {
                return Err(EngineError::RateLimited);
            }
        }

        #[cfg(feature = "validate")]
        if let (Some(validator), Some(schema)) = (&self.validator, &metadata.input_schema) {
            let outcome = validator.validate(&schema.0, &input);
            if !outcome.valid {
                return Err(EngineError::Invalid(outcome));
            }
        }

        let cascade_id = generate_cascade_id();
        let executed_at = now_ms();
        let auto_classified = matches!(options.start_tier, cascade_protocol::tier::StartTier::Auto)
            && metadata.r#type.is_none();

        #[cfg(feature = "logs")]
        if let Some(logs) = &self.logs {
            let _ = logs
                .capture(LogEntry {
                    id: cascade_protocol::id::LogEntryId::new(""),
                    function_id: metadata.id.to_string(),
                    timestamp: executed_at,
                    level: LogLevel::Info,
                    message: format!("cascade {cascade_id} started"),
                    metadata: serde_json::json!({ "cascadeId": cascade_id.to_string() }),
                    request_id: None,
                    duration_ms: None,
                })
                .await;
        }

        let result: Result<CascadeResult, CascadeError> = self
            .executor
            .execute(&metadata, input, options, principal)
            .await;

        #[cfg(feature = "logs")]
        if let Some(logs) = &self.logs {
            let (level, message) = match &result {
                Ok(r) => (LogLevel::Info, format!("cascade {cascade_id} succeeded at tier {}", r.success_tier)),
                Err(e) => (LogLevel::Error, format!("cascade {cascade_id} failed: {e}")),
            };
            let _ = logs
                .capture(LogEntry {
                    id: cascade_protocol::id::LogEntryId::new(""),
                    function_id: metadata.id.to_string(),
                    timestamp: now_ms(),
                    level,
                    message,
                    metadata: serde_json::json!({ "cascadeId": cascade_id.to_string() }),
                    request_id: None,
                    duration_ms: None,
                })
                .await;
        }

        let result = result?;
        Ok(build_response(
            cascade_id,
            &metadata.id,
            executed_at,
            auto_classified,
            result,
        ))
    }
}

#[cfg(all(test, feature = "engine"))]
mod tests {
    use super::*;
    use cascade_auth::TrustedGuard;
    use cascade_dispatch::FnTierHandler;
    use cascade_protocol::dispatch::TierResponse;
    use cascade_protocol::semver::SemVer;
    use cascade_validate::SchemaWalker;
    use serde_json::json;

    fn metadata(id: &str) -> FunctionMetadata {
        FunctionMetadata {
            id: FunctionId::new(id).unwrap(),
            version: SemVer::parse("1.0.0").unwrap(),
            r#type: Some(Tier::Code),
            name: id.into(),
            description: None,
            language: None,
            entry_point: None,
            dependencies: Default::default(),
            input_schema: Some(cascade_protocol::metadata::JsonSchema(json!({
                "type": "object",
                "required": ["a"],
                "properties": { "a": { "type": "number" } }
            }))),
            output_schema: None,
            tags: vec![],
            permissions: vec![],
            system_prompt: None,
            user_prompt: None,
            goal: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn engine() -> CascadeEngine {
        CascadeEngine::new(Arc::new(TrustedGuard::new()))
            .with_handler(
                Tier::Code,
                Arc::new(FnTierHandler::new(|_meta, input, _prev| {
                    Ok(TierResponse::ok(json!({ "echo": input["a"] })))
                })),
            )
            .with_validator(Arc::new(SchemaWalker::new()))
    }

    #[tokio::test]
    async fn run_with_metadata_completes_a_valid_request() {
        let response = engine()
            .run_with_metadata(metadata("sum"), json!({ "a": 5 }), &CascadeOptions::default(), None)
            .await
            .unwrap();
        assert_eq!(response.output["echo"], 5);
        assert_eq!(response.success_tier, Tier::Code);
    }

    #[tokio::test]
    async fn run_with_metadata_rejects_invalid_input_before_dispatch() {
        let err = engine()
            .run_with_metadata(metadata("sum"), json!({}), &CascadeOptions::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Invalid(_)));
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn run_with_metadata_enforces_configured_rate_limit() {
        let engine = engine()
            .with_config(EngineConfig {
                rate_limit: RateLimitConfig {
                    limit: 1,
                    window: cascade_protocol::DurationMs::from_secs(60),
                },
                ..Default::default()
            })
            .with_rate_limiter(Arc::new(cascade_ratelimit::InMemoryRateLimiter::new()));

        engine
            .run_with_metadata(metadata("limited"), json!({ "a": 1 }), &CascadeOptions::default(), None)
            .await
            .unwrap();

        let err = engine
            .run_with_metadata(metadata("limited"), json!({ "a": 2 }), &CascadeOptions::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::RateLimited));
    }
}
