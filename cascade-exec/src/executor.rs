//! The cascade executor, component G (spec §4.G): walks the tier order,
//! enforcing authorization and timeouts at each escalation boundary.

use crate::cancel::CancellationSignal;
use cascade_dispatch::dispatch;
use cascade_protocol::auth::{AuthorizationGuard, Principal};
use cascade_protocol::classify::{ClassifyRequest, Classifier};
use cascade_protocol::dispatch::TierHandler;
use cascade_protocol::duration::DurationMs;
use cascade_protocol::error::CascadeError;
use cascade_protocol::metadata::FunctionMetadata;
use cascade_protocol::tier::{
    AttemptStatus, CascadeMetrics, CascadeOptions, CascadeResult, StartTier, Tier, TierAttempt,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Runs one function's cascade across its installed tier handlers.
///
/// Tier order is the canonical order (spec §4.G step 2) filtered down
/// to tiers with an installed handler, at or above `startTier`'s rank,
/// and not named in `skipTiers`. A tier with no handler registered is
/// never attempted and never recorded — it's absent from the order
/// entirely, not a failed attempt.
pub struct CascadeExecutor {
    handlers: HashMap<Tier, Arc<dyn TierHandler>>,
    guard: Arc<dyn AuthorizationGuard>,
    classifier: Option<Arc<dyn Classifier>>,
}

impl CascadeExecutor {
    /// Construct an executor with no handlers installed yet.
    pub fn new(guard: Arc<dyn AuthorizationGuard>) -> Self {
        Self {
            handlers: HashMap::new(),
            guard,
            classifier: None,
        }
    }

    /// Install the handler for `tier`, replacing any prior registration.
    pub fn with_handler(mut self, tier: Tier, handler: Arc<dyn TierHandler>) -> Self {
        self.handlers.insert(tier, handler);
        self
    }

    /// Install a classifier, enabling `StartTier::Auto`.
    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    fn tier_order(&self, start: Tier, skip: &[Tier]) -> Vec<Tier> {
        Tier::CANONICAL_ORDER
            .into_iter()
            .filter(|t| self.handlers.contains_key(t))
            .filter(|t| t.rank() >= start.rank())
            .filter(|t| !skip.contains(t))
            .collect()
    }

    async fn resolve_start_tier(
        &self,
        metadata: &FunctionMetadata,
        options: &CascadeOptions,
    ) -> Result<Tier, CascadeError> {
        match options.start_tier {
            StartTier::Tier(tier) => Ok(tier),
            StartTier::Auto => {
                if let Some(tier) = metadata.r#type {
                    return Ok(tier);
                }
                let classifier = self
                    .classifier
                    .as_ref()
                    .ok_or(CascadeError::NoTiersAvailable)?;
                let request = ClassifyRequest {
                    function_id: metadata.id.to_string(),
                    description: metadata.classification_text().map(str::to_string),
                    input_schema: metadata.input_schema.as_ref().map(|s| s.0.clone()),
                };
                let classification = classifier
                    .classify(&request)
                    .await
                    .map_err(|e| CascadeError::Other(Box::new(e)))?;
                Ok(classification.resolved_tier())
            }
        }
    }

    /// Run the cascade to completion, per spec §4.G step 3.
    ///
    /// Authorization denial is the only cascade-terminating error
    /// (spec §7) — every other tier failure escalates to the next tier
    /// in order instead of propagating.
    pub async fn execute(
        &self,
        metadata: &FunctionMetadata,
        input: Value,
        options: &CascadeOptions,
        principal: Option<&Principal>,
    ) -> Result<CascadeResult, CascadeError> {
        self.execute_cancellable(metadata, input, options, principal, &CancellationSignal::new())
            .await
    }

    /// Like [`Self::execute`], but `cancel` can abort the in-flight
    /// attempt and short-circuit the remaining tier order.
    pub async fn execute_cancellable(
        &self,
        metadata: &FunctionMetadata,
        input: Value,
        options: &CascadeOptions,
        principal: Option<&Principal>,
        cancel: &CancellationSignal,
    ) -> Result<CascadeResult, CascadeError> {
        let start_tier = self.resolve_start_tier(metadata, options).await?;
        let order = self.tier_order(start_tier, &options.skip_tiers);
        if order.is_empty() {
            return Err(CascadeError::NoTiersAvailable);
        }

        if options.enable_parallel {
            self.execute_parallel(metadata, &input, options, principal, start_tier, &order)
                .await
        } else {
            self.execute_serial(metadata, &input, options, principal, start_tier, &order, cancel)
                .await
        }
    }

    async fn execute_serial(
        &self,
        metadata: &FunctionMetadata,
        input: &Value,
        options: &CascadeOptions,
        principal: Option<&Principal>,
        start_tier: Tier,
        order: &[Tier],
        cancel: &CancellationSignal,
    ) -> Result<CascadeResult, CascadeError> {
        let cascade_start = Instant::now();
        let mut history: Vec<TierAttempt> = Vec::new();
        let mut previous_result: Option<Value> = None;

        for &tier in order {
            if cancel.is_cancelled() {
                return Err(CascadeError::Cancelled);
            }

            if let Err(auth_err) = self.guard.authorize(principal, tier) {
                history.push(TierAttempt::failed(
                    tier,
                    auth_err.to_string(),
                    DurationMs::ZERO,
                    now_ms(),
                ));
                return Err(CascadeError::Authorization(auth_err));
            }

            let tier_timeout = options.timeout_for(tier);
            let effective = match options.total_timeout {
                Some(total) => {
                    let remaining = total.saturating_sub(DurationMs::from(cascade_start.elapsed()));
                    DurationMs::from_millis(tier_timeout.as_millis().min(remaining.as_millis()))
                }
                None => tier_timeout,
            };
            if effective.is_non_positive() {
                history.push(TierAttempt::skipped(tier, "BUDGET_EXHAUSTED", now_ms()));
                continue;
            }

            let handler = self
                .handlers
                .get(&tier)
                .expect("tier_order only yields tiers with an installed handler")
                .clone();
            let fallback_ctx = if options.enable_fallback {
                previous_result.as_ref()
            } else {
                None
            };
            let timestamp = now_ms();
            let attempt_start = Instant::now();

            let run = dispatch(handler.as_ref(), metadata, input, fallback_ctx);
            tokio::select! {
                res = tokio::time::timeout(effective.to_std(), run) => {
                    let duration = DurationMs::from(attempt_start.elapsed());
                    match res {
                        Ok(Ok(output)) => {
                            history.push(TierAttempt::completed(tier, output.clone(), duration, timestamp));
                            let metrics = Self::metrics(cascade_start.elapsed(), &history);
                            let skipped_tiers = Self::skipped_tiers(start_tier, &history);
                            return Ok(CascadeResult {
                                output,
                                success_tier: tier,
                                history,
                                skipped_tiers,
                                metrics,
                            });
                        }
                        Ok(Err(dispatch_err)) => {
                            history.push(TierAttempt::failed(tier, dispatch_err.to_string(), duration, timestamp));
                            previous_result = None;
                        }
                        Err(_elapsed) => {
                            history.push(TierAttempt::timed_out(tier, duration, timestamp));
                            previous_result = None;
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    return Err(CascadeError::Cancelled);
                }
            }
        }

        Err(CascadeError::Exhausted { history })
    }

    async fn execute_parallel(
        &self,
        metadata: &FunctionMetadata,
        input: &Value,
        options: &CascadeOptions,
        principal: Option<&Principal>,
        start_tier: Tier,
        order: &[Tier],
    ) -> Result<CascadeResult, CascadeError> {
        let cascade_start = Instant::now();

        // Authorization is checked up front, tier by tier: a denial at
        // one tier only removes that tier from the race (spec §4.G
        // "parallel mode" note) rather than failing the whole cascade,
        // since every tier is attempted concurrently instead of in
        // escalation order.
        let mut tasks = Vec::with_capacity(order.len());
        for &tier in order {
            if self.guard.authorize(principal, tier).is_err() {
                continue;
            }
            let handler = self
                .handlers
                .get(&tier)
                .expect("tier_order only yields tiers with an installed handler")
                .clone();
            let timeout = options.timeout_for(tier);
            let metadata = metadata.clone();
            let input = input.clone();
            let timestamp = now_ms();
            tasks.push(tokio::spawn(async move {
                let start = Instant::now();
                let run = dispatch(handler.as_ref(), &metadata, &input, None);
                let outcome = tokio::time::timeout(timeout.to_std(), run).await;
                let duration = DurationMs::from(start.elapsed());
                (tier, outcome, duration, timestamp)
            }));
        }

        if tasks.is_empty() {
            return Err(CascadeError::NoTiersAvailable);
        }

        let mut history: Vec<TierAttempt> = Vec::new();
        let mut winner: Option<(Tier, Value)> = None;
        for task in tasks {
            let (tier, outcome, duration, timestamp) = match task.await {
                Ok(v) => v,
                Err(_join_err) => continue,
            };
            match outcome {
                Ok(Ok(output)) => {
                    if winner.is_none() {
                        winner = Some((tier, output.clone()));
                    }
                    history.push(TierAttempt::completed(tier, output, duration, timestamp));
                }
                Ok(Err(dispatch_err)) => {
                    history.push(TierAttempt::failed(tier, dispatch_err.to_string(), duration, timestamp));
                }
                Err(_elapsed) => {
                    history.push(TierAttempt::timed_out(tier, duration, timestamp));
                }
            }
        }

        match winner {
            Some((success_tier, output)) => {
                let metrics = Self::metrics(cascade_start.elapsed(), &history);
                let skipped_tiers = Self::skipped_tiers(start_tier, &history);
                Ok(CascadeResult {
                    output,
                    success_tier,
                    history,
                    skipped_tiers,
                    metrics,
                })
            }
            None => Err(CascadeError::Exhausted { history }),
        }
    }

    fn metrics(elapsed: std::time::Duration, history: &[TierAttempt]) -> CascadeMetrics {
        let tier_durations = history
            .iter()
            .map(|a| (a.tier, a.duration_ms))
            .collect::<HashMap<_, _>>();
        CascadeMetrics {
            total_duration_ms: DurationMs::from(elapsed),
            tier_durations,
            escalations: history.len().saturating_sub(1) as u32,
            total_retries: 0,
        }
    }

    /// Tiers at or above `start`'s rank that produced no completed
    /// attempt: removed by `skipTiers`, never installed, budget-skipped,
    /// or never reached because an earlier tier already won or the
    /// cascade stopped before reaching them.
    fn skipped_tiers(start: Tier, history: &[TierAttempt]) -> Vec<Tier> {
        Tier::CANONICAL_ORDER
            .into_iter()
            .filter(|t| t.rank() >= start.rank())
            .filter(|t| match history.iter().find(|a| a.tier == *t) {
                None => true,
                Some(a) => a.status == AttemptStatus::Skipped,
            })
            .collect()
    }
}
