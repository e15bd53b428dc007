//! Tier vocabulary and the shapes the cascade executor (component G)
//! produces: options, attempts, results, metrics (spec §3, §4.G).

use crate::duration::DurationMs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The tier a function executes at. `None` on a function's declared
/// type means "classify me" (spec §3, §4.E).
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Deterministic sandboxed code, seconds.
    Code,
    /// One model call, tens of seconds.
    Generative,
    /// Multi-step reasoning, minutes.
    Agentic,
    /// Out-of-band human task, hours.
    Human,
}

impl Tier {
    /// The canonical tier order, cheapest first, per spec §4.G step 2.
    pub const CANONICAL_ORDER: [Tier; 4] =
        [Tier::Code, Tier::Generative, Tier::Agentic, Tier::Human];

    /// Position in the canonical order (0-3).
    pub fn rank(&self) -> usize {
        Self::CANONICAL_ORDER
            .iter()
            .position(|t| t == self)
            .expect("CANONICAL_ORDER is exhaustive over Tier")
    }

    /// The wire-format scope vocabulary this tier requires, per spec
    /// §4.H (`functions:tier:<tier>`); `Code` requires none.
    pub fn required_scope(&self) -> Option<&'static str> {
        match self {
            Tier::Code => None,
            Tier::Generative => Some("functions:tier:generative"),
            Tier::Agentic => Some("functions:tier:agentic"),
            Tier::Human => Some("functions:tier:human"),
        }
    }

    /// Default per-tier timeout, spec §3 "Cascade definition" defaults.
    pub fn default_timeout(&self) -> DurationMs {
        match self {
            Tier::Code => DurationMs::from_secs(5),
            Tier::Generative => DurationMs::from_secs(30),
            Tier::Agentic => DurationMs::from_secs(5 * 60),
            Tier::Human => DurationMs::from_secs(24 * 60 * 60),
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Tier::Code => "code",
            Tier::Generative => "generative",
            Tier::Agentic => "agentic",
            Tier::Human => "human",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(Tier::Code),
            "generative" => Ok(Tier::Generative),
            "agentic" => Ok(Tier::Agentic),
            "human" => Ok(Tier::Human),
            other => Err(format!("unknown tier {other:?}")),
        }
    }
}

/// `options.startTier` may be a concrete tier or `auto`, which defers
/// to the classifier (component E).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartTier {
    /// Resolve the starting tier via the classifier.
    Auto,
    /// Start at a specific tier.
    Tier(Tier),
}

impl Default for StartTier {
    fn default() -> Self {
        StartTier::Tier(Tier::Code)
    }
}

/// Cascade options, spec §3 "Cascade definition".
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CascadeOptions {
    /// Where to start the cascade; `Auto` triggers classification.
    pub start_tier: StartTier,
    /// Tiers to remove from the filtered order.
    pub skip_tiers: Vec<Tier>,
    /// Per-tier timeout overrides; unset tiers use [`Tier::default_timeout`].
    pub tier_timeouts: HashMap<Tier, DurationMs>,
    /// Overall cascade budget; `None` means unbounded.
    pub total_timeout: Option<DurationMs>,
    /// Race all tiers concurrently instead of escalating serially.
    pub enable_parallel: bool,
    /// Pass the previous attempt's result as context to the next tier.
    pub enable_fallback: bool,
}

impl Default for CascadeOptions {
    fn default() -> Self {
        Self {
            start_tier: StartTier::default(),
            skip_tiers: Vec::new(),
            tier_timeouts: HashMap::new(),
            total_timeout: None,
            enable_parallel: false,
            enable_fallback: false,
        }
    }
}

impl CascadeOptions {
    /// The effective timeout for `tier`: the caller's override, else
    /// the tier's spec-mandated default.
    pub fn timeout_for(&self, tier: Tier) -> DurationMs {
        self.tier_timeouts
            .get(&tier)
            .copied()
            .unwrap_or_else(|| tier.default_timeout())
    }
}

/// Outcome of one tier attempt, spec §3 "Tier attempt".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// The tier handler returned success.
    Completed,
    /// The tier handler returned an error (not a timeout).
    Failed,
    /// The tier handler did not finish within its deadline.
    Timeout,
    /// The tier was never run (budget exhausted or removed by `skipTiers`).
    Skipped,
}

/// One record in a cascade's attempt history, spec §3 "Tier attempt".
///
/// Invariant (spec §8): `status == Skipped` implies `result` and
/// `error` are both `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierAttempt {
    /// Which tier this attempt ran at.
    pub tier: Tier,
    /// 1-based attempt number within this tier (always 1; within-tier
    /// retries are not part of the cascade, spec §4.G).
    pub attempt: u32,
    /// Outcome of this attempt.
    pub status: AttemptStatus,
    /// The tier's output, present only when `status == Completed`.
    pub result: Option<serde_json::Value>,
    /// The failure message, present only when `status` is `Failed` or
    /// `Timeout`. For `Skipped`, carries the skip reason instead
    /// (e.g. `BUDGET_EXHAUSTED`).
    pub error: Option<String>,
    /// Wall-clock duration of this attempt.
    pub duration_ms: DurationMs,
    /// When this attempt started (epoch ms).
    pub timestamp: i64,
}

impl TierAttempt {
    /// Build a `completed` attempt.
    pub fn completed(tier: Tier, result: serde_json::Value, duration_ms: DurationMs, timestamp: i64) -> Self {
        Self {
            tier,
            attempt: 1,
            status: AttemptStatus::Completed,
            result: Some(result),
            error: None,
            duration_ms,
            timestamp,
        }
    }

    /// Build a `failed` attempt.
    pub fn failed(tier: Tier, error: impl Into<String>, duration_ms: DurationMs, timestamp: i64) -> Self {
        Self {
            tier,
            attempt: 1,
            status: AttemptStatus::Failed,
            result: None,
            error: Some(error.into()),
            duration_ms,
            timestamp,
        }
    }

    /// Build a `timeout` attempt.
    pub fn timed_out(tier: Tier, duration_ms: DurationMs, timestamp: i64) -> Self {
        Self {
            tier,
            attempt: 1,
            status: AttemptStatus::Timeout,
            result: None,
            error: Some("tier timed out".into()),
            duration_ms,
            timestamp,
        }
    }

    /// Build a `skipped` attempt; `reason` is carried in `error` even
    /// though the tier never ran, matching the worked examples
    /// (`BUDGET_EXHAUSTED`).
    pub fn skipped(tier: Tier, reason: impl Into<String>, timestamp: i64) -> Self {
        Self {
            tier,
            attempt: 1,
            status: AttemptStatus::Skipped,
            result: None,
            error: Some(reason.into()),
            duration_ms: DurationMs::ZERO,
            timestamp,
        }
    }
}

/// Cascade-wide execution metrics, spec §3 "Cascade result".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeMetrics {
    /// Total wall-clock duration of the cascade.
    pub total_duration_ms: DurationMs,
    /// Duration spent in each tier that ran.
    pub tier_durations: HashMap<Tier, DurationMs>,
    /// Number of tier-to-tier transitions that actually ran.
    pub escalations: u32,
    /// Reserved for within-tier retries surfaced by an executor;
    /// zero unless a tier handler reports one (spec §9 open question).
    pub total_retries: u32,
}

/// The successful outcome of a cascade execution, spec §3 "Cascade result".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeResult {
    /// The winning tier's output.
    pub output: serde_json::Value,
    /// Which tier produced `output`.
    pub success_tier: Tier,
    /// Every attempt made, in start-time order.
    pub history: Vec<TierAttempt>,
    /// Tiers removed from the order by `skipTiers` or never reached.
    pub skipped_tiers: Vec<Tier>,
    /// Aggregated execution metrics.
    pub metrics: CascadeMetrics,
}
