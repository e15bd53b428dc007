//! The request/response envelope, component J (spec §6/§7).
//!
//! Plain `serde`-derived wire types, `camelCase` on the wire to match
//! the field casing spec.md uses throughout (`startTier`, `skippedTiers`,
//! `totalDurationMs`). HTTP routing, multipart/text-plain decoding, and
//! header injection are out of scope per spec.md §1 — this module stops
//! at the typed contract and the pure [`build_response`] function; an
//! embedding HTTP layer marshals these types to/from a request.

use cascade_protocol::error::{AuthError, CascadeError, ErrorKind};
use cascade_protocol::id::{CascadeId, FunctionId};
use cascade_protocol::tier::{CascadeMetrics, CascadeOptions, CascadeResult, Tier, TierAttempt};
use cascade_protocol::validate::ValidationIssue;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `POST <base>/cascade/<functionId>` request body, spec §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeRequestBody {
    /// The input handed to whichever tier runs.
    pub input: Value,
    /// Cascade options; absent fields take their spec-mandated defaults.
    #[serde(default)]
    pub options: CascadeOptions,
}

/// `_meta` block of a successful cascade response, spec §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    /// Unique id for this cascade run.
    pub cascade_id: CascadeId,
    /// The function that was invoked.
    pub function_id: String,
    /// When execution started (epoch ms).
    pub executed_at: i64,
    /// Number of tiers attempted (`history.len()`).
    pub tiers_attempted: usize,
    /// Present and `true` when `startTier` resolved via the classifier
    /// rather than a concrete tier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_classified: Option<bool>,
}

/// Cascade response body, spec §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeResponseBody {
    /// The winning tier's output.
    pub output: Value,
    /// Which tier produced `output`.
    pub success_tier: Tier,
    /// Every attempt made, in start-time order.
    pub history: Vec<TierAttempt>,
    /// Tiers removed from the order by `skipTiers` or never reached.
    pub skipped_tiers: Vec<Tier>,
    /// Aggregated execution metrics.
    pub metrics: CascadeMetrics,
    /// Out-of-band run metadata.
    #[serde(rename = "_meta")]
    pub meta: ResponseMeta,
}

/// Build the response body for a completed cascade run, spec §6.
///
/// `auto_classified` reflects the request's own `options.startTier`,
/// not anything the executor reports back — `cascade-exec`'s public
/// API deliberately doesn't surface classifier internals into
/// `CascadeResult`, so this is the request-side half of the
/// `(autoClassified, classification)?` pair from spec §6; the
/// `classification` half is omitted (see `DESIGN.md`).
pub fn build_response(
    cascade_id: CascadeId,
    function_id: &FunctionId,
    executed_at: i64,
    auto_classified: bool,
    result: CascadeResult,
) -> CascadeResponseBody {
    let tiers_attempted = result.history.len();
    CascadeResponseBody {
        output: result.output,
        success_tier: result.success_tier,
        history: result.history,
        skipped_tiers: result.skipped_tiers,
        metrics: result.metrics,
        meta: ResponseMeta {
            cascade_id,
            function_id: function_id.to_string(),
            executed_at,
            tiers_attempted,
            auto_classified: auto_classified.then_some(true),
        },
    }
}

/// The representational response headers spec §6 names
/// (`X-Cascade-Id`, `X-Success-Tier`, `X-Execution-Time`), for an
/// embedding HTTP layer to attach verbatim.
pub fn response_headers(body: &CascadeResponseBody, execution_time_ms: u64) -> [(&'static str, String); 3] {
    [
        ("X-Cascade-Id", body.meta.cascade_id.to_string()),
        ("X-Success-Tier", body.success_tier.to_string()),
        ("X-Execution-Time", execution_time_ms.to_string()),
    ]
}

/// One error detail, spec §7: `{code, message, details?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    /// The closed error-kind code, e.g. `"CASCADE_EXHAUSTED"`.
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
    /// Extra structured context (e.g. `{tier, requiredScope}` for a
    /// `FORBIDDEN`, the full history for a `CASCADE_EXHAUSTED`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// The user-visible error body, spec §7: `{error, requestId?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// The error detail.
    pub error: ErrorDetail,
    /// The inbound request id, if one was threaded through.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorBody {
    /// Build an error body from a cascade-level failure, spec §7's
    /// propagation policy: authorization failures elevate to 403 with
    /// `{tier, requiredScope}`; exhaustion packages the full history
    /// into the 422 body; everything else carries just a message.
    pub fn from_cascade_error(err: &CascadeError, request_id: Option<String>) -> Self {
        let kind = err.kind();
        let details = match err {
            CascadeError::Authorization(AuthError::Forbidden { tier, required_scope }) => {
                Some(serde_json::json!({ "tier": tier, "requiredScope": required_scope }))
            }
            CascadeError::Exhausted { history } => {
                Some(serde_json::json!({ "history": history }))
            }
            _ => None,
        };
        Self {
            error: ErrorDetail {
                code: kind.code(),
                message: err.to_string(),
                details,
            },
            request_id,
        }
    }

    /// Build an error body from validation issues, spec §7/§4.I.
    pub fn from_validation_issues(issues: &[ValidationIssue], request_id: Option<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: ErrorKind::ValidationError.code(),
                message: "input failed schema validation".to_string(),
                details: Some(serde_json::to_value(issues).unwrap_or(Value::Null)),
            },
            request_id,
        }
    }

    /// Build a bare error body carrying only `kind` and `message` —
    /// used for boundary failures that precede any cascade run
    /// (function-not-found, rate-limited, malformed request).
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>, request_id: Option<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: kind.code(),
                message: message.into(),
                details: None,
            },
            request_id,
        }
    }
}
