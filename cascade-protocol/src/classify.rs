//! The function classifier protocol — component E.

use crate::error::ClassifierError;
use crate::tier::Tier;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The confidence threshold above which a classification is trusted;
/// below it, the caller defaults to [`Tier::Code`] (spec §4.E).
pub const CONFIDENCE_THRESHOLD: f64 = 0.6;

/// Input to a classification request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyRequest {
    /// The function's id.
    pub function_id: String,
    /// User-prompt / goal / system-prompt / description text, in
    /// priority order (see `FunctionMetadata::classification_text`).
    pub description: Option<String>,
    /// The function's declared input schema, if any, as additional signal.
    pub input_schema: Option<serde_json::Value>,
}

/// Output of a classification request, spec §4.E.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    /// The classifier's chosen tier.
    pub r#type: Tier,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Human-readable justification.
    pub reasoning: String,
}

impl Classification {
    /// Apply the confidence-threshold policy (spec §4.E): the
    /// classifier's answer when `confidence >= CONFIDENCE_THRESHOLD`,
    /// else [`Tier::Code`].
    pub fn resolved_tier(&self) -> Tier {
        if self.confidence >= CONFIDENCE_THRESHOLD {
            self.r#type
        } else {
            Tier::Code
        }
    }
}

/// The function classifier protocol, component E.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify a function's starting tier from its identity and description.
    async fn classify(&self, request: &ClassifyRequest) -> Result<Classification, ClassifierError>;
}
