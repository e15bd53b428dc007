//! A deterministic fallback classifier (spec §4.E: "when the model
//! backend is unavailable, fall back to a deterministic heuristic
//! (keyword/shape inspection of id and description)").

use async_trait::async_trait;
use cascade_protocol::classify::{Classification, ClassifyRequest, Classifier};
use cascade_protocol::error::ClassifierError;
use cascade_protocol::tier::Tier;

const HUMAN_KEYWORDS: &[&str] = &[
    "approve", "approval", "review", "manual", "sign-off", "signoff", "escalate", "human",
];
const AGENTIC_KEYWORDS: &[&str] = &[
    "agent", "plan", "multi-step", "multistep", "tool", "orchestrate", "autonomous", "workflow",
];
const GENERATIVE_KEYWORDS: &[&str] = &[
    "generate", "write", "summarize", "summarise", "draft", "compose", "creative", "llm", "gpt",
];

/// Count how many of `keywords` appear as a substring of `text` (already
/// lowercased).
fn count_hits(text: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|k| text.contains(*k)).count()
}

/// Confidence for a keyword-matched tier: scales with hit count, clamped
/// to a band that stays trustworthy but never claims certainty.
fn confidence_for_hits(hits: usize) -> f64 {
    (0.6 + 0.1 * hits as f64).min(0.95)
}

/// Stateless keyword/shape classifier. Never fails — it has no backend
/// to be unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    /// Construct the classifier.
    pub fn new() -> Self {
        Self
    }

    /// Classify free text without the async trait ceremony — used both
    /// by [`Classifier::classify`] and directly as the deterministic
    /// fallback path another classifier can delegate to.
    pub fn classify_text(&self, function_id: &str, text: &str) -> Classification {
        let haystack = format!("{function_id} {text}").to_lowercase();

        let human_hits = count_hits(&haystack, HUMAN_KEYWORDS);
        let agentic_hits = count_hits(&haystack, AGENTIC_KEYWORDS);
        let generative_hits = count_hits(&haystack, GENERATIVE_KEYWORDS);

        let candidates = [
            (Tier::Human, human_hits),
            (Tier::Agentic, agentic_hits),
            (Tier::Generative, generative_hits),
        ];

        match candidates.iter().max_by_key(|(_, hits)| *hits) {
            Some((tier, hits)) if *hits > 0 => Classification {
                r#type: *tier,
                confidence: confidence_for_hits(*hits),
                reasoning: format!("matched {hits} {tier}-tier keyword(s) in id/description"),
            },
            _ => Classification {
                r#type: Tier::Code,
                confidence: 0.9,
                reasoning: "no tier-indicating keywords found; defaulting to code".into(),
            },
        }
    }
}

#[async_trait]
impl Classifier for HeuristicClassifier {
    async fn classify(&self, request: &ClassifyRequest) -> Result<Classification, ClassifierError> {
        let text = request.description.clone().unwrap_or_default();
        Ok(self.classify_text(&request.function_id, &text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn detects_human_keyword() {
        let c = HeuristicClassifier::new();
        let out = c
            .classify(&ClassifyRequest {
                function_id: "expense-approval".into(),
                description: Some("requires manual review before payout".into()),
                input_schema: None,
            })
            .await
            .unwrap();
        assert_eq!(out.r#type, Tier::Human);
        assert!(out.confidence >= 0.6);
    }

    #[tokio::test]
    async fn detects_agentic_keyword() {
        let c = HeuristicClassifier::new();
        let out = c
            .classify(&ClassifyRequest {
                function_id: "travel-planner".into(),
                description: Some("autonomous agent that plans a multi-step itinerary".into()),
                input_schema: None,
            })
            .await
            .unwrap();
        assert_eq!(out.r#type, Tier::Agentic);
    }

    #[tokio::test]
    async fn defaults_to_code_with_no_signal() {
        let c = HeuristicClassifier::new();
        let out = c
            .classify(&ClassifyRequest {
                function_id: "sum".into(),
                description: Some("adds two numbers".into()),
                input_schema: None,
            })
            .await
            .unwrap();
        assert_eq!(out.r#type, Tier::Code);
    }

    #[tokio::test]
    async fn picks_the_strongest_signal_when_multiple_match() {
        let c = HeuristicClassifier::new();
        let out = c
            .classify(&ClassifyRequest {
                function_id: "draft-and-approve".into(),
                description: Some(
                    "draft a summary then requires manual review and approval and sign-off"
                        .into(),
                ),
                input_schema: None,
            })
            .await
            .unwrap();
        assert_eq!(out.r#type, Tier::Human);
    }
}
