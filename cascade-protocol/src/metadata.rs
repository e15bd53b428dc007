//! Function metadata (spec §3 "Function metadata") and stored-code shapes.

use crate::id::FunctionId;
use crate::semver::SemVer;
use crate::tier::Tier;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A semver range string for a dependency, stored/echoed but never
/// resolved by this core (dependency resolution is a concrete-sandbox
/// concern, out of scope per spec §1).
pub type SemverRange = String;

/// Declared shape of a function's input or output, validated by
/// `cascade-validate` (component I).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonSchema(pub serde_json::Value);

/// Metadata describing one deployed function, spec §3.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionMetadata {
    /// The function's identifier.
    pub id: FunctionId,
    /// The version of this metadata snapshot.
    pub version: SemVer,
    /// Starting tier; `None` triggers classification (spec §4.E).
    #[serde(rename = "type")]
    pub r#type: Option<Tier>,
    /// Human-readable name.
    pub name: String,
    /// Human-readable description, used for classification when no
    /// system/user prompt or goal is present.
    pub description: Option<String>,
    /// Source language for the `code` tier (e.g. `javascript`, `python`).
    pub language: Option<String>,
    /// Entry point within the source (e.g. `index.handler`).
    pub entry_point: Option<String>,
    /// Declared dependencies, name to semver range.
    #[serde(default)]
    pub dependencies: HashMap<String, SemverRange>,
    /// Declared input schema, validated by component I.
    pub input_schema: Option<JsonSchema>,
    /// Declared output schema.
    pub output_schema: Option<JsonSchema>,
    /// Free-form tags for search/filtering.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Scopes this function's caller is assumed to need; informational,
    /// distinct from the global tier-scope registry in component H.
    #[serde(default)]
    pub permissions: Vec<String>,
    /// System prompt for the `generative`/`agentic` tiers.
    pub system_prompt: Option<String>,
    /// User prompt template for the `generative` tier.
    pub user_prompt: Option<String>,
    /// Goal statement for the `agentic` tier.
    pub goal: Option<String>,
    /// Immutable creation timestamp (epoch milliseconds).
    pub created_at: i64,
    /// Last-modified timestamp, bumped on every `putMetadata` (epoch ms).
    pub updated_at: i64,
}

impl FunctionMetadata {
    /// The description used for classification: user prompt, then goal,
    /// then system prompt, then the plain `description` field, in that
    /// priority order (spec §4.E).
    pub fn classification_text(&self) -> Option<&str> {
        self.user_prompt
            .as_deref()
            .or(self.goal.as_deref())
            .or(self.system_prompt.as_deref())
            .or(self.description.as_deref())
    }
}

/// One of the three derivative kinds a stored code object can be.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivativeKind {
    /// The original source text.
    Source,
    /// A pre-compiled derivative (e.g. transpiled/bundled JS).
    Compiled,
    /// A WASM binary.
    Wasm,
    /// A source map for the compiled derivative.
    SourceMap,
}

impl std::fmt::Display for DerivativeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DerivativeKind::Source => "source",
            DerivativeKind::Compiled => "compiled",
            DerivativeKind::Wasm => "wasm",
            DerivativeKind::SourceMap => "source_map",
        };
        write!(f, "{s}")
    }
}

/// A deployment history entry appended on every `putMetadata` call
/// (spec §4.B), including synthetic entries produced by rollback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// The version this deployment wrote or re-pointed to.
    pub version: SemVer,
    /// When this deployment record was appended (epoch ms).
    pub deployed_at: i64,
    /// True for a synthetic record written by `rollback`, not a real deploy.
    #[serde(default)]
    pub is_rollback: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_canonical_order_ranks() {
        assert_eq!(Tier::Code.rank(), 0);
        assert_eq!(Tier::Generative.rank(), 1);
        assert_eq!(Tier::Agentic.rank(), 2);
        assert_eq!(Tier::Human.rank(), 3);
    }

    #[test]
    fn code_tier_requires_no_scope() {
        assert_eq!(Tier::Code.required_scope(), None);
        assert_eq!(
            Tier::Generative.required_scope(),
            Some("functions:tier:generative")
        );
    }

    #[test]
    fn classification_text_priority() {
        let meta = FunctionMetadata {
            id: FunctionId::new("fn-1").unwrap(),
            version: SemVer::parse("1.0.0").unwrap(),
            r#type: None,
            name: "fn-1".into(),
            description: Some("a description".into()),
            language: None,
            entry_point: None,
            dependencies: HashMap::new(),
            input_schema: None,
            output_schema: None,
            tags: vec![],
            permissions: vec![],
            system_prompt: Some("system".into()),
            user_prompt: Some("user".into()),
            goal: Some("goal".into()),
            created_at: 0,
            updated_at: 0,
        };
        assert_eq!(meta.classification_text(), Some("user"));
    }

    #[test]
    fn tier_serializes_snake_case() {
        let json = serde_json::to_string(&Tier::Generative).unwrap();
        assert_eq!(json, "\"generative\"");
    }
}
