//! The input validator protocol — component I.
//!
//! A small hand-rolled recursive walker over the deliberately
//! narrow JSON-Schema-like subset (`type`, `properties`, `items`,
//! `required`, `enum`) rather than a full JSON Schema implementation
//! (see `DESIGN.md`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One validation failure, spec §4.I.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Dotted/bracketed path to the offending value, e.g. `items[2].name`.
    pub path: String,
    /// Human-readable description of the failure.
    pub message: String,
}

impl ValidationIssue {
    /// Build an issue at `path`.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating input against a schema, spec §4.I.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// Whether the input satisfies the schema.
    pub valid: bool,
    /// Every accumulated issue (required-field absence, enum
    /// violations). Empty when `valid`.
    pub errors: Vec<ValidationIssue>,
}

impl ValidationOutcome {
    /// A successful, issue-free outcome.
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: vec![],
        }
    }

    /// A failing outcome carrying `errors`.
    pub fn failing(errors: Vec<ValidationIssue>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// The input validator protocol, component I.
///
/// `validate` never fails with an exception for malformed input — it
/// always returns an outcome. A malformed *schema* is the only thing
/// that can raise [`crate::error::ValidationError`], and only the
/// concrete walker (`cascade-validate`) can detect that.
pub trait InputValidator: Send + Sync {
    /// Validate `input` against `schema` (the function's declared
    /// `inputSchema`, a JSON object per spec §4.I).
    fn validate(&self, schema: &Value, input: &Value) -> ValidationOutcome;
}
