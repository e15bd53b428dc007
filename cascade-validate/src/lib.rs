//! # cascade-validate — structural input validation
//!
//! Implements `cascade-protocol`'s [`cascade_protocol::validate::InputValidator`]
//! trait (component I): a small hand-rolled recursive walker over the
//! spec's deliberately narrow JSON-Schema-like subset (`type`,
//! `properties`, `items`, `required`, `enum`) — not the full `jsonschema`
//! crate surface (refs, conditionals, formats), which this spec never asks
//! for (see `DESIGN.md`).

#![deny(missing_docs)]

use cascade_protocol::validate::{InputValidator, ValidationIssue, ValidationOutcome};
use serde_json::Value;

/// The schema walker, spec §4.I.
///
/// Type mismatch halts descent at that node (no point walking into a
/// shape that doesn't match); required-field absences and enum
/// violations accumulate across the whole tree instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct SchemaWalker;

impl SchemaWalker {
    /// Construct a walker.
    pub fn new() -> Self {
        Self
    }

    fn walk(&self, path: &str, schema: &Value, value: &Value, errors: &mut Vec<ValidationIssue>) {
        let Some(schema) = schema.as_object() else {
            return;
        };

        if let Some(ty) = schema.get("type").and_then(Value::as_str) {
            if !type_matches(ty, value) {
                errors.push(ValidationIssue::new(
                    path,
                    format!("expected type {ty}, got {}", type_name(value)),
                ));
                return;
            }
        }

        if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
            if !allowed.contains(value) {
                errors.push(ValidationIssue::new(
                    path,
                    "value is not one of the allowed enum values".to_string(),
                ));
            }
        }

        if let Some(obj) = value.as_object() {
            if let Some(required) = schema.get("required").and_then(Value::as_array) {
                for name in required.iter().filter_map(Value::as_str) {
                    if !obj.contains_key(name) {
                        errors.push(ValidationIssue::new(
                            join_path(path, name),
                            "required field is missing".to_string(),
                        ));
                    }
                }
            }

            if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
                for (name, prop_schema) in properties {
                    if let Some(child) = obj.get(name) {
                        self.walk(&join_path(path, name), prop_schema, child, errors);
                    }
                }
            }
        }

        if let Some(items_schema) = schema.get("items") {
            if let Some(arr) = value.as_array() {
                for (idx, item) in arr.iter().enumerate() {
                    self.walk(&format!("{path}[{idx}]"), items_schema, item, errors);
                }
            }
        }
    }
}

/// Whether `value` satisfies declared schema `type`, applying the
/// spec's documented relaxation: a numeric string coerces cleanly into
/// `type=number`.
fn type_matches(ty: &str, value: &Value) -> bool {
    match ty {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "number" => value.is_number() || value.as_str().is_some_and(|s| s.parse::<f64>().is_ok()),
        "integer" => value.is_i64() || value.is_u64() || value.as_str().is_some_and(|s| s.parse::<i64>().is_ok()),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Object(_) => "object",
        Value::Array(_) => "array",
        Value::String(_) => "string",
        Value::Number(_) => "number",
        Value::Bool(_) => "boolean",
        Value::Null => "null",
    }
}

fn join_path(base: &str, field: &str) -> String {
    if base.is_empty() {
        field.to_string()
    } else {
        format!("{base}.{field}")
    }
}

impl InputValidator for SchemaWalker {
    fn validate(&self, schema: &Value, input: &Value) -> ValidationOutcome {
        let mut errors = Vec::new();
        self.walk("", schema, input, &mut errors);
        ValidationOutcome::failing(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_input_passes() {
        let schema = json!({
            "type": "object",
            "required": ["a", "b"],
            "properties": {
                "a": {"type": "number"},
                "b": {"type": "string"}
            }
        });
        let input = json!({"a": 2, "b": "hi"});
        let out = SchemaWalker::new().validate(&schema, &input);
        assert!(out.valid);
        assert!(out.errors.is_empty());
    }

    #[test]
    fn missing_required_field_accumulates() {
        let schema = json!({
            "type": "object",
            "required": ["a", "b"],
            "properties": {"a": {"type": "number"}, "b": {"type": "string"}}
        });
        let input = json!({});
        let out = SchemaWalker::new().validate(&schema, &input);
        assert!(!out.valid);
        assert_eq!(out.errors.len(), 2);
        assert!(out.errors.iter().any(|e| e.path == "a"));
        assert!(out.errors.iter().any(|e| e.path == "b"));
    }

    #[test]
    fn type_mismatch_halts_descent() {
        let schema = json!({
            "type": "object",
            "properties": {"a": {"type": "string"}}
        });
        // "a" is not even an object — mismatch at the root stops before
        // any property-level errors are generated.
        let input = json!("not an object");
        let out = SchemaWalker::new().validate(&schema, &input);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].path, "");
    }

    #[test]
    fn enum_violation_is_reported() {
        let schema = json!({"type": "string", "enum": ["a", "b"]});
        let out = SchemaWalker::new().validate(&schema, &json!("c"));
        assert!(!out.valid);
    }

    #[test]
    fn numeric_string_satisfies_number_type() {
        let schema = json!({"type": "number"});
        let out = SchemaWalker::new().validate(&schema, &json!("42.5"));
        assert!(out.valid);
    }

    #[test]
    fn array_items_validated_with_bracketed_path() {
        let schema = json!({
            "type": "array",
            "items": {"type": "number"}
        });
        let input = json!([1, "two", 3]);
        let out = SchemaWalker::new().validate(&schema, &input);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].path, "[1]");
    }

    #[test]
    fn nested_object_path_is_dotted() {
        let schema = json!({
            "type": "object",
            "properties": {
                "user": {
                    "type": "object",
                    "required": ["name"]
                }
            }
        });
        let input = json!({"user": {}});
        let out = SchemaWalker::new().validate(&schema, &input);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].path, "user.name");
    }
}
