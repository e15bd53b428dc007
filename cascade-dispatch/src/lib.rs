//! # cascade-dispatch — tier dispatcher and test-double tier handlers
//!
//! Implements component F: `dispatch` normalizes whatever a
//! [`TierHandler`] returns into the dispatcher's contract (spec §4.F),
//! and this crate ships the deterministic test doubles the concrete
//! sandbox/model-provider/human-task-queue integrations (all named out
//! of scope per spec §1) are represented by at this layer.

#![deny(missing_docs)]

mod handlers;

pub use handlers::{FnTierHandler, HumanTaskHandler};

use cascade_protocol::dispatch::{TierHandler, TierResponse};
use cascade_protocol::metadata::FunctionMetadata;
use cascade_protocol::DispatchError;
use serde_json::Value;

/// Run `handler` against `metadata`/`input` and normalize its result the
/// way spec §4.F's dispatcher does: unwrap `body.output` on success, or
/// surface the body's error message as a [`DispatchError`] on failure.
///
/// `previous_result` carries the last attempt's output forward when the
/// cascade's `enableFallback` option is set (spec §4.G step 3e).
pub async fn dispatch(
    handler: &dyn TierHandler,
    metadata: &FunctionMetadata,
    input: &Value,
    previous_result: Option<&Value>,
) -> Result<Value, DispatchError> {
    let response: TierResponse = handler.run(metadata, input, previous_result).await?;
    response.normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_protocol::dispatch::TierResponse;
    use cascade_protocol::tier::Tier;
    use cascade_protocol::{FunctionId, SemVer};
    use serde_json::json;

    fn metadata() -> FunctionMetadata {
        FunctionMetadata {
            id: FunctionId::new("sum").unwrap(),
            version: SemVer::parse("1.0.0").unwrap(),
            r#type: Some(Tier::Code),
            name: "sum".into(),
            description: None,
            language: None,
            entry_point: None,
            dependencies: Default::default(),
            input_schema: None,
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

    #[tokio::test]
    async fn dispatch_unwraps_successful_output() {
        let handler = FnTierHandler::new(|_meta, input, _prev| {
            let a = input["a"].as_i64().unwrap_or(0);
            let b = input["b"].as_i64().unwrap_or(0);
            Ok(TierResponse::ok(json!({"answer": a + b})))
        });
        let out = dispatch(&handler, &metadata(), &json!({"a": 2, "b": 3}), None)
            .await
            .unwrap();
        assert_eq!(out["answer"], 5);
    }

    #[tokio::test]
    async fn dispatch_surfaces_failure_as_dispatch_error() {
        let handler = FnTierHandler::new(|_meta, _input, _prev| {
            Ok(TierResponse::error(500, "sandbox crashed"))
        });
        let err = dispatch(&handler, &metadata(), &json!({}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::ExecutionFailed(m) if m == "sandbox crashed"));
    }
}
