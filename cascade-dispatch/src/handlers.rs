//! Deterministic tier handler test doubles.
//!
//! The concrete sandbox, model-provider, and human-task-queue
//! integrations a real deployment would plug in here are named as
//! external collaborators, out of scope per spec §1 — this module ships
//! only the trait boundary's test doubles, the same way `layer0`'s
//! `test_utils::EchoOperator`/`EchoTurn` stand in for a real operator.

use async_trait::async_trait;
use cascade_protocol::dispatch::{TierHandler, TierResponse};
use cascade_protocol::metadata::FunctionMetadata;
use cascade_protocol::DispatchError;
use serde_json::Value;

/// A closure-backed [`TierHandler`], for composing ad-hoc test doubles
/// without a dedicated struct per scenario.
pub struct FnTierHandler<F>
where
    F: Fn(&FunctionMetadata, &Value, Option<&Value>) -> Result<TierResponse, DispatchError>
        + Send
        + Sync,
{
    f: F,
}

impl<F> FnTierHandler<F>
where
    F: Fn(&FunctionMetadata, &Value, Option<&Value>) -> Result<TierResponse, DispatchError>
        + Send
        + Sync,
{
    /// Wrap `f` as a tier handler.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> TierHandler for FnTierHandler<F>
where
    F: Fn(&FunctionMetadata, &Value, Option<&Value>) -> Result<TierResponse, DispatchError>
        + Send
        + Sync,
{
    async fn run(
        &self,
        metadata: &FunctionMetadata,
        input: &Value,
        previous_result: Option<&Value>,
    ) -> Result<TierResponse, DispatchError> {
        (self.f)(metadata, input, previous_result)
    }
}

/// Deterministic `human` tier handler, spec §4.F: "creates an
/// out-of-band task; returns 202 with task handle... does not block."
///
/// The real human-task queue integration is out of scope per spec §1;
/// this double always defers, never resolves the task, and hands back
/// a task id/url shaped the way the worked examples expect.
#[derive(Debug, Default, Clone, Copy)]
pub struct HumanTaskHandler;

impl HumanTaskHandler {
    /// Construct the handler.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TierHandler for HumanTaskHandler {
    async fn run(
        &self,
        metadata: &FunctionMetadata,
        _input: &Value,
        _previous_result: Option<&Value>,
    ) -> Result<TierResponse, DispatchError> {
        let suffix: u32 = rand::random();
        let task_id = format!("task-{}-{suffix:08x}", metadata.id);
        Ok(TierResponse::deferred(serde_json::json!({
            "taskId": task_id,
            "taskUrl": format!("https://tasks.local/{task_id}"),
            "taskStatus": "pending",
            "pendingHumanReview": true,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_protocol::tier::Tier;
    use cascade_protocol::{FunctionId, SemVer};

    fn metadata() -> FunctionMetadata {
        FunctionMetadata {
            id: FunctionId::new("needs-human").unwrap(),
            version: SemVer::parse("1.0.0").unwrap(),
            r#type: Some(Tier::Human),
            name: "needs-human".into(),
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
    async fn human_handler_defers_with_pending_review() {
        let handler = HumanTaskHandler::new();
        let response = handler.run(&metadata(), &serde_json::json!({}), None).await.unwrap();
        assert!(response.is_deferred());
        let out = response.normalize().unwrap();
        assert_eq!(out["pendingHumanReview"], true);
        assert!(out["taskId"].as_str().unwrap().starts_with("task-needs-human-"));
    }
}
