//! The tier dispatcher protocol — component F.

use crate::error::DispatchError;
use crate::metadata::FunctionMetadata;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Raw status/body pair a tier handler returns, mirroring HTTP
/// semantics per spec §4.F (`>= 400` is failure, `202` is deferred).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierResponse {
    /// HTTP-shaped status code.
    pub status: u16,
    /// Response body. A `generative`/`code` success wraps its payload
    /// in `body.output`; the dispatcher unwraps it (spec §4.F).
    pub body: serde_json::Value,
}

impl TierResponse {
    /// Build a 200 response wrapping `output` in `{"output": ...}`.
    pub fn ok(output: serde_json::Value) -> Self {
        Self {
            status: 200,
            body: serde_json::json!({ "output": output }),
        }
    }

    /// Build a 202 deferred response (the `human` tier's shape).
    pub fn deferred(body: serde_json::Value) -> Self {
        Self { status: 202, body }
    }

    /// Build a failure response carrying an error message.
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: serde_json::json!({ "error": { "message": message.into() } }),
        }
    }

    /// True when `status` indicates failure (`>= 400`).
    pub fn is_failure(&self) -> bool {
        self.status >= 400
    }

    /// True when `status` indicates a deferred task (`202`).
    pub fn is_deferred(&self) -> bool {
        self.status == 202
    }

    /// Normalize this response the way spec §4.F's dispatcher does:
    /// unwrap `body.output` on success, or surface the body's error
    /// message as a [`DispatchError`] on failure.
    pub fn normalize(self) -> Result<serde_json::Value, DispatchError> {
        if self.is_failure() {
            let message = self
                .body
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("tier execution failed")
                .to_string();
            return Err(DispatchError::ExecutionFailed(message));
        }
        if self.is_deferred() {
            return Ok(self.body);
        }
        Ok(self.body.get("output").cloned().unwrap_or(self.body))
    }
}

/// One tier's executor. Implementations: a code sandbox, a model
/// provider call, an agentic loop, a human-task queue (all named as
/// external collaborators, out of scope per spec §1) — and, in this
/// repo, deterministic test doubles (`cascade-dispatch::FnTierHandler`).
#[async_trait]
pub trait TierHandler: Send + Sync {
    /// Run this tier against `input` for `metadata`, optionally given
    /// the previous tier's result as fallback context (spec §4.G 3e).
    async fn run(
        &self,
        metadata: &FunctionMetadata,
        input: &serde_json::Value,
        previous_result: Option<&serde_json::Value>,
    ) -> Result<TierResponse, DispatchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_response_unwraps_output() {
        let resp = TierResponse::ok(serde_json::json!({"answer": 5}));
        let out = resp.normalize().unwrap();
        assert_eq!(out["answer"], 5);
    }

    #[test]
    fn deferred_response_passes_body_through() {
        let resp = TierResponse::deferred(serde_json::json!({"taskId": "t1", "pendingHumanReview": true}));
        let out = resp.normalize().unwrap();
        assert_eq!(out["taskId"], "t1");
    }

    #[test]
    fn failure_response_becomes_dispatch_error() {
        let resp = TierResponse::error(500, "boom");
        let err = resp.normalize().unwrap_err();
        assert!(matches!(err, DispatchError::ExecutionFailed(m) if m == "boom"));
    }
}
