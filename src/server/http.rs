//! Transport-agnostic HTTP chat surface contract.
//!
//! This crate carries no web framework dependency (see `DESIGN.md`), so
//! `health`/`chat` are plain async functions returning a `(status_code,
//! body)` pair. Any framework's handler can call these and forward the
//! result verbatim.

use crate::agent::tool_only::ToolOnlyAgent;
use serde_json::{json, Value};

#[derive(Debug, Clone)]
pub struct AgentRuntimeConfig {
    pub provider: String,
    pub model: String,
    pub api_key_present: bool,
}

fn default_provider() -> String {
    std::env::var("HWPX_AGENT_PROVIDER").unwrap_or_else(|_| "cerebras/fp16".to_string())
}

fn default_model() -> String {
    std::env::var("HWPX_AGENT_MODEL").unwrap_or_else(|_| "openai/gpt-oss-120b".to_string())
}

/// `GET /agent/health`, always 200, echoes the resolved runtime defaults.
pub async fn health() -> (u16, Value) {
    (
        200,
        json!({
            "status": "ok",
            "surface": "agent-http",
            "defaults": {
                "provider": default_provider(),
                "model": default_model(),
            },
        }),
    )
}

/// `POST /agent/chat`, runs the tool-only agent over `body["message"]`.
///
/// Validation order: malformed JSON (caller's responsibility to report as
/// 400 before calling this, since `body` is already parsed here), non-object
/// payload, then missing/blank message (422).
pub async fn chat(agent: &ToolOnlyAgent, body: &Value) -> (u16, Value) {
    let Some(payload) = body.as_object() else {
        return (400, json!({"success": false, "error": "invalid_payload"}));
    };

    let message = payload.get("message").and_then(Value::as_str).map(str::trim);
    let Some(message) = message.filter(|m| !m.is_empty()) else {
        return (422, json!({"success": false, "error": "message_required"}));
    };

    let session_id = payload
        .get("session_id")
        .and_then(Value::as_str)
        .unwrap_or("");

    let runtime = extract_runtime_config(payload);
    let result = agent.run(message, Some(session_id)).await;

    let mut response = serde_json::to_value(&result).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut response {
        map.insert(
            "runtime".to_string(),
            json!({
                "provider": runtime.provider,
                "model": runtime.model,
                "api_key_present": runtime.api_key_present,
            }),
        );
    }
    (200, response)
}

fn extract_runtime_config(payload: &serde_json::Map<String, Value>) -> AgentRuntimeConfig {
    let runtime = payload.get("runtime").and_then(Value::as_object);

    let provider = runtime
        .and_then(|r| r.get("provider"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(default_provider);

    let model = runtime
        .and_then(|r| r.get("model"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(default_model);

    let api_key_present = runtime
        .and_then(|r| r.get("api_key"))
        .and_then(Value::as_str)
        .map(|s| !s.trim().is_empty())
        .unwrap_or(false);

    AgentRuntimeConfig {
        provider,
        model,
        api_key_present,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::facade::Gateway;
    use crate::gateway::registry::{RawToolDescriptor, ToolProvider};
    use crate::gateway::backend::BackendServer;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct EmptyBackend;

    #[async_trait]
    impl ToolProvider for EmptyBackend {
        async fn list_tools(&self) -> anyhow::Result<Vec<RawToolDescriptor>> {
            Ok(vec![])
        }
    }

    #[async_trait]
    impl BackendServer for EmptyBackend {
        async fn call_tool(&self, _name: &str, _arguments: Value) -> anyhow::Result<Value> {
            Ok(Value::Null)
        }
    }

    fn test_agent() -> ToolOnlyAgent {
        ToolOnlyAgent::new(Gateway::new(Arc::new(EmptyBackend)))
    }

    #[tokio::test]
    async fn health_reports_ok_status_and_defaults() {
        let (status, body) = health().await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn chat_rejects_blank_message_with_422() {
        let agent = test_agent();
        let (status, body) = chat(&agent, &json!({"message": "   "})).await;
        assert_eq!(status, 422);
        assert_eq!(body["error"], "message_required");
    }

    #[tokio::test]
    async fn chat_rejects_missing_message_with_422() {
        let agent = test_agent();
        let (status, body) = chat(&agent, &json!({"session_id": "abc"})).await;
        assert_eq!(status, 422);
        assert_eq!(body["error"], "message_required");
    }

    #[tokio::test]
    async fn chat_rejects_non_object_payload_with_400() {
        let agent = test_agent();
        let (status, body) = chat(&agent, &json!("not an object")).await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], "invalid_payload");
    }

    #[tokio::test]
    async fn chat_echoes_runtime_defaults_when_not_overridden() {
        let agent = test_agent();
        let (status, body) = chat(&agent, &json!({"message": "상태 확인"})).await;
        assert_eq!(status, 200);
        assert_eq!(body["runtime"]["api_key_present"], false);
    }

    #[tokio::test]
    async fn chat_reports_overridden_runtime_provider_and_model() {
        let agent = test_agent();
        let (_, body) = chat(
            &agent,
            &json!({"message": "ping", "runtime": {"provider": "custom/x", "model": "custom-model", "api_key": "sk-abc"}}),
        )
        .await;
        assert_eq!(body["runtime"]["provider"], "custom/x");
        assert_eq!(body["runtime"]["model"], "custom-model");
        assert_eq!(body["runtime"]["api_key_present"], true);
    }
}
