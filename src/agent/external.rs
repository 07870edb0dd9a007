//! Optional external-model agent: function-calling round loop over an
//! OpenAI-compatible chat completions endpoint.
//!
//! Grounded on `original_source/hwpx_mcp/agentic/openrouter_agent.py` for
//! the message-array/tool-call round-loop contract (not copied verbatim;
//! the concrete HTTP client is this crate's own, following the `reqwest` +
//! `tokio::time::timeout` pattern used elsewhere in this codebase for
//! bounding a single outbound call).

use crate::agent::intent::{detect_case, parse_intent};
use crate::agent::state::{Case, Intent, Subagent};
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::facade::Gateway;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;

const CHAT_COMPLETIONS_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const DEFAULT_MODEL: &str = "openai/gpt-oss-120b";
const DEFAULT_PROVIDER: &str = "cerebras/fp16";
const MAX_ROUNDS: u32 = 8;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

fn subagent_for(intent: Intent, case: Case) -> Subagent {
    if matches!(intent, Intent::Status | Intent::Capabilities) {
        Subagent::StatusAgent
    } else if intent == Intent::Template || case == Case::TemplateWorkflow {
        Subagent::TemplateAgent
    } else if intent == Intent::ExportPdf {
        Subagent::ExportAgent
    } else if intent == Intent::Search {
        Subagent::SearchAgent
    } else if matches!(intent, Intent::Create | Intent::InsertText | Intent::Save) {
        Subagent::DocumentAgent
    } else {
        Subagent::RecoveryAgent
    }
}

fn tool_allowlist(subagent: Subagent, intent: Intent) -> Vec<&'static str> {
    match subagent {
        Subagent::StatusAgent => {
            if intent == Intent::Capabilities {
                vec!["hwp_capabilities", "hwp_get_capabilities", "hwp_platform_info"]
            } else {
                vec!["hwp_ping", "hwp_platform_info", "hwp_capabilities"]
            }
        }
        Subagent::TemplateAgent => vec!["hwp_list_templates", "hwp_search_template"],
        Subagent::DocumentAgent => vec![
            "hwp_create_hwpx",
            "hwp_create",
            "hwp_insert_text",
            "hwp_windows_insert_text",
            "hwp_save",
            "hwp_save_document",
        ],
        Subagent::ExportAgent => vec!["hwp_export_pdf", "hwp_save_as"],
        Subagent::SearchAgent => vec!["hwp_find", "hwp_search_text"],
        Subagent::RecoveryAgent => vec![],
    }
}

fn base_system_prompt() -> &'static str {
    "You are an agentic document assistant. You help users create and edit \
     documents through tool calls.\nYou have access to tools for document \
     operations.\nWhen you need to perform an action, call the appropriate \
     tool.\nAlways respond in the same language as the user's message.\n\
     When showing tool results, explain them clearly and concisely.\n"
}

fn subagent_system_prompt(subagent: Subagent) -> &'static str {
    match subagent {
        Subagent::StatusAgent => {
            "Focus: backend status and capabilities. Use status/capabilities tools when needed.\nKeep replies short.\n"
        }
        Subagent::TemplateAgent => {
            "Focus: templates. Prefer listing/searching templates using available tools.\n\
             If the user asks for a specific template, search by keywords and summarize results.\n"
        }
        Subagent::DocumentAgent => {
            "Focus: creating or editing documents. Use create/insert/save tools as needed.\n\
             If the user provides text in quotes, treat it as the exact content to insert or use.\n\
             When multiple tool calls are needed, do them step-by-step.\n"
        }
        Subagent::ExportAgent => {
            "Focus: exporting documents (e.g., PDF). Use export tools.\n\
             If an output path is required, choose a reasonable default and report it.\n"
        }
        Subagent::SearchAgent => {
            "Focus: searching within the current document. Use search tools.\n\
             If the keyword is missing or unclear, ask the user for the exact keyword.\n"
        }
        Subagent::RecoveryAgent => {
            "If you cannot route confidently, ask one precise clarifying question.\nDo not hallucinate tool results.\n"
        }
    }
}

fn tool_definition(record: &crate::gateway::models::ToolRecord) -> Value {
    let parameters = if record.input_schema.is_object() && record.input_schema.as_object().map(|m| !m.is_empty()).unwrap_or(false) {
        record.input_schema.clone()
    } else {
        json!({"type": "object", "properties": {}})
    };
    json!({
        "type": "function",
        "function": {
            "name": record.name,
            "description": record.description,
            "parameters": parameters,
        },
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolCallOutcome {
    pub tool_call_id: String,
    pub name: String,
    pub arguments: Value,
    pub result: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExternalAgentRunResult {
    pub success: bool,
    pub case: Case,
    pub intent: Intent,
    pub subagent: Subagent,
    pub selected_tool: Option<String>,
    pub arguments: Value,
    pub reply: String,
    pub result: Vec<ToolCallOutcome>,
    pub error: Option<String>,
}

struct ExtractedToolCall {
    tool_call_id: String,
    name: String,
    arguments: Value,
}

/// Runtime knobs read from the environment.
#[derive(Debug, Clone)]
pub struct ExternalAgentConfig {
    pub model: String,
    pub provider: String,
    pub api_key: Option<String>,
}

impl ExternalAgentConfig {
    pub fn from_env() -> Self {
        Self {
            model: std::env::var("HWPX_AGENT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            provider: std::env::var("HWPX_AGENT_PROVIDER").unwrap_or_else(|_| DEFAULT_PROVIDER.to_string()),
            api_key: std::env::var("OPENROUTER_API_KEY").ok(),
        }
    }
}

pub struct ExternalModelAgent {
    gateway: Gateway,
    http: reqwest::Client,
    config: ExternalAgentConfig,
}

impl ExternalModelAgent {
    pub fn new(gateway: Gateway, config: ExternalAgentConfig) -> Self {
        Self {
            gateway,
            http: reqwest::Client::new(),
            config,
        }
    }

    pub async fn run(&self, message: &str, session_id: &str) -> GatewayResult<ExternalAgentRunResult> {
        let api_key = self
            .config
            .api_key
            .clone()
            .ok_or_else(|| GatewayError::Config("OPENROUTER_API_KEY is not set".to_string()))?;

        self.gateway.refresh_registry().await?;
        let records = self.gateway.all_tools().await?;
        let tool_names: HashSet<String> = records.iter().map(|r| r.name.clone()).collect();

        let intent = parse_intent(message);
        let case = detect_case(message, &tool_names);
        let subagent = subagent_for(intent, case);

        let allowlist = tool_allowlist(subagent, intent);
        let tool_defs: Vec<Value> = allowlist
            .iter()
            .filter_map(|name| records.iter().find(|r| &r.name == name))
            .map(tool_definition)
            .collect();

        let mut messages = vec![
            json!({
                "role": "system",
                "content": format!("{}\n{}", base_system_prompt(), subagent_system_prompt(subagent)),
            }),
            json!({"role": "user", "content": message}),
        ];

        let mut tool_call_results = Vec::new();
        let mut last_tool_name: Option<String> = None;
        let mut last_arguments = Value::Object(Default::default());

        for _round in 0..MAX_ROUNDS {
            let response = self
                .chat_completions(&api_key, &messages, &tool_defs)
                .await?;
            let choice = first_choice(&response);
            let Some(assistant_message) = choice.get("message").cloned() else {
                return Ok(ExternalAgentRunResult {
                    success: false,
                    case,
                    intent,
                    subagent,
                    selected_tool: None,
                    arguments: Value::Object(Default::default()),
                    reply: "모델 응답을 파싱하지 못했습니다.".to_string(),
                    result: Vec::new(),
                    error: Some("invalid_model_response".to_string()),
                });
            };

            let finish_reason = choice.get("finish_reason").and_then(Value::as_str);
            let tool_calls = extract_tool_calls(&assistant_message);

            if finish_reason == Some("tool_calls") && !tool_calls.is_empty() {
                messages.push(assistant_message);
                for call in tool_calls {
                    last_tool_name = Some(call.name.clone());
                    last_arguments = call.arguments.clone();
                    let result = self.call_tool_by_name(&records, &call.name, call.arguments.clone()).await;
                    messages.push(json!({
                        "role": "tool",
                        "tool_call_id": call.tool_call_id,
                        "content": result.to_string(),
                    }));
                    tool_call_results.push(ToolCallOutcome {
                        tool_call_id: call.tool_call_id,
                        name: call.name,
                        arguments: call.arguments,
                        result,
                    });
                }
                continue;
            }

            let reply = assistant_message
                .get("content")
                .and_then(Value::as_str)
                .filter(|c| !c.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| "(no response)".to_string());

            return Ok(ExternalAgentRunResult {
                success: true,
                case,
                intent,
                subagent,
                selected_tool: last_tool_name,
                arguments: last_arguments,
                reply,
                result: tool_call_results,
                error: None,
            });
        }

        Ok(ExternalAgentRunResult {
            success: false,
            case,
            intent,
            subagent,
            selected_tool: last_tool_name,
            arguments: last_arguments,
            reply: "도구 호출 루프가 너무 오래 지속되었습니다.".to_string(),
            result: tool_call_results,
            error: Some("max_rounds_exceeded".to_string()),
        })
    }

    async fn chat_completions(&self, api_key: &str, messages: &[Value], tools: &[Value]) -> GatewayResult<Value> {
        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
            "stream": false,
            "provider": {
                "order": [self.config.provider],
                "quantizations": [self.config.provider.split('/').nth(1).unwrap_or("fp16")],
            },
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.to_vec());
            body["tool_choice"] = Value::String("auto".to_string());
        }

        let request = self
            .http
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(api_key)
            .header("HTTP-Referer", "https://toolgate.local")
            .header("X-Title", "toolgate")
            .json(&body);

        let response = tokio::time::timeout(REQUEST_TIMEOUT, request.send())
            .await
            .map_err(|_| GatewayError::ModelProtocol("chat completions request timed out".to_string()))?
            .map_err(|err| GatewayError::ModelProtocol(format!("chat completions request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(GatewayError::ModelProtocol(format!(
                "openrouter_error: {status}: {}",
                &body_text[..body_text.len().min(300)]
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|err| GatewayError::ModelProtocol(format!("invalid JSON from model: {err}")))
    }

    async fn call_tool_by_name(&self, records: &[crate::gateway::models::ToolRecord], name: &str, arguments: Value) -> Value {
        let Some(record) = records.iter().find(|r| r.name == name) else {
            return json!({"success": false, "message": format!("tool_not_found: {name}")});
        };
        match self.gateway.tool_call(&record.tool_id, arguments).await {
            Ok(response) if response.success => response.result.unwrap_or(Value::Null),
            Ok(response) => json!({
                "success": false,
                "message": response.message.unwrap_or_else(|| "tool_call_failed".to_string()),
            }),
            Err(err) => json!({"success": false, "message": err.to_string()}),
        }
    }
}

fn first_choice(payload: &Value) -> Value {
    payload
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .cloned()
        .unwrap_or(Value::Null)
}

#[derive(Deserialize)]
struct RawFunctionCall {
    name: String,
    arguments: Option<Value>,
}

#[derive(Deserialize)]
struct RawToolCall {
    id: String,
    function: RawFunctionCall,
}

fn extract_tool_calls(message: &Value) -> Vec<ExtractedToolCall> {
    let Some(raw) = message.get("tool_calls").and_then(Value::as_array) else {
        return Vec::new();
    };

    raw.iter()
        .filter_map(|item| serde_json::from_value::<RawToolCall>(item.clone()).ok())
        .map(|call| {
            let arguments = match call.function.arguments {
                Some(Value::String(s)) if !s.trim().is_empty() => {
                    serde_json::from_str(&s).unwrap_or_else(|_| Value::Object(Default::default()))
                }
                Some(v @ Value::Object(_)) => v,
                _ => Value::Object(Default::default()),
            };
            ExtractedToolCall {
                tool_call_id: call.id,
                name: call.function.name,
                arguments,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subagent_for_routes_status_before_other_intents() {
        assert_eq!(subagent_for(Intent::Status, Case::DegradedRecovery), Subagent::StatusAgent);
    }

    #[test]
    fn tool_allowlist_is_empty_for_recovery_agent() {
        assert!(tool_allowlist(Subagent::RecoveryAgent, Intent::Unknown).is_empty());
    }

    #[test]
    fn extract_tool_calls_parses_stringified_arguments() {
        let message = json!({
            "tool_calls": [{
                "id": "call_1",
                "function": {"name": "hwp_ping", "arguments": "{\"a\":1}"}
            }]
        });
        let calls = extract_tool_calls(&message);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "hwp_ping");
        assert_eq!(calls[0].arguments, json!({"a": 1}));
    }

    #[test]
    fn extract_tool_calls_returns_empty_for_plain_message() {
        let message = json!({"role": "assistant", "content": "hello"});
        assert!(extract_tool_calls(&message).is_empty());
    }

    #[test]
    fn extract_tool_calls_defaults_to_empty_object_on_malformed_json() {
        let message = json!({
            "tool_calls": [{"id": "call_2", "function": {"name": "hwp_find", "arguments": "{not json"}}]
        });
        let calls = extract_tool_calls(&message);
        assert_eq!(calls[0].arguments, json!({}));
    }
}
