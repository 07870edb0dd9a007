//! The deterministic tool-only agent.
//!
//! Grounded on `tool_only_agent.py`'s `ToolOnlyAgent`. The original drives a
//! `langgraph` `StateGraph`; this version replaces that with a plain `Node`
//! enum matched in a loop, since no graph-workflow crate is part of this
//! dependency stack. The control flow is the same fixed pipeline (`prepare
//! -> classify -> route -> <subagent> -> finalize`), it just doesn't need a
//! graph library to express it. The Python original also tries an
//! in-process "direct callable" for the tool before falling back to the
//! gateway; that shortcut only exists because the Python backend can be
//! embedded in the same interpreter. This backend is always a separate
//! process reached through `BackendServer`, so every call goes through
//! `Gateway::tool_call`.

use crate::agent::intent::{detect_case, extract_quoted_text, last_meaningful_token, parse_intent};
use crate::agent::state::{AgentRunResult, AgentState, Case, Intent, Subagent};
use crate::gateway::facade::Gateway;
use serde_json::{json, Value};
use std::collections::HashSet;

enum Node {
    Prepare,
    Classify,
    Route,
    Dispatch(Subagent),
    Finalize,
    Done,
}

pub struct ToolOnlyAgent {
    gateway: Gateway,
}

impl ToolOnlyAgent {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    pub async fn run(&self, message: &str, session_id: Option<&str>) -> AgentRunResult {
        let mut state = AgentState::new(message.trim().to_string(), session_id.unwrap_or("").trim().to_string());
        let mut node = Node::Prepare;

        loop {
            node = match node {
                Node::Prepare => {
                    self.node_prepare(&mut state).await;
                    Node::Classify
                }
                Node::Classify => {
                    self.node_classify(&mut state);
                    Node::Route
                }
                Node::Route => {
                    let subagent = self.node_route(&state);
                    state.subagent = Some(subagent);
                    Node::Dispatch(subagent)
                }
                Node::Dispatch(subagent) => {
                    match subagent {
                        Subagent::StatusAgent => self.status_agent(&mut state).await,
                        Subagent::TemplateAgent => self.template_agent(&mut state).await,
                        Subagent::DocumentAgent => self.document_agent(&mut state).await,
                        Subagent::ExportAgent => self.export_agent(&mut state).await,
                        Subagent::SearchAgent => self.search_agent(&mut state).await,
                        Subagent::RecoveryAgent => self.recovery_agent(&mut state),
                    }
                    Node::Finalize
                }
                Node::Finalize => {
                    self.node_finalize(&mut state);
                    Node::Done
                }
                Node::Done => break,
            };
        }

        AgentRunResult {
            success: state.error.is_none(),
            case: state.case.unwrap_or(Case::DegradedRecovery),
            intent: state.intent.unwrap_or(Intent::Unknown),
            subagent: state.subagent.unwrap_or(Subagent::RecoveryAgent),
            selected_tool: state.selected_tool_name,
            arguments: state.arguments,
            reply: state.reply.unwrap_or_else(|| "요청을 처리하지 못했습니다.".to_string()),
            result: state.tool_result,
            error: state.error,
        }
    }

    async fn node_prepare(&self, state: &mut AgentState) {
        let _ = self.gateway.refresh_registry().await;
        // Best-effort refresh: a stale-but-non-empty registry from a prior
        // call is still usable if the backend is momentarily unreachable.
        state.tools_by_name = self.tools_by_name().await;
    }

    async fn tools_by_name(&self) -> std::collections::HashMap<String, String> {
        let mut map = std::collections::HashMap::new();
        if let Ok(records) = self.gateway.all_tools().await {
            for record in records {
                map.insert(record.name, record.tool_id);
            }
        }
        map
    }

    fn node_classify(&self, state: &mut AgentState) {
        let tool_names: HashSet<String> = state.tools_by_name.keys().cloned().collect();
        state.case = Some(detect_case(&state.message, &tool_names));
        state.intent = Some(parse_intent(&state.message));
    }

    fn node_route(&self, state: &AgentState) -> Subagent {
        let intent = state.intent.unwrap_or(Intent::Unknown);
        let case = state.case.unwrap_or(Case::DegradedRecovery);

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

    async fn status_agent(&self, state: &mut AgentState) {
        let preferred = if state.intent == Some(Intent::Capabilities) {
            vec!["hwp_capabilities", "hwp_get_capabilities", "hwp_platform_info"]
        } else {
            vec!["hwp_ping", "hwp_platform_info", "hwp_capabilities"]
        };
        self.call_first_available(state, &preferred, json!({})).await;
    }

    async fn template_agent(&self, state: &mut AgentState) {
        self.call_first_available(state, &["hwp_list_templates", "hwp_search_template"], json!({}))
            .await;
    }

    async fn document_agent(&self, state: &mut AgentState) {
        let intent = state.intent.unwrap_or(Intent::Unknown);
        let text_payload = extract_quoted_text(&state.message);

        match intent {
            Intent::Create => {
                if let Some(text) = text_payload {
                    let args = json!({"text": text, "filename": "agent_output.hwpx"});
                    self.call_first_available(state, &["hwp_create_hwpx"], args).await;
                } else {
                    self.call_first_available(state, &["hwp_create"], json!({})).await;
                }
            }
            Intent::Save => {
                let output_path = std::env::current_dir()
                    .map(|dir| dir.join("agent_output.hwpx").to_string_lossy().into_owned())
                    .unwrap_or_else(|_| "agent_output.hwpx".to_string());
                let args = json!({"path": output_path});
                self.call_first_available(state, &["hwp_save", "hwp_save_document"], args)
                    .await;
            }
            _ => {
                let insert_text = text_payload.unwrap_or_else(|| state.message.clone());
                let args = json!({"text": insert_text});
                self.call_first_available(state, &["hwp_insert_text", "hwp_windows_insert_text"], args)
                    .await;
            }
        }
    }

    async fn export_agent(&self, state: &mut AgentState) {
        let output_path = std::env::current_dir()
            .map(|dir| dir.join("agent_output.pdf").to_string_lossy().into_owned())
            .unwrap_or_else(|_| "agent_output.pdf".to_string());
        let args = json!({"output_path": output_path, "format": "pdf", "path": output_path});
        self.call_first_available(state, &["hwp_export_pdf", "hwp_save_as"], args).await;
    }

    async fn search_agent(&self, state: &mut AgentState) {
        let keyword = extract_quoted_text(&state.message).or_else(|| last_meaningful_token(&state.message));

        let Some(keyword) = keyword.filter(|k| !k.is_empty()) else {
            state.reply = Some(r#"검색어를 따옴표로 감싸 입력해 주세요. 예: "매출" 찾아줘"#.to_string());
            state.error = Some("missing_search_keyword".to_string());
            return;
        };

        let args = json!({"text": keyword, "query": keyword});
        self.call_first_available(state, &["hwp_find", "hwp_search_text"], args).await;
    }

    fn recovery_agent(&self, state: &mut AgentState) {
        let mut names: Vec<&str> = state.tools_by_name.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        let sample = if names.is_empty() {
            "none".to_string()
        } else {
            names.into_iter().take(10).collect::<Vec<_>>().join(", ")
        };
        state.reply = Some(format!(
            "요청을 직접 실행할 케이스를 찾지 못했습니다. 현재 사용 가능한 툴 예시: {sample}"
        ));
        state.error = Some("no_matching_subagent".to_string());
    }

    fn node_finalize(&self, state: &mut AgentState) {
        if state.reply.is_some() {
            return;
        }
        let Some(tool) = state.selected_tool_name.clone() else {
            state.reply = Some("적절한 툴을 찾지 못했습니다.".to_string());
            state.error = Some("tool_not_selected".to_string());
            return;
        };
        let result = state.tool_result.clone().unwrap_or(Value::Null);
        state.reply = Some(format!("[{tool}] 실행 완료\n{result}"));
    }

    /// Try each candidate name in order; call the first one present in the
    /// registry. Mirrors `_call_first_available`, minus the direct-callable
    /// shortcut (see module docs).
    async fn call_first_available(&self, state: &mut AgentState, candidates: &[&str], candidate_args: Value) {
        for name in candidates {
            let Some(tool_id) = state.tools_by_name.get(*name).cloned() else {
                continue;
            };
            let normalized_args = normalize_arguments(name, &candidate_args);

            match self.gateway.tool_call(&tool_id, normalized_args.clone()).await {
                Ok(response) if response.success => {
                    state.selected_tool_name = Some(name.to_string());
                    state.selected_tool_id = Some(tool_id);
                    state.arguments = normalized_args;
                    state.tool_result = Some(response.result.unwrap_or(Value::Null));
                }
                Ok(response) => {
                    let message = response.message.unwrap_or_else(|| "tool_call_failed".to_string());
                    state.selected_tool_name = Some(name.to_string());
                    state.selected_tool_id = Some(tool_id);
                    state.arguments = normalized_args;
                    state.tool_result = Some(json!({"success": false, "message": message.clone()}));
                    state.error = Some(message);
                }
                Err(err) => {
                    state.selected_tool_name = Some(name.to_string());
                    state.selected_tool_id = Some(tool_id);
                    state.arguments = normalized_args;
                    state.tool_result = Some(json!({"success": false, "message": format!("tool_call_failed: {err}")}));
                    state.error = Some(format!("tool_call_failed: {err}"));
                }
            }
            return;
        }
        state.error = Some("no_available_tool".to_string());
        state.reply = Some("현재 케이스에서 실행 가능한 툴이 없습니다.".to_string());
    }
}

/// Per-tool argument whitelist. Unknown tool names keep only JSON primitive
/// values.
fn normalize_arguments(name: &str, args: &Value) -> Value {
    let get_str = |key: &str| args.get(key).and_then(Value::as_str).map(str::to_string);

    match name {
        "hwp_save" => match get_str("path") {
            Some(path) => json!({"path": path}),
            None => json!({}),
        },
        "hwp_export_pdf" => match get_str("output_path") {
            Some(output_path) => json!({"output_path": output_path}),
            None => json!({}),
        },
        "hwp_save_as" => {
            let path = get_str("path");
            let format = args
                .get("format")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| "pdf".to_string());
            match path {
                Some(path) => json!({"path": path, "format": format}),
                None => json!({}),
            }
        }
        "hwp_insert_text" | "hwp_windows_insert_text" | "hwp_create_hwpx" => match get_str("text") {
            Some(text) => {
                let mut payload = serde_json::Map::new();
                payload.insert("text".to_string(), Value::String(text));
                if let Some(filename) = get_str("filename") {
                    payload.insert("filename".to_string(), Value::String(filename));
                }
                Value::Object(payload)
            }
            None => json!({}),
        },
        "hwp_find" => match get_str("text") {
            Some(text) => json!({"text": text}),
            None => json!({}),
        },
        "hwp_search_text" => match get_str("query") {
            Some(query) => json!({"query": query}),
            None => json!({}),
        },
        _ => {
            let mut payload = serde_json::Map::new();
            if let Value::Object(map) = args {
                for (key, value) in map {
                    if value.is_string() || value.is_number() || value.is_boolean() || value.is_null() {
                        payload.insert(key.clone(), value.clone());
                    }
                }
            }
            Value::Object(payload)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_arguments_whitelists_hwp_save_path_only() {
        let args = json!({"path": "/tmp/out.hwpx", "junk": "drop me"});
        assert_eq!(normalize_arguments("hwp_save", &args), json!({"path": "/tmp/out.hwpx"}));
    }

    #[test]
    fn normalize_arguments_drops_hwp_save_without_path() {
        assert_eq!(normalize_arguments("hwp_save", &json!({})), json!({}));
    }

    #[test]
    fn normalize_arguments_defaults_hwp_save_as_format_to_pdf() {
        let args = json!({"path": "/tmp/out"});
        assert_eq!(
            normalize_arguments("hwp_save_as", &args),
            json!({"path": "/tmp/out", "format": "pdf"})
        );
    }

    #[test]
    fn normalize_arguments_keeps_filename_when_present_for_insert_text() {
        let args = json!({"text": "hello", "filename": "a.hwpx"});
        assert_eq!(
            normalize_arguments("hwp_insert_text", &args),
            json!({"text": "hello", "filename": "a.hwpx"})
        );
    }

    #[test]
    fn normalize_arguments_falls_back_to_primitive_whitelist_for_unknown_tools() {
        let args = json!({"a": "x", "b": 1, "c": {"nested": true}});
        assert_eq!(normalize_arguments("hwp_unknown_tool", &args), json!({"a": "x", "b": 1}));
    }
}
