//! Shared state threaded through the tool-only agent's nodes.
//!
//! Grounded on `original_source/hwpx_mcp/agentic/tool_only_agent.py`'s
//! `AgentState` `TypedDict`. Rust has no equivalent of a `total=False` dict,
//! so every optional field becomes an `Option`.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Case {
    WindowsComFull,
    CrossPlatformHwpx,
    TemplateWorkflow,
    QueryAnalyzeOnly,
    NoDocumentContext,
    DegradedRecovery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Status,
    Capabilities,
    Template,
    Create,
    InsertText,
    Save,
    ExportPdf,
    Search,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Subagent {
    StatusAgent,
    TemplateAgent,
    DocumentAgent,
    ExportAgent,
    SearchAgent,
    RecoveryAgent,
}

/// Accumulates as the FSM advances from `prepare` through `finalize`.
#[derive(Debug, Clone, Default)]
pub struct AgentState {
    pub message: String,
    pub session_id: String,
    pub tools_by_name: HashMap<String, String>,
    pub case: Option<Case>,
    pub intent: Option<Intent>,
    pub subagent: Option<Subagent>,
    pub selected_tool_name: Option<String>,
    pub selected_tool_id: Option<String>,
    pub arguments: Value,
    pub tool_result: Option<Value>,
    pub reply: Option<String>,
    pub error: Option<String>,
}

impl AgentState {
    pub fn new(message: String, session_id: String) -> Self {
        Self {
            message,
            session_id,
            arguments: Value::Object(Default::default()),
            ..Default::default()
        }
    }
}

/// What `ToolOnlyAgent::run` returns.
#[derive(Debug, Clone, Serialize)]
pub struct AgentRunResult {
    pub success: bool,
    pub case: Case,
    pub intent: Intent,
    pub subagent: Subagent,
    pub selected_tool: Option<String>,
    pub arguments: Value,
    pub reply: String,
    pub result: Option<Value>,
    pub error: Option<String>,
}
