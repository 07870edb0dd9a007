//! Core data model: `ToolRecord`, `Group`, `GroupRoute`, `ToolScore`.
//!
//! Grounded on `original_source/hwpx_mcp/agentic/models.py`. `Group` is a
//! closed enum rather than a bare string so every record's group is one of
//! the nine enumerated values at compile time instead of needing a runtime
//! check.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One of the nine coarse functional categories used for two-stage routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Group {
    DocumentLifecycle,
    TextInsertion,
    TableChart,
    FieldMeta,
    FindReplace,
    XmlDirect,
    ExportConvert,
    UtilDebug,
    Other,
}

impl Group {
    pub const ALL: [Group; 9] = [
        Group::DocumentLifecycle,
        Group::TextInsertion,
        Group::TableChart,
        Group::FieldMeta,
        Group::FindReplace,
        Group::XmlDirect,
        Group::ExportConvert,
        Group::UtilDebug,
        Group::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Group::DocumentLifecycle => "document_lifecycle",
            Group::TextInsertion => "text_insertion",
            Group::TableChart => "table_chart",
            Group::FieldMeta => "field_meta",
            Group::FindReplace => "find_replace",
            Group::XmlDirect => "xml_direct",
            Group::ExportConvert => "export_convert",
            Group::UtilDebug => "util_debug",
            Group::Other => "other",
        }
    }

    /// Parse a user-supplied group name, e.g. from `tool_search(group=...)`.
    pub fn parse(name: &str) -> Option<Group> {
        Group::ALL.into_iter().find(|g| g.as_str() == name)
    }
}

impl std::fmt::Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable, fingerprinted tool description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRecord {
    pub tool_id: String,
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub output_schema: Option<Value>,
    pub group: Group,
    pub tags: Vec<String>,
    pub schema_hash: String,
}

impl ToolRecord {
    /// `"{name} {description} {joined_tags}"`, the text blob both
    /// retrievers tokenize against.
    pub fn search_blob(&self) -> String {
        format!("{} {} {}", self.name, self.description, self.tags.join(" "))
    }
}

/// A query's chosen group plus confidence, produced fresh per request.
#[derive(Debug, Clone, Serialize)]
pub struct GroupRoute {
    pub group: Group,
    pub reason: String,
    pub confidence: f64,
}

/// A single scored candidate from a retriever.
#[derive(Debug, Clone, Serialize)]
pub struct ToolScore {
    pub tool_id: String,
    pub score: f64,
    pub reason: ScoreReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreReason {
    Lexical,
    Semantic,
    Hybrid,
}
