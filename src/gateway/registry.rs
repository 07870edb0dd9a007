//! Tool fingerprinting and registry construction.
//!
//! Grounded on `original_source/hwpx_mcp/agentic/registry.py`. Converts raw
//! backend tool descriptors into immutable, content-addressed `ToolRecord`s
//! and assembles the sorted registry snapshot the rest of the gateway reads.

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::grouping::classify_group;
use crate::gateway::models::{Group, ToolRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::Path;

/// Raw tool metadata as reported by the backend, before fingerprinting.
#[derive(Debug, Clone, Deserialize)]
pub struct RawToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
    #[serde(rename = "outputSchema", default)]
    pub output_schema: Option<Value>,
}

/// The interface the registry builder consumes from the backend tool host.
/// Kept deliberately narrow: discovery only.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    async fn list_tools(&self) -> anyhow::Result<Vec<RawToolDescriptor>>;
}

/// An immutable snapshot of the tool catalog, sorted by name, with an
/// id index for O(1) lookup by `tool_id` or by bare `name`.
#[derive(Debug, Clone)]
pub struct GatewayRegistry {
    records: Vec<ToolRecord>,
    by_id: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl GatewayRegistry {
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            by_id: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn records(&self) -> &[ToolRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn by_id(&self, tool_id: &str) -> Option<&ToolRecord> {
        self.by_id.get(tool_id).map(|&idx| &self.records[idx])
    }

    pub fn by_name(&self, name: &str) -> Option<&ToolRecord> {
        self.by_name.get(name).map(|&idx| &self.records[idx])
    }

    pub fn tool_names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.name.as_str())
    }

    fn from_sorted(records: Vec<ToolRecord>) -> Self {
        let mut by_id = HashMap::with_capacity(records.len());
        let mut by_name = HashMap::with_capacity(records.len());
        for (idx, record) in records.iter().enumerate() {
            by_id.insert(record.tool_id.clone(), idx);
            by_name.entry(record.name.clone()).or_insert(idx);
        }
        Self { records, by_id, by_name }
    }
}

/// Canonical JSON over `{name, inputSchema, outputSchema}`, sorted keys,
/// UTF-8 bytes, no trailing whitespace. `serde_json::Map` does not guarantee
/// sorted iteration, so the payload is rebuilt as a `BTreeMap` before
/// serializing.
fn canonical_fingerprint_payload(name: &str, input_schema: &Value, output_schema: &Option<Value>) -> String {
    let mut payload: BTreeMap<&str, Value> = BTreeMap::new();
    payload.insert("name", Value::String(name.to_string()));
    payload.insert("inputSchema", input_schema.clone());
    payload.insert(
        "outputSchema",
        output_schema.clone().unwrap_or(Value::Null),
    );
    serde_json::to_string(&payload).expect("BTreeMap<&str, Value> always serializes")
}

fn schema_hash(name: &str, input_schema: &Value, output_schema: &Option<Value>) -> String {
    let payload = canonical_fingerprint_payload(name, input_schema, output_schema);
    let digest = Sha256::digest(payload.as_bytes());
    let hex = format!("{digest:x}");
    hex[..16].to_string()
}

fn detect_tags(name: &str, description: &str) -> Vec<String> {
    let lowered = format!("{name} {description}").to_lowercase();
    let mut tags = Vec::new();
    if lowered.contains("windows") {
        tags.push("windows-only".to_string());
    }
    if ["xml", "xpath", "hwpx"].iter().any(|t| lowered.contains(t)) {
        tags.push("xml".to_string());
    }
    if ["pdf", "html", "convert", "export"].iter().any(|t| lowered.contains(t)) {
        tags.push("export".to_string());
    }
    if tags.is_empty() {
        tags.push("generic".to_string());
    }
    tags
}

fn normalize_schema_object(value: Value) -> Value {
    match value {
        Value::Object(_) => value,
        _ => Value::Object(Default::default()),
    }
}

/// Convert one raw descriptor into a fingerprinted `ToolRecord`.
pub fn convert_tool(raw: RawToolDescriptor) -> GatewayResult<ToolRecord> {
    let name = raw.name.trim().to_string();
    if name.is_empty() {
        return Err(GatewayError::Validation("malformed tool metadata: empty name".into()));
    }
    let description = raw.description.trim().to_string();
    let input_schema = normalize_schema_object(raw.input_schema);
    let output_schema = raw.output_schema.map(normalize_schema_object);

    let group = classify_group(&name, &description);
    let tags = detect_tags(&name, &description);
    let hash = schema_hash(&name, &input_schema, &output_schema);
    let tool_id = format!("{name}:{hash}");

    Ok(ToolRecord {
        tool_id,
        name,
        description,
        input_schema,
        output_schema,
        group,
        tags,
        schema_hash: hash,
    })
}

/// Build a fresh registry snapshot from the backend.
///
/// Generic rather than `&dyn ToolProvider` so callers holding a `&dyn
/// BackendServer` (a `ToolProvider` supertrait, see `gateway::backend`) can
/// pass it straight through without a trait-object upcast.
pub async fn build_registry<P: ToolProvider + ?Sized>(provider: &P) -> GatewayResult<GatewayRegistry> {
    let raw_tools = provider
        .list_tools()
        .await
        .map_err(|err| GatewayError::BackendUnavailable(err.to_string()))?;

    let mut records = Vec::with_capacity(raw_tools.len());
    for raw in raw_tools {
        records.push(convert_tool(raw)?);
    }
    records.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(GatewayRegistry::from_sorted(records))
}

#[derive(Serialize)]
struct JsonlRecord<'a> {
    tool_id: &'a str,
    name: &'a str,
    description: &'a str,
    group: &'a Group,
    tags: &'a [String],
    input_schema: &'a Value,
    output_schema: &'a Option<Value>,
    schema_hash: &'a str,
}

/// Diagnostic JSONL dump; the core never reads this back. One line per
/// `ToolRecord` field, matching `save_registry_jsonl`'s full-record dump.
pub fn dump_jsonl(registry: &GatewayRegistry, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(path)?;
    for record in registry.records() {
        let line = JsonlRecord {
            tool_id: &record.tool_id,
            name: &record.name,
            description: &record.description,
            group: &record.group,
            tags: &record.tags,
            input_schema: &record.input_schema,
            output_schema: &record.output_schema,
            schema_hash: &record.schema_hash,
        };
        let json = serde_json::to_string(&line)?;
        writeln!(file, "{json}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, description: &str) -> RawToolDescriptor {
        RawToolDescriptor {
            name: name.to_string(),
            description: description.to_string(),
            input_schema: serde_json::json!({"type": "object"}),
            output_schema: None,
        }
    }

    struct StaticProvider(Vec<RawToolDescriptor>);

    #[async_trait]
    impl ToolProvider for StaticProvider {
        async fn list_tools(&self) -> anyhow::Result<Vec<RawToolDescriptor>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn fingerprint_is_stable_across_conversions() {
        let raw = descriptor("hwp_export_pdf", "Export as PDF");
        let a = convert_tool(raw.clone()).unwrap();
        let b = convert_tool(raw).unwrap();
        assert_eq!(a.schema_hash, b.schema_hash);
        assert_eq!(a.tool_id, b.tool_id);
    }

    #[test]
    fn fingerprint_differs_when_schema_differs() {
        let mut raw_a = descriptor("hwp_insert_text", "Insert text");
        let mut raw_b = raw_a.clone();
        raw_a.input_schema = serde_json::json!({"type": "object", "properties": {"text": {"type": "string"}}});
        raw_b.input_schema = serde_json::json!({"type": "object", "properties": {"text": {"type": "number"}}});
        let a = convert_tool(raw_a).unwrap();
        let b = convert_tool(raw_b).unwrap();
        assert_ne!(a.schema_hash, b.schema_hash);
        assert_ne!(a.tool_id, b.tool_id);
    }

    #[test]
    fn empty_name_is_rejected() {
        let raw = descriptor("   ", "whatever");
        assert!(convert_tool(raw).is_err());
    }

    #[test]
    fn tags_are_never_empty() {
        let raw = descriptor("frobnicate", "does something unrelated");
        let record = convert_tool(raw).unwrap();
        assert_eq!(record.tags, vec!["generic".to_string()]);
    }

    #[test]
    fn tag_detection_covers_windows_export_and_xml_keywords() {
        let record = convert_tool(descriptor("hwp_windows_insert_text", "Insert text via Windows COM")).unwrap();
        assert_eq!(record.tags, vec!["windows-only".to_string()]);

        let record = convert_tool(descriptor("hwp_export_pdf", "Export document to PDF")).unwrap();
        assert_eq!(record.tags, vec!["export".to_string()]);

        let record = convert_tool(descriptor("hwp_xpath_query", "Run an xpath query over hwpx xml")).unwrap();
        assert_eq!(record.tags, vec!["xml".to_string()]);
    }

    #[tokio::test]
    async fn build_registry_sorts_by_name() {
        let provider = StaticProvider(vec![
            descriptor("hwp_save", "Save the document"),
            descriptor("hwp_create", "Create a document"),
            descriptor("hwp_export_pdf", "Export as PDF"),
        ]);
        let registry = build_registry(&provider).await.unwrap();
        let names: Vec<&str> = registry.tool_names().collect();
        assert_eq!(names, vec!["hwp_create", "hwp_export_pdf", "hwp_save"]);
    }

    #[tokio::test]
    async fn every_record_has_an_enumerated_group() {
        let provider = StaticProvider(vec![
            descriptor("hwp_ping", "Health check"),
            descriptor("frobnicate", "unrelated"),
        ]);
        let registry = build_registry(&provider).await.unwrap();
        for record in registry.records() {
            assert!(Group::ALL.contains(&record.group));
        }
    }

    #[tokio::test]
    async fn registry_lookup_by_id_and_name() {
        let provider = StaticProvider(vec![descriptor("hwp_ping", "Health check")]);
        let registry = build_registry(&provider).await.unwrap();
        let record = registry.by_name("hwp_ping").unwrap();
        assert_eq!(registry.by_id(&record.tool_id).unwrap().name, "hwp_ping");
    }

    #[tokio::test]
    async fn dump_jsonl_includes_input_and_output_schema() {
        let mut raw = descriptor("hwp_export_pdf", "Export as PDF");
        raw.output_schema = Some(serde_json::json!({"type": "object", "properties": {"ok": {"type": "boolean"}}}));
        let provider = StaticProvider(vec![raw]);
        let registry = build_registry(&provider).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.jsonl");
        dump_jsonl(&registry, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let line: Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(line["input_schema"], serde_json::json!({"type": "object"}));
        assert_eq!(
            line["output_schema"],
            serde_json::json!({"type": "object", "properties": {"ok": {"type": "boolean"}}})
        );
    }
}
