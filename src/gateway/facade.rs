//! The gateway facade: the public operations everything else calls through.
//!
//! Grounded on `original_source/hwpx_mcp/agentic/gateway.py`'s
//! `AgenticGateway`. The registry snapshot is held behind a `tokio::sync::
//! RwLock<Arc<GatewayRegistry>>` so a request reads one consistent snapshot
//! while `refresh_registry` can swap in a new one atomically.

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::backend::BackendServer;
use crate::gateway::models::{Group, GroupRoute, ToolRecord};
use crate::gateway::registry::{build_registry, GatewayRegistry};
use crate::gateway::router::HierarchicalRouter;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize)]
pub struct ToolSearchHit {
    pub tool_id: String,
    pub name: String,
    pub description: String,
    pub group: Group,
    pub score: f64,
    pub reason: crate::gateway::models::ScoreReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolSearchResponse {
    pub success: bool,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<GroupRoute>,
    pub results: Vec<ToolSearchHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolDescription {
    pub tool_id: String,
    pub name: String,
    pub description: String,
    pub group: Group,
    pub tags: Vec<String>,
    pub input_schema: Value,
    pub output_schema: Option<Value>,
    pub schema_hash: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolDescribeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolDescription>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolCallResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteAndCallSelected {
    pub tool_id: String,
    pub name: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteAndCallResponse {
    pub success: bool,
    pub route: GroupRoute,
    pub selected: Option<RouteAndCallSelected>,
    pub result: Option<Value>,
    pub message: Option<String>,
}

pub struct Gateway {
    backend: Arc<dyn BackendServer>,
    registry: RwLock<Arc<GatewayRegistry>>,
}

impl Gateway {
    pub fn new(backend: Arc<dyn BackendServer>) -> Self {
        Self {
            backend,
            registry: RwLock::new(Arc::new(GatewayRegistry::empty())),
        }
    }

    /// Rebuild the registry snapshot from the backend and atomically swap it
    /// in.
    pub async fn refresh_registry(&self) -> GatewayResult<usize> {
        let registry = build_registry(self.backend.as_ref()).await?;
        let count = registry.len();
        *self.registry.write().await = Arc::new(registry);
        Ok(count)
    }

    async fn ensure_registry(&self) -> GatewayResult<Arc<GatewayRegistry>> {
        {
            let guard = self.registry.read().await;
            if !guard.is_empty() {
                return Ok(guard.clone());
            }
        }
        self.refresh_registry().await?;
        Ok(self.registry.read().await.clone())
    }

    /// The full current catalog, unfiltered and unscored. Used by callers
    /// that need every tool's name/id (e.g. the tool-only agent's
    /// `tools_by_name` map) rather than a query-ranked subset.
    pub async fn all_tools(&self) -> GatewayResult<Vec<ToolRecord>> {
        let registry = self.ensure_registry().await?;
        Ok(registry.records().to_vec())
    }

    /// Search for candidate tools, optionally constrained to a group.
    pub async fn tool_search(
        &self,
        query: &str,
        k: usize,
        group: Option<&str>,
    ) -> GatewayResult<ToolSearchResponse> {
        let registry = self.ensure_registry().await?;
        let router = HierarchicalRouter::new(registry.records());

        let selected_group = match group {
            Some(name) => match Group::parse(name) {
                Some(group) => Some(group),
                None => {
                    return Ok(ToolSearchResponse {
                        success: false,
                        query: query.to_string(),
                        route: None,
                        results: Vec::new(),
                        message: Some(format!("invalid group: {name}")),
                    });
                }
            },
            None => None,
        };

        let (scores, route) = match selected_group {
            Some(group) => {
                let scores = router.select_tools(query, Some(group), Some(k));
                (
                    scores,
                    GroupRoute {
                        group,
                        reason: "user_selected".to_string(),
                        confidence: 1.0,
                    },
                )
            }
            None => {
                let route = router.route_group(query);
                let scores = router.select_tools(query, Some(route.group), Some(k));
                (scores, route)
            }
        };

        let results = scores
            .into_iter()
            .filter_map(|score| {
                registry.by_id(&score.tool_id).map(|record| ToolSearchHit {
                    tool_id: record.tool_id.clone(),
                    name: record.name.clone(),
                    description: record.description.clone(),
                    group: record.group,
                    score: score.score,
                    reason: score.reason,
                })
            })
            .collect();

        Ok(ToolSearchResponse {
            success: true,
            query: query.to_string(),
            route: Some(route),
            results,
            message: None,
        })
    }

    /// Full record lookup by `tool_id`.
    pub async fn tool_describe(&self, tool_id: &str) -> GatewayResult<ToolDescribeResponse> {
        let registry = self.ensure_registry().await?;
        let Some(record) = registry.by_id(tool_id) else {
            return Ok(ToolDescribeResponse {
                success: false,
                tool: None,
                message: Some(format!("tool_id not found: {tool_id}")),
            });
        };
        Ok(ToolDescribeResponse {
            success: true,
            tool: Some(describe(record)),
            message: None,
        })
    }

    /// Invoke a tool directly by `tool_id`.
    pub async fn tool_call(&self, tool_id: &str, arguments: Value) -> GatewayResult<ToolCallResponse> {
        let registry = self.ensure_registry().await?;
        let Some(record) = registry.by_id(tool_id).cloned() else {
            return Ok(ToolCallResponse {
                success: false,
                tool_id: None,
                tool_name: None,
                result: None,
                message: Some(format!("tool_id not found: {tool_id}")),
            });
        };

        let raw = self
            .backend
            .call_tool(&record.name, arguments)
            .await
            .map_err(|err| GatewayError::ToolCallFailed(err.to_string()))?;

        Ok(ToolCallResponse {
            success: true,
            tool_id: Some(tool_id.to_string()),
            tool_name: Some(record.name),
            result: Some(normalize_tool_result(raw)),
            message: None,
        })
    }

    /// Route a free-text query to a group, pick the top candidate, call it.
    pub async fn route_and_call(
        &self,
        query: &str,
        arguments: Option<Value>,
        top_k: usize,
    ) -> GatewayResult<RouteAndCallResponse> {
        let registry = self.ensure_registry().await?;
        let router = HierarchicalRouter::new(registry.records());
        let arguments = arguments.unwrap_or(Value::Object(Default::default()));

        let route = router.route_group(query);
        let candidates = router.select_tools(query, Some(route.group), Some(top_k.max(1)));

        let Some(selected) = candidates.into_iter().next() else {
            return Ok(RouteAndCallResponse {
                success: false,
                route,
                selected: None,
                result: None,
                message: Some("no candidate tools found".to_string()),
            });
        };

        let Some(record) = registry.by_id(&selected.tool_id) else {
            return Ok(RouteAndCallResponse {
                success: false,
                route,
                selected: None,
                result: None,
                message: Some("selected tool missing from registry".to_string()),
            });
        };
        let record = record.clone();

        let raw = self
            .backend
            .call_tool(&record.name, arguments)
            .await
            .map_err(|err| GatewayError::ToolCallFailed(err.to_string()))?;

        Ok(RouteAndCallResponse {
            success: true,
            route,
            selected: Some(RouteAndCallSelected {
                tool_id: record.tool_id,
                name: record.name,
                score: selected.score,
            }),
            result: Some(normalize_tool_result(raw)),
            message: None,
        })
    }
}

fn describe(record: &ToolRecord) -> ToolDescription {
    ToolDescription {
        tool_id: record.tool_id.clone(),
        name: record.name.clone(),
        description: record.description.clone(),
        group: record.group,
        tags: record.tags.clone(),
        input_schema: record.input_schema.clone(),
        output_schema: record.output_schema.clone(),
        schema_hash: record.schema_hash.clone(),
    }
}

/// Flatten the backend's raw call result: each content item's `text` field
/// is parsed as JSON when possible, else kept as a plain string.
fn normalize_tool_result(raw: Value) -> Value {
    match raw {
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_item).collect()),
        other => other,
    }
}

fn normalize_item(item: Value) -> Value {
    if let Some(text) = item.get("text").and_then(Value::as_str) {
        return serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()));
    }
    item
}
