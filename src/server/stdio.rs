//! Exposes the gateway's operations as MCP tools over stdio.
//!
//! Uses `#[tool_router]` + `#[tool]` for dispatch, `ServerHandler::initialize`
//! for the handshake, and the `transport-io` stdio pair used by `run()`.

use crate::gateway::facade::Gateway;
use rmcp::{
    handler::server::tool::{ToolCallContext, ToolRouter},
    handler::server::wrapper::Parameters,
    model::*,
    service::RequestContext,
    tool, Json, RoleServer, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct ToolSearchParams {
    /// Free-text query describing the desired action.
    pub query: String,
    /// Maximum number of candidates to return.
    #[serde(default = "default_k")]
    pub k: usize,
    /// Optional group name to constrain the search to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

fn default_k() -> usize {
    8
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct ToolDescribeParams {
    /// The fingerprinted `tool_id` to describe.
    pub tool_id: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct ToolCallParams {
    /// The fingerprinted `tool_id` to invoke.
    pub tool_id: String,
    /// JSON object of arguments for the underlying tool.
    #[serde(default)]
    pub arguments: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct RouteAndCallParams {
    /// Free-text query to route and dispatch.
    pub query: String,
    /// JSON object of arguments for the routed tool.
    #[serde(default)]
    pub arguments: serde_json::Value,
    /// How many candidates to consider before picking the top one.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    1
}

#[derive(Clone)]
pub struct GatewayMcpServer {
    gateway: std::sync::Arc<Gateway>,
    tool_router: ToolRouter<Self>,
}

#[rmcp::tool_router(router = tool_router)]
impl GatewayMcpServer {
    pub fn new(gateway: std::sync::Arc<Gateway>) -> Self {
        Self {
            gateway,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Search the tool catalog by free-text query, optionally constrained to a group.")]
    pub async fn tool_search(&self, params: Parameters<ToolSearchParams>) -> Result<Json<serde_json::Value>, String> {
        let params = params.0;
        let response = self
            .gateway
            .tool_search(&params.query, params.k, params.group.as_deref())
            .await
            .map_err(|err| err.to_string())?;
        Ok(Json(serde_json::to_value(response).map_err(|e| e.to_string())?))
    }

    #[tool(description = "Describe a tool's full record by tool_id.")]
    pub async fn tool_describe(&self, params: Parameters<ToolDescribeParams>) -> Result<Json<serde_json::Value>, String> {
        let response = self
            .gateway
            .tool_describe(&params.0.tool_id)
            .await
            .map_err(|err| err.to_string())?;
        Ok(Json(serde_json::to_value(response).map_err(|e| e.to_string())?))
    }

    #[tool(description = "Invoke a tool directly by tool_id with JSON arguments.")]
    pub async fn tool_call(&self, params: Parameters<ToolCallParams>) -> Result<Json<serde_json::Value>, String> {
        let params = params.0;
        let response = self
            .gateway
            .tool_call(&params.tool_id, params.arguments)
            .await
            .map_err(|err| err.to_string())?;
        Ok(Json(serde_json::to_value(response).map_err(|e| e.to_string())?))
    }

    #[tool(description = "Route a free-text query to a group, select the top candidate, and call it.")]
    pub async fn route_and_call(&self, params: Parameters<RouteAndCallParams>) -> Result<Json<serde_json::Value>, String> {
        let params = params.0;
        let arguments = if params.arguments.is_null() {
            None
        } else {
            Some(params.arguments)
        };
        let response = self
            .gateway
            .route_and_call(&params.query, arguments, params.top_k)
            .await
            .map_err(|err| err.to_string())?;
        Ok(Json(serde_json::to_value(response).map_err(|e| e.to_string())?))
    }

    /// Run the MCP server over stdio until the peer disconnects.
    pub async fn run(self) -> anyhow::Result<()> {
        tracing::info!("toolgate MCP gateway ready (stdio transport)");
        let transport = (tokio::io::stdin(), tokio::io::stdout());
        self.serve(transport).await?.waiting().await?;
        Ok(())
    }
}

impl ServerHandler for GatewayMcpServer {
    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::ErrorData> {
        Ok(ListToolsResult {
            tools: self.tool_router.list_all(),
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let tool_context = ToolCallContext::new(self, request, context);
        self.tool_router.call(tool_context).await
    }

    async fn initialize(
        &self,
        request: InitializeRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<InitializeResult, rmcp::ErrorData> {
        Ok(InitializeResult {
            protocol_version: request.protocol_version,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "toolgate".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("Agentic Tool Gateway".to_string()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Search, describe, call, or route-and-call tools through a fingerprinted, \
                 hybrid-retrieval-backed registry."
                    .to_string(),
            ),
        })
    }
}
