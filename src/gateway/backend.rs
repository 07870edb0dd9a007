//! The backend tool host connection.
//!
//! One child process instead of a named fleet, spawned lazily and reused
//! for the life of the gateway, over the same `rmcp` child-process
//! transport and peer/list_all_tools/call_tool shape a multi-server
//! connection pool would use for each member.

use crate::gateway::config::BackendConfig;
use crate::gateway::registry::{RawToolDescriptor, ToolProvider};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rmcp::{
    model::{CallToolRequestParam, ClientInfo},
    service::{RoleClient, RunningService, ServiceExt},
    transport::{ConfigureCommandExt, TokioChildProcess},
};
use serde_json::Value;
use tokio::process::Command;

/// What the gateway needs from whatever hosts the underlying tools: list
/// them, and invoke one by name. A supertrait of `ToolProvider` so
/// `registry::build_registry` accepts `&dyn BackendServer` directly.
#[async_trait]
pub trait BackendServer: ToolProvider {
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value>;
}

/// A single backend process, spawned on first use and kept alive for
/// subsequent calls.
pub struct ChildProcessBackend {
    config: BackendConfig,
    running: Mutex<Option<RunningService<RoleClient, ClientInfo>>>,
}

impl ChildProcessBackend {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            running: Mutex::new(None),
        }
    }

    async fn ensure_connected(&self) -> Result<()> {
        if self.running.lock().is_some() {
            return Ok(());
        }
        let running = spawn_client(&self.config).await?;
        *self.running.lock() = Some(running);
        Ok(())
    }

    fn peer(&self) -> Result<rmcp::service::Peer<RoleClient>> {
        self.running
            .lock()
            .as_ref()
            .map(|r| r.peer().clone())
            .ok_or_else(|| anyhow!("backend process not connected"))
    }
}

#[async_trait]
impl ToolProvider for ChildProcessBackend {
    async fn list_tools(&self) -> Result<Vec<RawToolDescriptor>> {
        self.ensure_connected().await?;
        let tools = self.peer()?.list_all_tools().await?;
        Ok(tools
            .into_iter()
            .map(|tool| RawToolDescriptor {
                name: tool.name.to_string(),
                description: tool.description.map(|d| d.to_string()).unwrap_or_default(),
                input_schema: Value::Object((*tool.input_schema).clone()),
                output_schema: tool
                    .output_schema
                    .map(|schema| Value::Object((*schema).clone())),
            })
            .collect())
    }
}

#[async_trait]
impl BackendServer for ChildProcessBackend {
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        self.ensure_connected().await?;
        let args = match arguments {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                return Err(anyhow!(
                    "tool arguments must be a JSON object, received {other}"
                ))
            }
        };
        let param = CallToolRequestParam {
            name: name.to_string().into(),
            arguments: args,
        };
        let result = self.peer()?.call_tool(param).await?;
        if let Some(structured) = result.structured_content {
            return Ok(structured);
        }
        if !result.content.is_empty() {
            let items: Vec<Value> = result
                .content
                .into_iter()
                .map(|chunk| serde_json::to_value(&chunk).unwrap_or(Value::Null))
                .collect();
            return Ok(Value::Array(items));
        }
        Ok(Value::Null)
    }
}

async fn spawn_client(config: &BackendConfig) -> Result<RunningService<RoleClient, ClientInfo>> {
    let transport = TokioChildProcess::new(Command::new(&config.command).configure(|cmd| {
        cmd.args(&config.args);
        for (key, value) in &config.env {
            cmd.env(key, value);
        }
        cmd.kill_on_drop(true);
    }))?;

    let mut info = ClientInfo::default();
    info.client_info.name = "toolgate".into();

    info.serve(transport)
        .await
        .map_err(|err| anyhow!(err))
        .context("failed to spawn backend tool host")
}
