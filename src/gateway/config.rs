//! Backend tool host configuration.
//!
//! Same JSON shape and `${VAR_NAME}` expansion convention as a multi-server
//! MCP config manager, narrowed to the single backend process this gateway
//! talks to. No hot-reload, no per-server health-check block, no file
//! locking, since those only matter when juggling a fleet of MCP servers and
//! rewriting the config file in place.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "gateway.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl BackendConfig {
    pub fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            anyhow::bail!("backend config error: `command` must not be empty");
        }
        Ok(())
    }

    /// Load from `path`, or `$TOOLGATE_BACKEND_CONFIG`, or `./gateway.json`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let resolved = resolve_config_path(path)?;
        let content = std::fs::read_to_string(&resolved)
            .with_context(|| format!("failed to read backend config from {}", resolved.display()))?;
        let mut config: BackendConfig = serde_json::from_str(&content)
            .with_context(|| format!("invalid JSON in {}", resolved.display()))?;
        expand_env_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Ok(path) = std::env::var("TOOLGATE_BACKEND_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_FILE))
}

fn expand_env_overrides(config: &mut BackendConfig) {
    for value in config.env.values_mut() {
        *value = expand_env_var(value);
    }
}

/// Expand `${VAR_NAME}` placeholders against the process environment.
/// Leaves the placeholder untouched if the variable is unset.
pub fn expand_env_var(value: &str) -> String {
    if !value.starts_with("${") || !value.ends_with('}') {
        return value.to_string();
    }
    let var_name = &value[2..value.len() - 1];
    std::env::var(var_name).unwrap_or_else(|_| value.to_string())
}
