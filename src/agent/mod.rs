//! The deterministic tool-only agent and the optional external-model agent.

pub mod external;
pub mod intent;
pub mod state;
pub mod tool_only;

pub use state::{AgentRunResult, AgentState, Case, Intent, Subagent};
pub use tool_only::ToolOnlyAgent;
