//! An agentic tool gateway: a fingerprinted tool registry, hybrid BM25/
//! Jaccard retrieval, a hierarchical router, and a deterministic tool-only
//! agent sitting in front of an MCP-style backend.

pub mod agent;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod server;

pub use error::{GatewayError, GatewayResult};
pub use gateway::Gateway;
