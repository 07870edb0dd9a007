//! The agentic tool gateway: registry, grouping, retrieval, routing, and the
//! facade that exposes them as a handful of public operations.

pub mod backend;
pub mod config;
pub mod facade;
pub mod grouping;
pub mod models;
pub mod registry;
pub mod retrieval;
pub mod router;

pub use backend::{BackendServer, ChildProcessBackend};
pub use config::BackendConfig;
pub use facade::Gateway;
pub use models::{Group, GroupRoute, ToolRecord, ToolScore};
pub use registry::GatewayRegistry;
