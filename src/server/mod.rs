//! Transport surfaces over the gateway and agent.

pub mod http;
pub mod stdio;

pub use stdio::GatewayMcpServer;
