use std::process::ExitCode;
use std::sync::Arc;

use toolgate::gateway::{BackendConfig, ChildProcessBackend, Gateway};
use toolgate::server::GatewayMcpServer;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = toolgate::logging::init_logger() {
        eprintln!("failed to initialise logging: {err}");
        return ExitCode::from(1);
    }

    match run().await {
        Ok(()) => ExitCode::from(0),
        Err(err) => {
            eprintln!("toolgate: {err}");
            ExitCode::from(1)
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let config = BackendConfig::load(None)?;
    config.validate()?;

    let backend = Arc::new(ChildProcessBackend::new(config));
    let gateway = Arc::new(Gateway::new(backend));

    let transport = std::env::var("MCP_TRANSPORT").unwrap_or_else(|_| "stdio".to_string());
    match transport.as_str() {
        "stdio" => GatewayMcpServer::new(gateway).run().await,
        other => anyhow::bail!("unsupported transport: {other} (supported: stdio)"),
    }
}
