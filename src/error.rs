//! Unified error taxonomy for the gateway.
//!
//! Unknown group names, unknown `tool_id`s, and no-candidate routing are
//! *expected* failures: the facade folds them into a response envelope
//! (`success: false, message`) directly and never constructs a `GatewayError`
//! for them. Every variant here is therefore an *unexpected* failure that
//! bubbles up as `Err` to the transport layer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    /// Malformed tool metadata from a provider, malformed request body.
    #[error("validation error: {0}")]
    Validation(String),

    /// The backend tool host could not be reached or returned a transport error.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A direct-callable or proxied tool invocation raised an error.
    #[error("tool call failed: {0}")]
    ToolCallFailed(String),

    /// Missing API key, unsupported transport, malformed config file.
    #[error("config error: {0}")]
    Config(String),

    /// The external model returned an unparseable response or exceeded the
    /// round budget.
    #[error("model protocol error: {0}")]
    ModelProtocol(String),

    /// Anything else; propagated from I/O or library boundaries.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type GatewayResult<T> = Result<T, GatewayError>;
