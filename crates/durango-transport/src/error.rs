use std::time::Duration;

use thiserror::Error;

/// Errors raised by the JSON-RPC-over-WebSocket transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect to `{url}` exceeded the {budget:?} retry budget")]
    ConnectBudgetExhausted { url: String, budget: Duration },
    #[error("request `{method}` timed out after {timeout:?}")]
    RequestTimeout { method: String, timeout: Duration },
    #[error("server returned error {code} for `{method}`: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },
    #[error("the connection was closed")]
    ClientClosed,
    #[error("failed to serialize request `{method}`: {source}")]
    Serialize {
        method: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("the writer task channel is closed")]
    ChannelClosed,
}
