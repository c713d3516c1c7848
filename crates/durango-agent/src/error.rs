use std::path::PathBuf;

use durango_transport::TransportError;
use thiserror::Error;

/// Errors raised while starting or driving the local agent server.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent binary `{binary}` could not be spawned: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("agent process exited during connect with {status:?}")]
    EarlyExit { status: std::process::ExitStatus },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("turn/start requires prompt text or at least one attachment")]
    EmptyTurnInput,
    #[error("pagination parameter `{name}` must be between {min} and {max}, got {value}")]
    PaginationOutOfRange {
        name: &'static str,
        min: u32,
        max: u32,
        value: u32,
    },
    #[error("failed to materialize attachment `{name}`: {source}")]
    Attachment {
        name: String,
        #[source]
        source: std::io::Error,
    },
}
