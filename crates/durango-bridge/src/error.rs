use thiserror::Error;

use durango_agent::AgentError;

/// Errors raised inside a single dispatch action body. Every variant here
/// is caught at the Coordinator boundary and turned into a terminal
/// `dispatch.ack{status:"failed"}` rather than propagated further.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Agent(#[from] AgentError),
}
