//! Typed operations against a local coding-agent JSON-RPC server, plus the
//! spawn-or-attach and turn-input construction logic the dispatch
//! coordinator drives.

mod client;
mod error;
pub mod input;
pub mod stderr;
mod types;

pub use client::{AgentClient, AgentClientConfig};
pub use error::AgentError;
pub use types::{
    ClientInfo, InitializeCapabilities, InitializeParams, InputItem, Page, ThreadStartParams,
    TurnStartParams,
};
