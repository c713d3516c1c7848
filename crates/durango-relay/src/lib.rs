//! WebSocket client for the remote relay (handshake, heartbeat, inbound
//! demultiplexing) and the one-shot Sync Bootstrap procedure that runs
//! after the session goes ready.

mod binding;
mod bootstrap;
mod error;
mod link;
mod protocol;

pub use binding::ThreadBindings;
pub use bootstrap::{
    extract_cwd, find_longest_prefix_project, normalize_timestamp, parse_project_manifest,
    register_projects, title_from_preview, ProjectRegistration,
};
pub use error::RelayError;
pub use link::{now_ms, RelayLink};
pub use protocol::{
    AckStatus, ClientMessage, DispatchAction, ErrorEnvelope, MachineDescriptor, ServerMessage,
    SessionErrorBody, ThreadUpsertPayload,
};
