//! The frozen downstream item schema, the upstream-to-downstream event
//! translator, and the thread-history hydration engine.

mod forward;
mod hydration;
mod item;
mod status;
mod text;
mod translator;

pub use forward::{classify_notification, extract_codex_thread_id, extract_turn_id, ForwardEffect};
pub use hydration::{hydrate, HydrationResult};
pub use item::{fresh_id, CommandStatus, DurangoItem};
pub use status::{normalize_command_status, normalize_turn_status, TurnStatus};
pub use text::{extract_summary_lines, extract_text};
pub use translator::{translate_item, turn_completed_plan};
