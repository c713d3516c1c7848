use crate::item::CommandStatus;

/// The four downstream turn-lifecycle terminators. `running` never
/// produces one of these; callers get `None` and infer accordingly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    Completed,
    Interrupted,
    Failed,
}

impl TurnStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TurnStatus::Completed => "completed",
            TurnStatus::Interrupted => "interrupted",
            TurnStatus::Failed => "failed",
        }
    }
}

fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Normalize a raw status string for a `commandExecution` item. Unknown
/// values fall back to `failed` rather than being dropped.
pub fn normalize_command_status(raw: &str) -> CommandStatus {
    match normalize(raw).as_str() {
        "in_progress" | "inprogress" | "running" | "queued" => CommandStatus::Running,
        "completed" | "complete" | "success" | "succeeded" => CommandStatus::Completed,
        "cancelled" | "canceled" | "aborted" | "interrupted" => CommandStatus::Failed,
        _ => CommandStatus::Failed,
    }
}

/// Normalize a raw status string for turn-lifecycle inference. `running`
/// (and anything mapping to it) yields `None` — no terminator yet.
/// Unrecognized values are intentionally left unmapped (`None`) per the
/// open design question: we never guess a terminator for a status we
/// don't understand.
pub fn normalize_turn_status(raw: &str) -> Option<TurnStatus> {
    match normalize(raw).as_str() {
        "in_progress" | "inprogress" | "running" | "queued" => None,
        "completed" | "complete" | "success" | "succeeded" => Some(TurnStatus::Completed),
        "cancelled" | "canceled" | "aborted" | "interrupted" => Some(TurnStatus::Interrupted),
        "failed" | "error" | "errored" => Some(TurnStatus::Failed),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_status_aliases_map_to_the_same_bucket() {
        assert_eq!(normalize_command_status("IN_PROGRESS"), CommandStatus::Running);
        assert_eq!(normalize_command_status("queued"), CommandStatus::Running);
        assert_eq!(normalize_command_status("Success"), CommandStatus::Completed);
        assert_eq!(normalize_command_status("aborted"), CommandStatus::Failed);
        assert_eq!(normalize_command_status("bogus"), CommandStatus::Failed);
    }

    #[test]
    fn turn_status_running_variants_yield_no_terminator() {
        assert_eq!(normalize_turn_status("running"), None);
        assert_eq!(normalize_turn_status("queued"), None);
    }

    #[test]
    fn turn_status_terminal_variants_map_correctly() {
        assert_eq!(normalize_turn_status("success"), Some(TurnStatus::Completed));
        assert_eq!(normalize_turn_status("cancelled"), Some(TurnStatus::Interrupted));
        assert_eq!(normalize_turn_status("errored"), Some(TurnStatus::Failed));
    }

    #[test]
    fn unknown_turn_status_is_left_unmapped() {
        assert_eq!(normalize_turn_status("whatever-new-state"), None);
    }
}
