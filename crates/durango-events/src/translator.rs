//! Mapping from one upstream agent item to zero or more downstream items
//! (SPEC_FULL.md §4.4), plus the notification-to-`event.upsert` forwarding
//! rules layered on top of it.

use serde_json::Value;

use crate::item::{CommandStatus, DurangoItem};
use crate::status::normalize_command_status;
use crate::text::{extract_summary_lines, extract_text};
use crate::item::fresh_id;

/// Translate one upstream item object into zero or more downstream items.
/// Unknown `type` values are never dropped: they become a single `plan`
/// item carrying the raw JSON, so nothing is silently lost.
pub fn translate_item(raw: &Value, turn_id: &str) -> Vec<DurangoItem> {
    let item_type = raw
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_lowercase();

    match item_type.as_str() {
        "usermessage" | "user_message" => translate_user_message(raw, turn_id),
        "agentmessage" | "assistantmessage" | "assistant_message" => {
            translate_agent_message(raw, turn_id)
        }
        "reasoning" => translate_reasoning(raw, turn_id),
        "commandexecution" | "command_execution" => translate_command_execution(raw, turn_id),
        "filechange" | "file_change" => translate_file_change(raw, turn_id),
        "plan" => translate_plan(raw, turn_id),
        _ => vec![plan_fallback(raw, turn_id)],
    }
}

fn translate_user_message(raw: &Value, turn_id: &str) -> Vec<DurangoItem> {
    let text = raw
        .get("content")
        .and_then(extract_text)
        .or_else(|| raw.get("text").and_then(extract_text));
    match text {
        Some(text) if !text.is_empty() => vec![DurangoItem::UserMessage {
            id: fresh_id(),
            turn_id: turn_id.to_string(),
            timestamp: 0,
            text,
        }],
        _ => Vec::new(),
    }
}

fn translate_agent_message(raw: &Value, turn_id: &str) -> Vec<DurangoItem> {
    let text = raw
        .get("text")
        .and_then(extract_text)
        .or_else(|| raw.get("content").and_then(extract_text));
    match text {
        Some(text) if !text.is_empty() => vec![DurangoItem::AgentMessage {
            id: fresh_id(),
            turn_id: turn_id.to_string(),
            timestamp: 0,
            text,
        }],
        _ => Vec::new(),
    }
}

fn translate_reasoning(raw: &Value, turn_id: &str) -> Vec<DurangoItem> {
    let summary = extract_summary_lines(raw);
    if summary.is_empty() {
        return Vec::new();
    }
    vec![DurangoItem::Reasoning {
        id: fresh_id(),
        turn_id: turn_id.to_string(),
        timestamp: 0,
        summary,
    }]
}

fn translate_command_execution(raw: &Value, turn_id: &str) -> Vec<DurangoItem> {
    let command = raw
        .get("command")
        .and_then(extract_text)
        .unwrap_or_default();
    if command.is_empty() {
        return Vec::new();
    }
    let cwd = raw.get("cwd").and_then(Value::as_str).map(str::to_string);
    let status_raw = raw.get("status").and_then(Value::as_str).unwrap_or("");
    let status = normalize_command_status(status_raw);
    let output = raw.get("output").and_then(extract_text);
    let exit_code = raw.get("exitCode").and_then(Value::as_i64);

    vec![DurangoItem::CommandExecution {
        id: fresh_id(),
        turn_id: turn_id.to_string(),
        timestamp: 0,
        command,
        cwd,
        status,
        output,
        exit_code,
    }]
}

fn translate_file_change(raw: &Value, turn_id: &str) -> Vec<DurangoItem> {
    let changes = raw
        .get("changes")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    changes
        .iter()
        .filter_map(|change| {
            let path = change.get("path").and_then(Value::as_str)?.to_string();
            let patch = change
                .get("patch")
                .and_then(extract_text)
                .or_else(|| change.get("diff").and_then(extract_text))
                .unwrap_or_else(|| "(no patch text)".to_string());
            Some(DurangoItem::FileChange {
                id: fresh_id(),
                turn_id: turn_id.to_string(),
                timestamp: 0,
                path,
                patch,
            })
        })
        .collect()
}

fn translate_plan(raw: &Value, turn_id: &str) -> Vec<DurangoItem> {
    let text = raw
        .get("text")
        .and_then(extract_text)
        .or_else(|| raw.get("content").and_then(extract_text));
    match text {
        Some(text) if !text.is_empty() => vec![DurangoItem::Plan {
            id: fresh_id(),
            turn_id: turn_id.to_string(),
            timestamp: 0,
            text,
        }],
        _ => Vec::new(),
    }
}

fn plan_fallback(raw: &Value, turn_id: &str) -> DurangoItem {
    let text = serde_json::to_string(raw).unwrap_or_else(|_| "{}".to_string());
    DurangoItem::Plan {
        id: fresh_id(),
        turn_id: turn_id.to_string(),
        timestamp: 0,
        text,
    }
}

/// Build the synthetic plan item describing a turn's terminal status,
/// used both by notification forwarding (`turn/completed`) and by the
/// Hydration Engine.
pub fn turn_completed_plan(turn_id: &str, status: &str) -> DurangoItem {
    let text = serde_json::json!({
        "method": "turn/completed",
        "params": { "status": status }
    })
    .to_string();
    DurangoItem::Plan {
        id: fresh_id(),
        turn_id: turn_id.to_string(),
        timestamp: 0,
        text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_message_extracts_text_from_content() {
        let raw = json!({"type": "userMessage", "content": "hi there"});
        let items = translate_item(&raw, "turn-1");
        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], DurangoItem::UserMessage { text, .. } if text == "hi there"));
    }

    #[test]
    fn empty_user_message_is_dropped() {
        let raw = json!({"type": "user_message", "content": "   "});
        assert!(translate_item(&raw, "turn-1").is_empty());
    }

    #[test]
    fn command_execution_defaults_status_to_failed_on_unknown() {
        let raw = json!({"type": "commandExecution", "command": "ls", "status": "weird"});
        let items = translate_item(&raw, "turn-1");
        assert!(matches!(
            &items[0],
            DurangoItem::CommandExecution { status: CommandStatus::Failed, .. }
        ));
    }

    #[test]
    fn file_change_emits_one_item_per_change() {
        let raw = json!({
            "type": "fileChange",
            "changes": [
                {"path": "a.rs", "patch": "+1"},
                {"path": "b.rs"},
            ]
        });
        let items = translate_item(&raw, "turn-1");
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[1], DurangoItem::FileChange { patch, .. } if patch == "(no patch text)"));
    }

    #[test]
    fn file_change_element_without_path_is_skipped() {
        let raw = json!({"type": "file_change", "changes": [{"patch": "x"}]});
        assert!(translate_item(&raw, "turn-1").is_empty());
    }

    #[test]
    fn unknown_type_becomes_plan_with_raw_json() {
        let raw = json!({"type": "somethingNew", "payload": 42});
        let items = translate_item(&raw, "turn-1");
        assert_eq!(items.len(), 1);
        match &items[0] {
            DurangoItem::Plan { text, .. } => {
                assert!(text.contains("somethingNew"));
                assert!(text.contains("42"));
            }
            other => panic!("expected Plan, got {other:?}"),
        }
    }

    #[test]
    fn type_match_is_case_insensitive() {
        let raw = json!({"type": "UserMessage", "content": "hi"});
        assert_eq!(translate_item(&raw, "t").len(), 1);
    }
}
