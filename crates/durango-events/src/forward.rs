//! Decides what, if anything, one agent notification should produce on the
//! relay link. Binding resolution (mapping an agent thread id to a
//! downstream thread id, and dropping events for unbound threads) is the
//! caller's responsibility — this module only classifies the notification
//! itself.

use serde_json::Value;

use crate::item::DurangoItem;
use crate::status::normalize_turn_status;
use crate::translator::translate_item;

/// What a single agent notification should produce downstream.
#[derive(Debug)]
pub enum ForwardEffect {
    /// Emit `thread.update` with a new title.
    ThreadUpdate { title: String },
    /// Emit one `event.upsert` per item.
    Items(Vec<DurangoItem>),
    /// Nothing to forward.
    None,
}

/// Pull `codexThreadId` out of a notification's params, trying the several
/// field-name aliases the upstream uses inconsistently.
pub fn extract_codex_thread_id(params: &Value) -> Option<String> {
    for key in ["threadId", "codexThreadId", "thread_id", "codex_thread_id"] {
        if let Some(id) = params.get(key).and_then(Value::as_str) {
            return Some(id.to_string());
        }
    }
    None
}

/// Pull the turn id out of a notification's params, falling back to a
/// fresh id if absent (used as the `requestId` for `event.upsert`).
pub fn extract_turn_id(params: &Value) -> Option<String> {
    for key in ["turnId", "turn_id"] {
        if let Some(id) = params.get(key).and_then(Value::as_str) {
            return Some(id.to_string());
        }
    }
    None
}

/// Classify one `notifications/*`-style agent method + params into the
/// effect it should have on the relay link.
pub fn classify_notification(method: &str, params: &Value) -> ForwardEffect {
    let lower = method.to_lowercase();

    if lower.contains("delta") {
        return ForwardEffect::None;
    }

    if (lower.contains("updated") || lower.contains("renamed") || lower.contains("title"))
        && lower.contains("thread")
    {
        if let Some(title) = params
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            return ForwardEffect::ThreadUpdate {
                title: title.to_string(),
            };
        }
        return ForwardEffect::None;
    }

    if lower.contains("thread") && lower.contains("started") {
        return ForwardEffect::None;
    }
    if lower.contains("turn") && lower.contains("started") {
        return ForwardEffect::None;
    }

    if lower.contains("item") && lower.contains("started") {
        let item = params.get("item").unwrap_or(params);
        let turn_id = extract_turn_id(params).unwrap_or_default();
        let is_command = item
            .get("type")
            .and_then(Value::as_str)
            .map(|t| t.to_lowercase().contains("command"))
            .unwrap_or(false);
        if is_command {
            return ForwardEffect::Items(translate_item(item, &turn_id));
        }
        return ForwardEffect::None;
    }

    if lower.contains("item") && lower.contains("completed") {
        let item = params.get("item").unwrap_or(params);
        let turn_id = extract_turn_id(params).unwrap_or_default();
        return ForwardEffect::Items(translate_item(item, &turn_id));
    }

    if lower.contains("turn") && lower.contains("completed") {
        let turn_id = extract_turn_id(params).unwrap_or_default();
        let status_raw = params
            .get("status")
            .and_then(Value::as_str)
            .or_else(|| {
                params
                    .get("result")
                    .and_then(|r| r.get("status"))
                    .and_then(Value::as_str)
            })
            .unwrap_or("");

        if status_raw.eq_ignore_ascii_case("success")
            || matches!(
                normalize_turn_status(status_raw),
                Some(crate::status::TurnStatus::Completed)
            )
        {
            return ForwardEffect::None;
        }

        let error_message = params.get("error").and_then(Value::as_str);
        let mut text = serde_json::json!({
            "method": "turn/completed",
            "params": { "status": status_raw },
        });
        if let Some(msg) = error_message {
            text["params"]["error"] = serde_json::json!(msg);
        }
        let item = DurangoItem::Plan {
            id: crate::item::fresh_id(),
            turn_id,
            timestamp: 0,
            text: text.to_string(),
        };
        return ForwardEffect::Items(vec![item]);
    }

    // Generic fallback for methods containing "updated" that aren't a
    // thread title update (e.g. `notifications/item.updated`): ignored,
    // same as `delta` notifications above.
    if lower.contains("updated") {
        return ForwardEffect::None;
    }

    // Catch-all: nothing matched above, so preserve it losslessly as a
    // plan item rather than silently dropping it.
    let turn_id = extract_turn_id(params).unwrap_or_default();
    let text = serde_json::json!({ "method": method, "params": params }).to_string();
    ForwardEffect::Items(vec![DurangoItem::Plan {
        id: crate::item::fresh_id(),
        turn_id,
        timestamp: 0,
        text,
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn thread_started_is_ignored() {
        let params = json!({"threadId": "t1"});
        assert!(matches!(
            classify_notification("notifications/thread.started", &params),
            ForwardEffect::None
        ));
    }

    #[test]
    fn item_started_suppressed_unless_command() {
        let params = json!({"turnId": "t1", "item": {"type": "agentMessage", "text": "x"}});
        assert!(matches!(
            classify_notification("notifications/item.started", &params),
            ForwardEffect::None
        ));

        let params = json!({"turnId": "t1", "item": {"type": "commandExecution", "command": "ls", "status": "running"}});
        assert!(matches!(
            classify_notification("notifications/item.started", &params),
            ForwardEffect::Items(_)
        ));
    }

    #[test]
    fn item_completed_always_emits() {
        let params = json!({"turnId": "t1", "item": {"type": "agentMessage", "text": "done"}});
        match classify_notification("notifications/item.completed", &params) {
            ForwardEffect::Items(items) => assert_eq!(items.len(), 1),
            other => panic!("expected Items, got {other:?}"),
        }
    }

    #[test]
    fn turn_completed_success_emits_nothing() {
        let params = json!({"turnId": "t1", "status": "completed"});
        assert!(matches!(
            classify_notification("notifications/turn.completed", &params),
            ForwardEffect::None
        ));
    }

    #[test]
    fn turn_completed_failure_emits_plan_terminator() {
        let params = json!({"turnId": "t1", "status": "failed", "error": "boom"});
        match classify_notification("notifications/turn.completed", &params) {
            ForwardEffect::Items(items) => {
                assert_eq!(items.len(), 1);
                assert!(matches!(&items[0], DurangoItem::Plan { text, .. } if text.contains("failed")));
            }
            other => panic!("expected Items, got {other:?}"),
        }
    }

    #[test]
    fn unmatched_method_is_preserved_as_plan() {
        let params = json!({"turnId": "t1", "foo": "bar"});
        match classify_notification("notifications/something.unheard.of", &params) {
            ForwardEffect::Items(items) => {
                assert_eq!(items.len(), 1);
                assert!(matches!(&items[0], DurangoItem::Plan { text, .. } if text.contains("something.unheard.of")));
            }
            other => panic!("expected Items, got {other:?}"),
        }
    }

    #[test]
    fn item_updated_is_ignored() {
        let params = json!({"turnId": "t1", "item": {"type": "agentMessage", "text": "x"}});
        assert!(matches!(
            classify_notification("notifications/item.updated", &params),
            ForwardEffect::None
        ));
    }

    #[test]
    fn thread_title_update_extracts_title() {
        let params = json!({"threadId": "t1", "title": "  My Thread  "});
        match classify_notification("notifications/thread.updated", &params) {
            ForwardEffect::ThreadUpdate { title } => assert_eq!(title, "My Thread"),
            other => panic!("expected ThreadUpdate, got {other:?}"),
        }
    }
}
