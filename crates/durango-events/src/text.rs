use serde_json::Value;

/// Recursively extract human-readable text from a loosely-typed upstream
/// value: strings pass through, arrays are newline-joined from their
/// non-empty extractions, objects try a short list of known field names
/// before descending into nested containers.
pub fn extract_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Array(items) => {
            let joined: Vec<String> = items.iter().filter_map(extract_text).collect();
            if joined.is_empty() {
                None
            } else {
                Some(joined.join("\n"))
            }
        }
        Value::Object(map) => {
            for key in ["text", "value", "delta", "summaryText"] {
                if let Some(found) = map.get(key).and_then(extract_text) {
                    return Some(found);
                }
            }
            for key in ["content", "summary", "output"] {
                if let Some(found) = map.get(key).and_then(extract_text) {
                    return Some(found);
                }
            }
            None
        }
        _ => None,
    }
}

/// Extract a list of non-empty summary lines (used for `reasoning` items),
/// trying `summary` then `content` as the source array/value.
pub fn extract_summary_lines(value: &Value) -> Vec<String> {
    let source = value
        .get("summary")
        .or_else(|| value.get("content"))
        .unwrap_or(&Value::Null);
    match source {
        Value::Array(items) => items.iter().filter_map(extract_text).collect(),
        other => extract_text(other).into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_from_plain_string() {
        assert_eq!(extract_text(&json!("  hi  ")), Some("hi".to_string()));
    }

    #[test]
    fn empty_string_yields_none() {
        assert_eq!(extract_text(&json!("   ")), None);
    }

    #[test]
    fn joins_array_of_strings_with_newline() {
        assert_eq!(
            extract_text(&json!(["a", "", "b"])),
            Some("a\nb".to_string())
        );
    }

    #[test]
    fn object_prefers_text_field() {
        assert_eq!(
            extract_text(&json!({"text": "hello", "value": "world"})),
            Some("hello".to_string())
        );
    }

    #[test]
    fn object_falls_back_to_nested_content() {
        assert_eq!(
            extract_text(&json!({"content": [{"text": "nested"}]})),
            Some("nested".to_string())
        );
    }

    #[test]
    fn summary_lines_prefer_summary_over_content() {
        let value = json!({"summary": ["one", "two"], "content": "ignored"});
        assert_eq!(extract_summary_lines(&value), vec!["one", "two"]);
    }
}
