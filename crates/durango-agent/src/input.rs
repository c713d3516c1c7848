//! Turn-input construction: prompt text plus on-disk attachment
//! materialization, per the attachment layout
//! `<base>/.durango/uploads/<requestId>/NN-<safeName>`.

use std::path::{Path, PathBuf};

use crate::error::AgentError;
use crate::types::InputItem;

/// One attachment as received in a dispatch payload, before it is written
/// to disk.
#[derive(Debug, Clone)]
pub struct AttachmentSpec {
    pub original_name: String,
    pub kind: AttachmentKind,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    File,
}

/// Sanitize an attachment's original filename: keep `[A-Za-z0-9._-]`,
/// replace everything else with `_`, cap at 120 bytes, default to
/// `"attachment"` if nothing survives.
pub fn sanitize_attachment_name(original: &str) -> String {
    let base = Path::new(original)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(original);

    let sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let truncated: String = sanitized.chars().take(120).collect();
    if truncated.is_empty() {
        "attachment".to_string()
    } else {
        truncated
    }
}

/// Build the on-disk path for the `index`-th (1-indexed) attachment of a
/// dispatch request.
pub fn attachment_path(base: &Path, request_id: &str, index: usize, original_name: &str) -> PathBuf {
    let safe_name = sanitize_attachment_name(original_name);
    let prefixed = format!("{index:02}-{safe_name}");
    base.join(".durango")
        .join("uploads")
        .join(request_id)
        .join(prefixed)
}

/// Write every attachment to disk and build the `turn/start` input list:
/// an optional leading text item for a non-empty trimmed prompt, followed
/// by one item per attachment (`localImage` for images, `mention`
/// otherwise).
pub async fn build_turn_input(
    base: &Path,
    request_id: &str,
    prompt: Option<&str>,
    attachments: &[AttachmentSpec],
) -> Result<Vec<InputItem>, AgentError> {
    let mut items = Vec::new();

    if let Some(trimmed) = prompt.map(str::trim) {
        if !trimmed.is_empty() {
            items.push(InputItem::Text {
                text: trimmed.to_string(),
                text_elements: Vec::new(),
            });
        }
    }

    for (offset, attachment) in attachments.iter().enumerate() {
        let path = attachment_path(base, request_id, offset + 1, &attachment.original_name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| AgentError::Attachment {
                    name: attachment.original_name.clone(),
                    source,
                })?;
        }
        tokio::fs::write(&path, &attachment.bytes)
            .await
            .map_err(|source| AgentError::Attachment {
                name: attachment.original_name.clone(),
                source,
            })?;

        let path_str = path.to_string_lossy().into_owned();
        items.push(match attachment.kind {
            AttachmentKind::Image => InputItem::LocalImage { path: path_str },
            AttachmentKind::File => InputItem::Mention {
                name: attachment.original_name.clone(),
                path: path_str,
            },
        });
    }

    if items.is_empty() {
        return Err(AgentError::EmptyTurnInput);
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_unsafe_characters() {
        assert_eq!(sanitize_attachment_name("my report (final).pdf"), "my_report__final_.pdf");
    }

    #[test]
    fn truncates_to_120_chars() {
        let long = "a".repeat(200);
        assert_eq!(sanitize_attachment_name(&long).len(), 120);
    }

    #[test]
    fn empty_name_defaults_to_attachment() {
        assert_eq!(sanitize_attachment_name("///"), "attachment");
    }

    #[test]
    fn attachment_path_is_zero_padded_and_prefixed() {
        let base = Path::new("/tmp/work");
        let path = attachment_path(base, "req-1", 3, "notes.txt");
        assert_eq!(
            path,
            Path::new("/tmp/work/.durango/uploads/req-1/03-notes.txt")
        );
    }

    #[tokio::test]
    async fn empty_prompt_and_no_attachments_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = build_turn_input(dir.path(), "req-1", Some("   "), &[]).await;
        assert!(matches!(result, Err(AgentError::EmptyTurnInput)));
    }

    #[tokio::test]
    async fn attachment_only_turn_produces_one_local_image_item() {
        let dir = tempfile::tempdir().unwrap();
        let attachments = vec![AttachmentSpec {
            original_name: "photo.png".to_string(),
            kind: AttachmentKind::Image,
            bytes: vec![1, 2, 3],
        }];
        let items = build_turn_input(dir.path(), "req-2", Some(""), &attachments)
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        match &items[0] {
            InputItem::LocalImage { path } => {
                assert!(path.ends_with(".durango/uploads/req-2/01-photo.png"));
                assert!(tokio::fs::metadata(path).await.unwrap().is_file());
            }
            other => panic!("expected LocalImage, got {other:?}"),
        }
    }
}
