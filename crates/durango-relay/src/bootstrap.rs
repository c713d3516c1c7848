//! Sync Bootstrap: push locally-known project registrations, then bind
//! discovered agent threads to projects by longest-path-prefix match.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::RelayError;

#[derive(Debug, Clone, Serialize)]
pub struct ProjectRegistration {
    pub id: String,
    #[serde(rename = "machineId")]
    pub machine_id: String,
    #[serde(rename = "absolutePath")]
    pub absolute_path: String,
    pub name: String,
    #[serde(rename = "gitBranch", skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(rename = "gitRemoteUrl", skip_serializing_if = "Option::is_none")]
    pub git_remote_url: Option<String>,
}

/// POST every project registration to the relay, logging one summary
/// diagnostic with the success count. A single project's failure never
/// aborts the rest.
pub async fn register_projects(
    client: &reqwest::Client,
    relay_base_url: &str,
    token: &str,
    projects: &[ProjectRegistration],
) -> usize {
    let mut succeeded = 0usize;
    let url = format!("{}/v1/projects/register", relay_base_url.trim_end_matches('/'));

    for project in projects {
        let result = client
            .post(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "project": project }))
            .send()
            .await;

        let outcome: Result<(), RelayError> = match result {
            Ok(response) if response.status().is_success() => Ok(()),
            Ok(response) => Err(RelayError::RegisterRejected {
                status: response.status().as_u16(),
            }),
            Err(source) => Err(RelayError::Http { source }),
        };

        match outcome {
            Ok(()) => succeeded += 1,
            Err(err) => {
                warn!(project = %project.absolute_path, error = %err, "project registration failed");
            }
        }
    }

    info!(
        total = projects.len(),
        succeeded, "completed project registration sync"
    );
    succeeded
}

/// Normalize a path for prefix comparison: absolute, with `.`/`..`
/// components resolved lexically and trailing separators stripped.
fn normalize_path(path: &str) -> PathBuf {
    let mut out = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Find the project whose absolute path is the longest parent of `cwd`
/// (equal path, or followed by the OS separator). Returns the matching
/// project's index into `projects`.
pub fn find_longest_prefix_project<'a>(
    projects: &'a [ProjectRegistration],
    cwd: &str,
) -> Option<&'a ProjectRegistration> {
    let target = normalize_path(cwd);
    projects
        .iter()
        .filter(|project| {
            let candidate = normalize_path(&project.absolute_path);
            candidate == target || target.starts_with(&candidate)
        })
        .max_by_key(|project| normalize_path(&project.absolute_path).components().count())
}

/// Derive a thread title from an agent-reported preview: first non-empty
/// line, whitespace-collapsed, capped at 120 characters.
pub fn title_from_preview(preview: Option<&str>) -> String {
    let default = "Imported Codex thread";
    let Some(preview) = preview else {
        return default.to_string();
    };
    let first_line = preview
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty());
    match first_line {
        Some(line) => {
            let collapsed: String = line.split_whitespace().collect::<Vec<_>>().join(" ");
            collapsed.chars().take(120).collect()
        }
        None => default.to_string(),
    }
}

/// Normalize a raw upstream timestamp: non-finite or non-positive values
/// become `now_ms`; values under 10^12 are treated as seconds and scaled
/// to milliseconds; larger values are assumed to already be milliseconds.
pub fn normalize_timestamp(raw: f64, now_ms: i64) -> i64 {
    if !raw.is_finite() || raw <= 0.0 {
        return now_ms;
    }
    if raw < 1_000_000_000_000.0 {
        (raw * 1000.0).round() as i64
    } else {
        raw.round() as i64
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ProjectManifestEntry {
    id: String,
    #[serde(rename = "absolutePath")]
    absolute_path: String,
    name: String,
    #[serde(rename = "gitBranch", default)]
    git_branch: Option<String>,
    #[serde(rename = "gitRemoteUrl", default)]
    git_remote_url: Option<String>,
}

/// Parse the locally-known project manifest (a JSON array of
/// `{id, absolutePath, name, gitBranch?, gitRemoteUrl?}` entries) into
/// registrations for this machine. The on-disk CLI config file this would
/// otherwise come from is out of scope; the core only consumes the JSON
/// it was handed.
pub fn parse_project_manifest(
    raw: &str,
    machine_id: &str,
) -> Result<Vec<ProjectRegistration>, serde_json::Error> {
    let entries: Vec<ProjectManifestEntry> = serde_json::from_str(raw)?;
    Ok(entries
        .into_iter()
        .map(|entry| ProjectRegistration {
            id: entry.id,
            machine_id: machine_id.to_string(),
            absolute_path: entry.absolute_path,
            name: entry.name,
            git_branch: entry.git_branch,
            git_remote_url: entry.git_remote_url,
        })
        .collect())
}

/// Pull a `cwd` field out of an agent thread summary object, trying the
/// field-name aliases the upstream uses inconsistently.
pub fn extract_cwd(thread: &Value) -> Option<String> {
    thread
        .get("cwd")
        .or_else(|| thread.get("workingDirectory"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(path: &str) -> ProjectRegistration {
        ProjectRegistration {
            id: path.to_string(),
            machine_id: "m1".to_string(),
            absolute_path: path.to_string(),
            name: path.to_string(),
            git_branch: None,
            git_remote_url: None,
        }
    }

    #[test]
    fn binds_to_longest_matching_prefix() {
        let projects = vec![project("/a"), project("/a/b")];
        let found = find_longest_prefix_project(&projects, "/a/b/c").unwrap();
        assert_eq!(found.absolute_path, "/a/b");

        let found = find_longest_prefix_project(&projects, "/a/x").unwrap();
        assert_eq!(found.absolute_path, "/a");

        assert!(find_longest_prefix_project(&projects, "/other").is_none());
    }

    #[test]
    fn exact_path_match_counts_as_prefix() {
        let projects = vec![project("/a/b")];
        let found = find_longest_prefix_project(&projects, "/a/b").unwrap();
        assert_eq!(found.absolute_path, "/a/b");
    }

    #[test]
    fn sibling_with_shared_string_prefix_does_not_match() {
        let projects = vec![project("/a/b")];
        assert!(find_longest_prefix_project(&projects, "/a/backup").is_none());
    }

    #[test]
    fn title_uses_first_nonempty_line_collapsed() {
        assert_eq!(
            title_from_preview(Some("\n  fix   the   bug  \nsecond line")),
            "fix the bug"
        );
    }

    #[test]
    fn title_defaults_when_preview_absent_or_blank() {
        assert_eq!(title_from_preview(None), "Imported Codex thread");
        assert_eq!(title_from_preview(Some("   \n   ")), "Imported Codex thread");
    }

    #[test]
    fn timestamp_seconds_are_scaled_to_millis() {
        assert_eq!(normalize_timestamp(1_700_000_000.0, 0), 1_700_000_000_000);
    }

    #[test]
    fn timestamp_millis_pass_through() {
        assert_eq!(normalize_timestamp(1_700_000_000_000.0, 0), 1_700_000_000_000);
    }

    #[test]
    fn timestamp_is_idempotent_once_in_millis() {
        let once = normalize_timestamp(1_700_000_000.0, 0);
        let twice = normalize_timestamp(once as f64, 0);
        assert_eq!(once, twice);
    }

    #[test]
    fn nonpositive_timestamp_falls_back_to_now() {
        assert_eq!(normalize_timestamp(-5.0, 42), 42);
        assert_eq!(normalize_timestamp(f64::NAN, 42), 42);
    }

    #[test]
    fn parses_project_manifest_and_fills_in_machine_id() {
        let raw = r#"[{"id":"proj-1","absolutePath":"/a/b","name":"b"}]"#;
        let projects = parse_project_manifest(raw, "machine-1").unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].machine_id, "machine-1");
        assert_eq!(projects[0].absolute_path, "/a/b");
        assert!(projects[0].git_branch.is_none());
    }

    #[test]
    fn rejects_malformed_project_manifest() {
        assert!(parse_project_manifest("not json", "machine-1").is_err());
    }
}
