use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `clientInfo` sent with `initialize`.
#[derive(Debug, Clone, Serialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitializeCapabilities {
    #[serde(rename = "experimentalApi")]
    pub experimental_api: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitializeParams {
    #[serde(rename = "clientInfo")]
    pub client_info: ClientInfo,
    pub capabilities: InitializeCapabilities,
}

/// One item of `turn/start` input. Only `text` and `localImage`/`mention`
/// are produced locally; other kinds (remote image, skill) pass through
/// verbatim from a dispatch payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InputItem {
    #[serde(rename = "text")]
    Text {
        text: String,
        #[serde(default, rename = "text_elements")]
        text_elements: Vec<Value>,
    },
    #[serde(rename = "localImage")]
    LocalImage { path: String },
    #[serde(rename = "mention")]
    Mention { name: String, path: String },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ThreadStartParams {
    pub cwd: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(rename = "approvalPolicy", skip_serializing_if = "Option::is_none")]
    pub approval_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<String>,
    #[serde(rename = "experimentalRawEvents")]
    pub experimental_raw_events: bool,
}

impl ThreadStartParams {
    pub fn new(cwd: impl Into<String>) -> Self {
        Self {
            cwd: cwd.into(),
            model: None,
            approval_policy: Some("never".to_string()),
            sandbox: Some("danger-full-access".to_string()),
            experimental_raw_events: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnStartParams {
    #[serde(rename = "codexThreadId")]
    pub codex_thread_id: String,
    pub input: Vec<InputItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(
        rename = "reasoningEffort",
        skip_serializing_if = "Option::is_none"
    )]
    pub reasoning_effort: Option<String>,
    #[serde(rename = "approvalPolicy", skip_serializing_if = "Option::is_none")]
    pub approval_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    pub items: Vec<Value>,
    #[serde(default)]
    pub cursor: Option<String>,
}
