use durango_events::DurangoItem;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct MachineDescriptor {
    #[serde(rename = "machineId")]
    pub machine_id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub hostname: String,
    pub platform: String,
    pub arch: String,
    #[serde(rename = "osVersion", skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(rename = "cliVersion")]
    pub cli_version: String,
    #[serde(rename = "codexVersion", skip_serializing_if = "Option::is_none")]
    pub codex_version: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "machine.hello")]
    MachineHello {
        token: String,
        machine: MachineDescriptor,
    },
    #[serde(rename = "machine.heartbeat")]
    MachineHeartbeat { #[serde(rename = "machineId")] machine_id: String, timestamp: i64 },
    #[serde(rename = "dispatch.ack")]
    DispatchAck {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(rename = "machineId")]
        machine_id: String,
        status: AckStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<ErrorEnvelope>,
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    #[serde(rename = "event.upsert")]
    EventUpsert {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(rename = "machineId")]
        machine_id: String,
        #[serde(rename = "threadId")]
        thread_id: String,
        #[serde(rename = "runId", skip_serializing_if = "Option::is_none")]
        run_id: Option<String>,
        item: DurangoItem,
    },
    #[serde(rename = "thread.update")]
    ThreadUpdate {
        #[serde(rename = "machineId")]
        machine_id: String,
        #[serde(rename = "threadId")]
        thread_id: String,
        title: String,
    },
    #[serde(rename = "thread.upsert")]
    ThreadUpsert {
        #[serde(rename = "machineId")]
        machine_id: String,
        thread: ThreadUpsertPayload,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreadUpsertPayload {
    pub id: String,
    #[serde(rename = "projectId")]
    pub project_id: String,
    #[serde(rename = "codexThreadId")]
    pub codex_thread_id: String,
    pub title: String,
    pub status: String,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Accepted,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorEnvelope {
    pub fn app_server_error(message: impl Into<String>) -> Self {
        Self {
            code: "APP_SERVER_ERROR".to_string(),
            message: message.into(),
            details: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "session.ready")]
    SessionReady {
        #[serde(rename = "machineId")]
        machine_id: String,
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "heartbeatIntervalMs")]
        heartbeat_interval_ms: u64,
    },
    #[serde(rename = "dispatch.request")]
    DispatchRequest {
        #[serde(flatten)]
        action: DispatchAction,
    },
    #[serde(rename = "session.error")]
    SessionError {
        error: SessionErrorBody,
        recoverable: bool,
    },
    /// Anything the relay sends that the bridge doesn't model yet.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action")]
pub enum DispatchAction {
    #[serde(rename = "thread.start")]
    ThreadStart {
        #[serde(rename = "requestId")]
        request_id: String,
        cwd: String,
        #[serde(default)]
        prompt: Option<String>,
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        attachments: Vec<Value>,
    },
    #[serde(rename = "thread.hydrate")]
    ThreadHydrate {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(rename = "threadId")]
        thread_id: String,
        #[serde(rename = "codexThreadId")]
        codex_thread_id: String,
    },
    #[serde(rename = "turn.start")]
    TurnStart {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(rename = "threadId")]
        thread_id: String,
        #[serde(rename = "codexThreadId")]
        codex_thread_id: String,
        #[serde(default)]
        prompt: Option<String>,
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        attachments: Vec<Value>,
    },
    #[serde(rename = "model.list")]
    ModelList {
        #[serde(rename = "requestId")]
        request_id: String,
    },
    #[serde(rename = "turn.interrupt")]
    TurnInterrupt {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(rename = "codexThreadId")]
        codex_thread_id: String,
    },
}

impl DispatchAction {
    pub fn request_id(&self) -> &str {
        match self {
            DispatchAction::ThreadStart { request_id, .. }
            | DispatchAction::ThreadHydrate { request_id, .. }
            | DispatchAction::TurnStart { request_id, .. }
            | DispatchAction::ModelList { request_id, .. }
            | DispatchAction::TurnInterrupt { request_id, .. } => request_id,
        }
    }
}
