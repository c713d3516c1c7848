use serde::Serialize;

/// The frozen downstream item schema. Every variant carries the common
/// `{id, turn_id, timestamp}` envelope plus its own fields.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum DurangoItem {
    #[serde(rename = "userMessage")]
    UserMessage {
        id: String,
        #[serde(rename = "turnId")]
        turn_id: String,
        timestamp: i64,
        text: String,
    },
    #[serde(rename = "agentMessage")]
    AgentMessage {
        id: String,
        #[serde(rename = "turnId")]
        turn_id: String,
        timestamp: i64,
        text: String,
    },
    #[serde(rename = "reasoning")]
    Reasoning {
        id: String,
        #[serde(rename = "turnId")]
        turn_id: String,
        timestamp: i64,
        summary: Vec<String>,
    },
    #[serde(rename = "commandExecution")]
    CommandExecution {
        id: String,
        #[serde(rename = "turnId")]
        turn_id: String,
        timestamp: i64,
        command: String,
        cwd: Option<String>,
        status: CommandStatus,
        output: Option<String>,
        #[serde(rename = "exitCode")]
        exit_code: Option<i64>,
    },
    #[serde(rename = "fileChange")]
    FileChange {
        id: String,
        #[serde(rename = "turnId")]
        turn_id: String,
        timestamp: i64,
        path: String,
        patch: String,
    },
    #[serde(rename = "plan")]
    Plan {
        id: String,
        #[serde(rename = "turnId")]
        turn_id: String,
        timestamp: i64,
        text: String,
    },
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Running,
    Completed,
    Failed,
}

impl DurangoItem {
    pub fn turn_id(&self) -> &str {
        match self {
            DurangoItem::UserMessage { turn_id, .. }
            | DurangoItem::AgentMessage { turn_id, .. }
            | DurangoItem::Reasoning { turn_id, .. }
            | DurangoItem::CommandExecution { turn_id, .. }
            | DurangoItem::FileChange { turn_id, .. }
            | DurangoItem::Plan { turn_id, .. } => turn_id,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            DurangoItem::UserMessage { timestamp, .. }
            | DurangoItem::AgentMessage { timestamp, .. }
            | DurangoItem::Reasoning { timestamp, .. }
            | DurangoItem::CommandExecution { timestamp, .. }
            | DurangoItem::FileChange { timestamp, .. }
            | DurangoItem::Plan { timestamp, .. } => *timestamp,
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        match &mut self {
            DurangoItem::UserMessage { timestamp: t, .. }
            | DurangoItem::AgentMessage { timestamp: t, .. }
            | DurangoItem::Reasoning { timestamp: t, .. }
            | DurangoItem::CommandExecution { timestamp: t, .. }
            | DurangoItem::FileChange { timestamp: t, .. }
            | DurangoItem::Plan { timestamp: t, .. } => *t = timestamp,
        }
        self
    }
}

pub fn fresh_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
