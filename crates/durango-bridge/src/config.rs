use std::env;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable `{0}`")]
    MissingVar(&'static str),
}

/// Bridge identity and endpoints, assembled once from the environment and
/// never mutated afterward.
#[derive(Debug, Clone)]
pub struct Config {
    pub machine_id: String,
    pub user_id: String,
    pub token: String,
    pub relay_url: String,
    pub web_url: String,
    pub agent_listen_url: String,
    pub agent_binary: PathBuf,
    pub codex_version: Option<String>,
    /// Raw JSON array of locally-known project registrations, as produced
    /// by the out-of-scope CLI config loader. `None` if unset.
    pub projects_manifest: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            machine_id: require("DURANGO_MACHINE_ID")?,
            user_id: require("DURANGO_USER_ID")?,
            token: require("DURANGO_TOKEN")?,
            relay_url: env::var("DURANGO_RELAY_URL")
                .unwrap_or_else(|_| "wss://relay.durango.dev/ws".to_string()),
            web_url: env::var("DURANGO_WEB_URL")
                .unwrap_or_else(|_| "https://app.durango.dev".to_string()),
            agent_listen_url: env::var("DURANGO_CODEX_APP_SERVER_URL")
                .unwrap_or_else(|_| "ws://127.0.0.1:48765".to_string()),
            agent_binary: env::var("DURANGO_CODEX_BIN")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("codex")),
            codex_version: env::var("CODEX_VERSION").ok(),
            projects_manifest: env::var("DURANGO_PROJECTS_JSON").ok(),
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVar(name))
}
