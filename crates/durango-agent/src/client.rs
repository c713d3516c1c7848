use std::path::PathBuf;
use std::time::Duration;

use durango_transport::{JsonRpcTransport, Notification};
use serde_json::{json, Value};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use crate::error::AgentError;
use crate::stderr::{is_benign, normalize_line};
use crate::types::{ClientInfo, InitializeCapabilities, InitializeParams, Page, ThreadStartParams, TurnStartParams};

const PROBE_TIMEOUT: Duration = Duration::from_millis(1500);
const CONNECT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);
const CONNECT_BUDGET: Duration = Duration::from_secs(25);

/// How to reach the local agent server.
pub struct AgentClientConfig {
    pub listen_url: String,
    pub binary: PathBuf,
    pub client_name: String,
    pub client_version: String,
}

/// A started agent server session: transport plus (if the bridge spawned
/// it) the owned child process.
pub struct AgentClient {
    transport: JsonRpcTransport,
    child: Mutex<Option<Child>>,
}

impl AgentClient {
    /// Probe for a pre-existing agent, otherwise spawn one, then complete
    /// the `initialize` handshake.
    pub async fn start(
        config: &AgentClientConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Notification>), AgentError> {
        let (transport, notifications, child) =
            match try_connect_existing(&config.listen_url).await {
                Some((transport, notifications)) => {
                    info!(url = %config.listen_url, "attached to existing agent server");
                    (transport, notifications, None)
                }
                None => {
                    let child = spawn_agent(&config.binary, &config.listen_url)?;
                    let pid = child.id();
                    info!(?pid, binary = %config.binary.display(), "spawned agent server");
                    let ((transport, notifications), child) =
                        connect_with_exit_check(&config.listen_url, child).await?;
                    (transport, notifications, Some(child))
                }
            };

        let client = Self {
            transport,
            child: Mutex::new(child),
        };

        client
            .transport
            .request(
                "initialize",
                json!(InitializeParams {
                    client_info: ClientInfo {
                        name: config.client_name.clone(),
                        version: config.client_version.clone(),
                    },
                    capabilities: InitializeCapabilities {
                        experimental_api: true,
                    },
                }),
            )
            .await?;
        client.transport.notify("initialized", json!({})).await?;

        Ok((client, notifications))
    }

    pub async fn thread_start(&self, params: ThreadStartParams) -> Result<Value, AgentError> {
        Ok(self
            .transport
            .request("thread/start", json!(params))
            .await?)
    }

    pub async fn thread_read(
        &self,
        codex_thread_id: &str,
        include_turns: bool,
    ) -> Result<Value, AgentError> {
        Ok(self
            .transport
            .request(
                "thread/read",
                json!({ "codexThreadId": codex_thread_id, "includeTurns": include_turns }),
            )
            .await?)
    }

    pub async fn turn_start(&self, params: TurnStartParams) -> Result<Value, AgentError> {
        Ok(self.transport.request("turn/start", json!(params)).await?)
    }

    pub async fn turn_interrupt(&self, codex_thread_id: &str) -> Result<(), AgentError> {
        self.transport
            .request(
                "turn/interrupt",
                json!({ "codexThreadId": codex_thread_id }),
            )
            .await?;
        Ok(())
    }

    pub async fn get_auth_status(&self) -> Result<Value, AgentError> {
        Ok(self.transport.request("getAuthStatus", json!({})).await?)
    }

    pub async fn list_threads(
        &self,
        limit: u32,
        max_pages: u32,
    ) -> Result<Vec<Value>, AgentError> {
        self.paginate("thread/list", limit, max_pages).await
    }

    pub async fn list_models(&self, limit: u32, max_pages: u32) -> Result<Vec<Value>, AgentError> {
        self.paginate("model/list", limit, max_pages).await
    }

    async fn paginate(
        &self,
        method: &str,
        limit: u32,
        max_pages: u32,
    ) -> Result<Vec<Value>, AgentError> {
        let limit = clamp_param("limit", limit, 1, 100)?;
        let max_pages = clamp_param("maxPages", max_pages, 1, 20)?;

        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..max_pages {
            let mut params = json!({ "limit": limit });
            if let Some(c) = &cursor {
                params["cursor"] = json!(c);
            }
            let raw = self.transport.request(method, params).await?;
            let page: Page = serde_json::from_value(raw).unwrap_or(Page {
                items: Vec::new(),
                cursor: None,
            });

            if page.items.is_empty() {
                break;
            }
            items.extend(page.items);

            match page.cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(items)
    }

    /// Tear down: close the transport (rejecting pending requests with
    /// "client closed") and SIGTERM any owned child.
    pub async fn shutdown(&self) {
        self.transport.shutdown().await;
        if let Some(mut child) = self.child.lock().await.take() {
            #[cfg(unix)]
            if let Some(pid) = child.id() {
                use nix::sys::signal::{kill, Signal};
                use nix::unistd::Pid;
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
            }
            let _ = child.kill().await;
        }
    }
}

fn clamp_param(name: &'static str, value: u32, min: u32, max: u32) -> Result<u32, AgentError> {
    if value < min || value > max {
        return Err(AgentError::PaginationOutOfRange {
            name,
            min,
            max,
            value,
        });
    }
    Ok(value)
}

async fn try_connect_existing(
    url: &str,
) -> Option<(JsonRpcTransport, mpsc::UnboundedReceiver<Notification>)> {
    match JsonRpcTransport::connect(url, PROBE_TIMEOUT, PROBE_TIMEOUT).await {
        Ok(pair) => Some(pair),
        Err(_) => None,
    }
}

fn spawn_agent(binary: &PathBuf, listen_url: &str) -> Result<Child, AgentError> {
    let mut command = Command::new(binary);
    command
        .arg("app-server")
        .arg("--listen")
        .arg(listen_url)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|source| AgentError::Spawn {
        binary: binary.clone(),
        source,
    })?;

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(tee_filtered_stderr(stderr));
    }
    if let Some(stdout) = child.stdout.take() {
        drop(stdout);
    }

    Ok(child)
}

async fn tee_filtered_stderr(stderr: tokio::process::ChildStderr) {
    use tokio::io::{AsyncBufReadExt, BufReader};
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if is_benign(&line) {
                    continue;
                }
                warn!(line = %normalize_line(&line), "agent stderr");
            }
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "failed reading agent stderr");
                break;
            }
        }
    }
}

async fn connect_with_exit_check(
    url: &str,
    mut child: Child,
) -> Result<
    (
        (JsonRpcTransport, mpsc::UnboundedReceiver<Notification>),
        Child,
    ),
    AgentError,
> {
    let connect = JsonRpcTransport::connect(url, CONNECT_ATTEMPT_TIMEOUT, CONNECT_BUDGET);
    tokio::pin!(connect);

    loop {
        tokio::select! {
            result = &mut connect => {
                let pair = result.map_err(AgentError::Transport)?;
                return Ok((pair, child));
            }
            status = child.wait() => {
                let status = status.map_err(|source| AgentError::Spawn {
                    binary: PathBuf::new(),
                    source,
                })?;
                return Err(AgentError::EarlyExit { status });
            }
        }
    }
}

