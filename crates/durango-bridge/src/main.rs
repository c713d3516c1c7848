mod config;
mod coordinator;
mod error;

use std::sync::Arc;
use std::time::Duration;

use durango_agent::{AgentClient, AgentClientConfig};
use durango_events::{classify_notification, extract_codex_thread_id, ForwardEffect};
use durango_relay::{
    register_projects, ClientMessage, MachineDescriptor, ProjectRegistration, RelayLink,
    ServerMessage, ThreadBindings,
};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use coordinator::Coordinator;

const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(config).await {
        error!(error = %err, "bridge exited with error");
        std::process::exit(1);
    }
}

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error(transparent)]
    Agent(#[from] durango_agent::AgentError),
    #[error(transparent)]
    Relay(#[from] durango_relay::RelayError),
    #[error("fatal session error from relay: {code}: {message}")]
    FatalSession { code: String, message: String },
}

async fn run(config: Config) -> Result<(), RunError> {
    info!("starting agent server");
    let (agent, mut agent_notifications) = AgentClient::start(&AgentClientConfig {
        listen_url: config.agent_listen_url.clone(),
        binary: config.agent_binary.clone(),
        client_name: "durango-bridge".to_string(),
        client_version: CLIENT_VERSION.to_string(),
    })
    .await?;
    let agent = Arc::new(agent);
    info!("agent server ready, dialing relay");

    let (relay, mut relay_messages) = RelayLink::connect(&config.relay_url).await?;
    let relay = Arc::new(relay);

    relay.send(&ClientMessage::MachineHello {
        token: config.token.clone(),
        machine: MachineDescriptor {
            machine_id: config.machine_id.clone(),
            user_id: config.user_id.clone(),
            hostname: hostname(),
            platform: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            os_version: None,
            cli_version: CLIENT_VERSION.to_string(),
            codex_version: config.codex_version.clone(),
        },
    })?;

    let bindings = ThreadBindings::new();
    let coordinator = Coordinator {
        agent: Arc::clone(&agent),
        relay: Arc::clone(&relay),
        bindings: bindings.clone(),
        machine_id: config.machine_id.clone(),
    };

    let mut heartbeat: Option<JoinHandle<()>> = None;
    let mut fatal_session: Option<durango_relay::SessionErrorBody> = None;

    let mut sigterm = unix_sigterm();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received interrupt, tearing down");
                break;
            }
            _ = sigterm.recv() => {
                info!("received terminate signal, tearing down");
                break;
            }
            notification = agent_notifications.recv() => {
                match notification {
                    Some(note) => handle_agent_notification(&relay, &bindings, &config.machine_id, &note.method, &note.params).await,
                    None => {
                        warn!("agent notification stream ended");
                        break;
                    }
                }
            }
            server_message = relay_messages.recv() => {
                match server_message {
                    Some(ServerMessage::SessionReady { machine_id, heartbeat_interval_ms, .. }) => {
                        info!(%machine_id, "relay session ready");
                        heartbeat = Some(relay.spawn_heartbeat(machine_id, Duration::from_millis(heartbeat_interval_ms)));
                        run_sync_bootstrap(&config, &agent, &relay, &bindings).await;
                    }
                    Some(ServerMessage::SessionError { error: err, recoverable }) => {
                        if recoverable {
                            warn!(code = %err.code, message = %err.message, "recoverable session error");
                        } else {
                            error!(code = %err.code, message = %err.message, "fatal session error, tearing down");
                            fatal_session = Some(err);
                            break;
                        }
                    }
                    Some(ServerMessage::DispatchRequest { action }) => {
                        coordinator.handle(action).await;
                    }
                    Some(ServerMessage::Unknown) => {}
                    None => {
                        warn!("relay link ended");
                        break;
                    }
                }
            }
        }
    }

    if let Some(handle) = heartbeat {
        handle.abort();
    }
    agent.shutdown().await;
    relay.shutdown().await;

    match fatal_session {
        Some(err) => Err(RunError::FatalSession {
            code: err.code,
            message: err.message,
        }),
        None => Ok(()),
    }
}

async fn handle_agent_notification(
    relay: &RelayLink,
    bindings: &ThreadBindings,
    machine_id: &str,
    method: &str,
    params: &serde_json::Value,
) {
    let Some(codex_thread_id) = extract_codex_thread_id(params) else {
        return;
    };
    let Some(downstream_thread_id) = bindings.resolve(&codex_thread_id).await else {
        return;
    };

    match classify_notification(method, params) {
        ForwardEffect::ThreadUpdate { title } => {
            let _ = relay.send(&ClientMessage::ThreadUpdate {
                machine_id: machine_id.to_string(),
                thread_id: downstream_thread_id,
                title,
            });
        }
        ForwardEffect::Items(items) => {
            for item in items {
                let _ = relay.send(&ClientMessage::EventUpsert {
                    request_id: item.turn_id().to_string(),
                    machine_id: machine_id.to_string(),
                    thread_id: downstream_thread_id.clone(),
                    run_id: None,
                    item,
                });
            }
        }
        ForwardEffect::None => {}
    }
}

async fn run_sync_bootstrap(
    config: &Config,
    agent: &AgentClient,
    relay: &RelayLink,
    bindings: &ThreadBindings,
) {
    match agent.get_auth_status().await {
        Ok(status) if status.get("authenticated").and_then(serde_json::Value::as_bool) == Some(false) => {
            warn!("agent is unauthenticated, skipping sync bootstrap");
            return;
        }
        Err(err) => {
            warn!(error = %err, "failed to query agent auth status, continuing bootstrap anyway");
        }
        _ => {}
    }

    // Project manifests are read by the out-of-scope CLI config loader;
    // the bridge core only consumes the JSON it was handed.
    let projects: Vec<ProjectRegistration> = match &config.projects_manifest {
        Some(raw) => match durango_relay::parse_project_manifest(raw, &config.machine_id) {
            Ok(projects) => projects,
            Err(err) => {
                warn!(error = %err, "failed to parse project manifest, proceeding with none");
                Vec::new()
            }
        },
        None => Vec::new(),
    };
    let http = reqwest::Client::new();
    let _registered = register_projects(&http, &config.web_url, &config.token, &projects).await;

    let threads = match agent.list_threads(50, 10).await {
        Ok(threads) => threads,
        Err(err) => {
            warn!(error = %err, "thread listing failed, aborting bootstrap");
            return;
        }
    };

    let now = durango_relay::now_ms();
    for thread in threads {
        let (Some(codex_thread_id), Some(cwd)) = (
            thread.get("id").and_then(serde_json::Value::as_str),
            durango_relay::extract_cwd(&thread),
        ) else {
            continue;
        };

        let Some(project) = durango_relay::find_longest_prefix_project(&projects, &cwd) else {
            continue;
        };

        let downstream_id = ThreadBindings::derive_downstream_id(codex_thread_id);
        bindings.bind(codex_thread_id.to_string(), downstream_id.clone()).await;

        let title = durango_relay::title_from_preview(
            thread.get("preview").and_then(serde_json::Value::as_str),
        );

        let created_at = thread
            .get("createdAt")
            .and_then(serde_json::Value::as_f64)
            .map(|raw| durango_relay::normalize_timestamp(raw, now))
            .unwrap_or(now);
        let updated_at = thread
            .get("updatedAt")
            .and_then(serde_json::Value::as_f64)
            .map(|raw| durango_relay::normalize_timestamp(raw, now))
            .unwrap_or(now);

        let _ = relay.send(&ClientMessage::ThreadUpsert {
            machine_id: config.machine_id.clone(),
            thread: durango_relay::ThreadUpsertPayload {
                id: downstream_id,
                project_id: project.id.clone(),
                codex_thread_id: codex_thread_id.to_string(),
                title,
                status: "active".to_string(),
                created_at,
                updated_at,
            },
        });
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown-host".to_string())
}

fn unix_sigterm() -> tokio::signal::unix::Signal {
    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("failed to install SIGTERM handler")
}
