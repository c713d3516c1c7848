//! Dispatch Coordinator: the per-`dispatch.request` state machine. Always
//! emits `accepted` first; any error anywhere in the body becomes a
//! terminal `failed` ack rather than propagating.

use std::path::PathBuf;
use std::sync::Arc;

use base64::Engine;
use durango_agent::input::{build_turn_input, AttachmentKind, AttachmentSpec};
use durango_agent::{AgentClient, ThreadStartParams, TurnStartParams};
use durango_relay::{AckStatus, ClientMessage, DispatchAction, ErrorEnvelope, RelayLink, ThreadBindings};
use serde_json::{json, Value};
use tracing::warn;

use crate::error::DispatchError;

pub struct Coordinator {
    pub agent: Arc<AgentClient>,
    pub relay: Arc<RelayLink>,
    pub bindings: ThreadBindings,
    pub machine_id: String,
}

impl Coordinator {
    pub async fn handle(&self, action: DispatchAction) {
        let request_id = action.request_id().to_string();
        self.ack(&request_id, AckStatus::Accepted, None, None);

        match self.run(&request_id, action).await {
            Ok(payload) => self.ack(&request_id, AckStatus::Completed, None, Some(payload)),
            Err(err) => {
                warn!(request_id = %request_id, error = %err, "dispatch action failed");
                self.ack(
                    &request_id,
                    AckStatus::Failed,
                    Some(ErrorEnvelope::app_server_error(err.to_string())),
                    None,
                );
            }
        }
    }

    async fn run(&self, request_id: &str, action: DispatchAction) -> Result<Value, DispatchError> {
        match action {
            DispatchAction::ThreadStart {
                cwd,
                prompt,
                model,
                attachments,
                ..
            } => {
                self.ack(request_id, AckStatus::Running, None, None);
                let thread = self
                    .agent
                    .thread_start(ThreadStartParams {
                        model: model.clone(),
                        ..ThreadStartParams::new(&cwd)
                    })
                    .await?;
                let codex_thread_id = thread
                    .get("codexThreadId")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let downstream_id = ThreadBindings::derive_downstream_id(&codex_thread_id);
                self.bindings.bind(codex_thread_id.clone(), downstream_id).await;

                let input = build_turn_input(
                    &PathBuf::from(&cwd),
                    request_id,
                    prompt.as_deref(),
                    &parse_attachments(&attachments),
                )
                .await?;

                self.agent
                    .turn_start(TurnStartParams {
                        codex_thread_id: codex_thread_id.clone(),
                        input,
                        model,
                        reasoning_effort: None,
                        approval_policy: None,
                        sandbox: None,
                    })
                    .await?;

                Ok(json!({ "codexThreadId": codex_thread_id, "state": "started" }))
            }

            DispatchAction::ThreadHydrate {
                thread_id,
                codex_thread_id,
                ..
            } => {
                self.ack(request_id, AckStatus::Running, None, None);
                self.bindings
                    .bind(codex_thread_id.clone(), thread_id.clone())
                    .await;

                let response = self.agent.thread_read(&codex_thread_id, true).await?;
                let result = durango_events::hydrate(&response, durango_relay::now_ms());

                for item in result.items {
                    self.relay_send(ClientMessage::EventUpsert {
                        request_id: item.turn_id().to_string(),
                        machine_id: self.machine_id.clone(),
                        thread_id: thread_id.clone(),
                        run_id: None,
                        item,
                    });
                }

                Ok(json!({
                    "state": "hydrated",
                    "importedItemCount": result.imported_item_count,
                }))
            }

            DispatchAction::TurnStart {
                thread_id,
                codex_thread_id,
                prompt,
                model,
                attachments,
                ..
            } => {
                self.ack(request_id, AckStatus::Running, None, None);
                self.bindings
                    .bind(codex_thread_id.clone(), thread_id.clone())
                    .await;

                let input = build_turn_input(
                    &std::env::temp_dir(),
                    request_id,
                    prompt.as_deref(),
                    &parse_attachments(&attachments),
                )
                .await?;

                self.agent
                    .turn_start(TurnStartParams {
                        codex_thread_id,
                        input,
                        model,
                        reasoning_effort: None,
                        approval_policy: None,
                        sandbox: None,
                    })
                    .await?;

                Ok(json!({ "state": "started" }))
            }

            DispatchAction::ModelList { .. } => {
                self.ack(request_id, AckStatus::Running, None, None);
                let models = self.agent.list_models(50, 10).await?;
                Ok(json!({ "models": models }))
            }

            DispatchAction::TurnInterrupt {
                codex_thread_id, ..
            } => {
                self.ack(request_id, AckStatus::Running, None, None);
                self.agent.turn_interrupt(&codex_thread_id).await?;
                Ok(json!({ "state": "interrupted" }))
            }
        }
    }

    fn ack(
        &self,
        request_id: &str,
        status: AckStatus,
        error: Option<ErrorEnvelope>,
        payload: Option<Value>,
    ) {
        self.relay_send(ClientMessage::DispatchAck {
            request_id: request_id.to_string(),
            machine_id: self.machine_id.clone(),
            status,
            error,
            payload,
        });
    }

    fn relay_send(&self, message: ClientMessage) {
        if let Err(err) = self.relay.send(&message) {
            warn!(error = %err, "failed to send client message to relay");
        }
    }
}

fn parse_attachments(raw: &[Value]) -> Vec<AttachmentSpec> {
    raw.iter()
        .filter_map(|value| {
            let name = value.get("name").and_then(Value::as_str)?.to_string();
            let kind = match value.get("kind").and_then(Value::as_str) {
                Some("image") => AttachmentKind::Image,
                _ => AttachmentKind::File,
            };
            let data = value.get("dataBase64").and_then(Value::as_str)?;
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(data)
                .ok()?;
            Some(AttachmentSpec {
                original_name: name,
                kind,
                bytes,
            })
        })
        .collect()
}
