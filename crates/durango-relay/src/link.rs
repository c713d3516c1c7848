//! Relay WebSocket client: dial, `machine.hello` handshake, heartbeat, and
//! demultiplex inbound frames into `ServerMessage`s.
//!
//! Grounded on the pack's `docker/ws.rs` adapter: a `tokio::select!` read
//! loop over `WebSocketStream::split()` halves, with a writer task owning
//! the sink so sends never race with the reader.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::RelayError;
use crate::protocol::{ClientMessage, ServerMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct RelayLink {
    write_tx: mpsc::UnboundedSender<Message>,
    tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl RelayLink {
    pub async fn connect(
        url: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ServerMessage>), RelayError> {
        let (stream, _response) =
            tokio_tungstenite::connect_async(url)
                .await
                .map_err(|source| RelayError::Connect {
                    url: url.to_string(),
                    source,
                })?;
        Ok(Self::spawn(stream))
    }

    fn spawn(stream: WsStream) -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (mut sink, mut source) = stream.split();
        let (write_tx, mut write_rx) = mpsc::unbounded_channel::<Message>();
        let (server_tx, server_rx) = mpsc::unbounded_channel::<ServerMessage>();

        let writer = tokio::spawn(async move {
            while let Some(msg) = write_rx.recv().await {
                if let Err(err) = sink.send(msg).await {
                    warn!(error = %err, "relay write failed, closing link");
                    break;
                }
            }
        });

        let reader = tokio::spawn(async move {
            loop {
                match source.next().await {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<Value>(&text) {
                        Ok(value) => match serde_json::from_value::<ServerMessage>(value) {
                            Ok(message) => {
                                let _ = server_tx.send(message);
                            }
                            Err(err) => {
                                warn!(error = %err, frame = %text, "dropping unrecognized relay frame");
                            }
                        },
                        Err(err) => {
                            warn!(error = %err, "dropping malformed relay frame");
                        }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "relay closed the link");
                        break;
                    }
                    Some(Ok(_other)) => {}
                    Some(Err(err)) => {
                        warn!(error = %err, "relay read error, closing link");
                        break;
                    }
                    None => {
                        debug!("relay stream ended");
                        break;
                    }
                }
            }
        });

        (
            Self {
                write_tx,
                tasks: tokio::sync::Mutex::new(vec![writer, reader]),
            },
            server_rx,
        )
    }

    pub fn send(&self, message: &ClientMessage) -> Result<(), RelayError> {
        let text =
            serde_json::to_string(message).map_err(|source| RelayError::Serialize { source })?;
        self.write_tx
            .send(Message::Text(text))
            .map_err(|_| RelayError::LinkClosed)
    }

    /// Spawn a task sending `machine.heartbeat` on `interval` until the
    /// returned handle is aborted. Aborting this handle is how the bridge
    /// "clears the heartbeat timer" during teardown.
    pub fn spawn_heartbeat(&self, machine_id: String, interval: Duration) -> JoinHandle<()> {
        let write_tx = self.write_tx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                let message = ClientMessage::MachineHeartbeat {
                    machine_id: machine_id.clone(),
                    timestamp: now_ms(),
                };
                let Ok(text) = serde_json::to_string(&message) else {
                    continue;
                };
                if write_tx.send(Message::Text(text)).is_err() {
                    break;
                }
            }
        })
    }

    pub async fn shutdown(&self) {
        let _ = self.write_tx.send(Message::Close(None));
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
    }
}

pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
