//! Newline-agnostic JSON-RPC 2.0 request/response correlation over a single
//! long-lived WebSocket connection.
//!
//! Modeled on the stdio JSON-RPC transport used to talk to a local MCP-style
//! app-server, generalized to a socket transport: a writer task owns the
//! sink half, a reader task owns the stream half and resolves the pending
//! table or forwards notifications, and callers drive everything through
//! `request`/`notify`.

mod error;

pub use error::TransportError;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

/// Default end-to-end timeout for a single `request`.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Default per-attempt connect timeout.
pub const DEFAULT_CONNECT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);
/// Default aggregate connect retry budget.
pub const DEFAULT_CONNECT_BUDGET: Duration = Duration::from_secs(25);

type PendingTable = Arc<Mutex<HashMap<String, oneshot::Sender<Result<Value, TransportError>>>>>;
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A connected JSON-RPC transport and the notification stream paired with it.
pub struct JsonRpcTransport {
    write_tx: mpsc::UnboundedSender<Message>,
    pending: PendingTable,
    id_counter: AtomicU64,
    request_timeout: Duration,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Inbound JSON-RPC notification: `method` present, `id` absent.
#[derive(Debug, Clone)]
pub struct Notification {
    pub method: String,
    pub params: Value,
}

impl JsonRpcTransport {
    /// Dial `url`, retrying individual attempts up to `connect_budget` in
    /// total with `attempt_timeout` per try. Returns the transport plus an
    /// unbounded receiver of inbound notifications.
    pub async fn connect(
        url: &str,
        attempt_timeout: Duration,
        connect_budget: Duration,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Notification>), TransportError> {
        let deadline = tokio::time::Instant::now() + connect_budget;
        let mut last_err: Option<tokio_tungstenite::tungstenite::Error> = None;

        loop {
            if tokio::time::Instant::now() >= deadline {
                return Err(TransportError::ConnectBudgetExhausted {
                    url: url.to_string(),
                    budget: connect_budget,
                });
            }

            match tokio::time::timeout(attempt_timeout, tokio_tungstenite::connect_async(url))
                .await
            {
                Ok(Ok((stream, _response))) => {
                    return Ok(Self::spawn(stream, DEFAULT_REQUEST_TIMEOUT));
                }
                Ok(Err(source)) => {
                    warn!(url, error = %source, "websocket connect attempt failed");
                    last_err = Some(source);
                }
                Err(_elapsed) => {
                    trace!(url, ?attempt_timeout, "websocket connect attempt timed out");
                }
            }

            let _ = &last_err;
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    fn spawn(
        stream: WsStream,
        request_timeout: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (mut sink, mut source) = stream.split();
        let (write_tx, mut write_rx) = mpsc::unbounded_channel::<Message>();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel::<Notification>();
        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));

        let writer_pending = Arc::clone(&pending);
        let writer = tokio::spawn(async move {
            while let Some(msg) = write_rx.recv().await {
                if let Err(err) = sink.send(msg).await {
                    warn!(error = %err, "websocket write failed, closing transport");
                    reject_all(&writer_pending, TransportError::ClientClosed).await;
                    break;
                }
            }
        });

        let reader_pending = Arc::clone(&pending);
        let reader = tokio::spawn(async move {
            loop {
                match source.next().await {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(&reader_pending, &notify_tx, &text).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "websocket closed by peer");
                        break;
                    }
                    Some(Ok(_other)) => {
                        // binary/ping/pong frames carry no JSON-RPC content
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "websocket read error, closing transport");
                        break;
                    }
                    None => {
                        debug!("websocket stream ended");
                        break;
                    }
                }
            }
            reject_all(&reader_pending, TransportError::ClientClosed).await;
        });

        let transport = Self {
            write_tx,
            pending,
            id_counter: AtomicU64::new(1),
            request_timeout,
            tasks: Mutex::new(vec![writer, reader]),
        };
        (transport, notify_rx)
    }

    /// Issue a request and await its matched response, bounded by the
    /// configured request timeout.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let id = self.id_counter.fetch_add(1, Ordering::Relaxed).to_string();
        let frame = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let text = serde_json::to_string(&frame).map_err(|source| TransportError::Serialize {
            method: method.to_string(),
            source,
        })?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        if self.write_tx.send(Message::Text(text)).is_err() {
            self.pending.lock().await.remove(&id);
            return Err(TransportError::ChannelClosed);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_canceled)) => Err(TransportError::ClientClosed),
            Err(_elapsed) => {
                self.pending.lock().await.remove(&id);
                Err(TransportError::RequestTimeout {
                    method: method.to_string(),
                    timeout: self.request_timeout,
                })
            }
        }
    }

    /// Fire a notification (no response expected).
    pub async fn notify(&self, method: &str, params: Value) -> Result<(), TransportError> {
        let frame = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        let text = serde_json::to_string(&frame).map_err(|source| TransportError::Serialize {
            method: method.to_string(),
            source,
        })?;
        self.write_tx
            .send(Message::Text(text))
            .map_err(|_| TransportError::ChannelClosed)
    }

    /// Close the socket and reject every pending request.
    pub async fn shutdown(&self) {
        let _ = self.write_tx.send(Message::Close(None));
        reject_all(&self.pending, TransportError::ClientClosed).await;
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
    }
}

async fn reject_all(pending: &PendingTable, err_factory: TransportError) {
    let mut map = pending.lock().await;
    for (_, tx) in map.drain() {
        let err = match &err_factory {
            TransportError::ClientClosed => TransportError::ClientClosed,
            other => clone_unreachable(other),
        };
        let _ = tx.send(Err(err));
    }
}

// `TransportError` intentionally doesn't derive `Clone` (it wraps non-Clone
// sources); every caller of `reject_all` today only ever passes
// `ClientClosed`, which is a unit variant.
fn clone_unreachable(_other: &TransportError) -> TransportError {
    TransportError::ClientClosed
}

async fn handle_frame(
    pending: &PendingTable,
    notify_tx: &mpsc::UnboundedSender<Notification>,
    text: &str,
) {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(err) => {
            warn!(error = %err, "dropping malformed JSON-RPC frame");
            return;
        }
    };

    let Some(obj) = value.as_object() else {
        warn!("dropping non-object JSON-RPC frame");
        return;
    };

    if let Some(id) = obj.get("id") {
        // Response: id present, with or without the `jsonrpc` marker.
        let id_key = match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let resolver = pending.lock().await.remove(&id_key);
        let Some(resolver) = resolver else {
            trace!(id = %id_key, "response for unknown or already-settled request id");
            return;
        };
        if let Some(error) = obj.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(-1);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            let _ = resolver.send(Err(TransportError::Rpc {
                method: String::new(),
                code,
                message,
            }));
        } else {
            let result = obj.get("result").cloned().unwrap_or(Value::Null);
            let _ = resolver.send(Ok(result));
        }
        return;
    }

    if let Some(method) = obj.get("method").and_then(Value::as_str) {
        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        let _ = notify_tx.send(Notification {
            method: method.to_string(),
            params,
        });
        return;
    }

    warn!("dropping JSON-RPC frame with neither id nor method");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn response_without_jsonrpc_marker_resolves_pending_entry() {
        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));
        let (tx, rx) = oneshot::channel();
        pending.lock().await.insert("1".to_string(), tx);
        let (notify_tx, _notify_rx) = mpsc::unbounded_channel();

        handle_frame(&pending, &notify_tx, r#"{"id":"1","result":{"ok":true}}"#).await;

        let result = rx.await.unwrap().unwrap();
        assert_eq!(result, json!({"ok": true}));
        assert!(pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn error_response_rejects_with_code_and_message() {
        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));
        let (tx, rx) = oneshot::channel();
        pending.lock().await.insert("7".to_string(), tx);
        let (notify_tx, _notify_rx) = mpsc::unbounded_channel();

        handle_frame(
            &pending,
            &notify_tx,
            r#"{"jsonrpc":"2.0","id":"7","error":{"code":-32800,"message":"cancelled"}}"#,
        )
        .await;

        match rx.await.unwrap() {
            Err(TransportError::Rpc { code, message, .. }) => {
                assert_eq!(code, -32800);
                assert_eq!(message, "cancelled");
            }
            other => panic!("expected Rpc error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn notification_with_no_id_is_forwarded() {
        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));
        let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();

        handle_frame(
            &pending,
            &notify_tx,
            r#"{"method":"notifications/thread.started","params":{"threadId":"t1"}}"#,
        )
        .await;

        let note = notify_rx.try_recv().unwrap();
        assert_eq!(note.method, "notifications/thread.started");
        assert_eq!(note.params["threadId"], "t1");
    }

    #[tokio::test]
    async fn frame_with_neither_id_nor_method_is_dropped_silently() {
        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));
        let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();

        handle_frame(&pending, &notify_tx, r#"{"foo":"bar"}"#).await;

        assert!(notify_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn malformed_json_is_dropped_without_panicking() {
        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));
        let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();

        handle_frame(&pending, &notify_tx, "{not-json}").await;

        assert!(notify_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn response_for_unknown_id_does_not_panic() {
        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));
        let (notify_tx, _notify_rx) = mpsc::unbounded_channel();

        handle_frame(&pending, &notify_tx, r#"{"id":"missing","result":null}"#).await;
    }
}
