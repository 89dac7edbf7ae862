//! Websocket JSON-RPC transport.
//!
//! # Wire format
//! ```text
//! request:  {"id": 7, "method": "call", "params": [api_id, "get_chain_id", []]}
//! response: {"id": 7, "result": ...} | {"id": 7, "error": {"message": ...}}
//! notice:   {"method": "notice", "params": [...]}   (ignored)
//! ```
//!
//! # Handshake
//! 1. `call(1, "login", ["", ""])`
//! 2. `call(1, <api name>, [])` for every resolved API, yielding its id
//! 3. `get_chain_id` on the database API as a liveness check
//!
//! # Design Decisions
//! - One reader task and one writer task per socket
//! - Responses are matched by id through a concurrent pending map, so any
//!   number of calls can be in flight on one socket
//! - Socket close or error fails every pending call, and any call made
//!   afterwards fails immediately with `Closed`

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::net::connection::Endpoint;
use crate::net::transport::{Api, RpcChannel, RpcError, Transport};

const LOGIN_API_ID: u64 = 1;

type PendingMap = DashMap<u64, oneshot::Sender<Result<Value, RpcError>>>;

/// Opens [`WsChannel`]s with `tokio-tungstenite`.
#[derive(Debug, Clone, Default)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn RpcChannel>, RpcError> {
        let channel = WsChannel::open(endpoint.clone()).await?;
        Ok(Arc::new(channel))
    }
}

/// One websocket connection to a node, after the handshake.
pub struct WsChannel {
    endpoint: Endpoint,
    next_id: AtomicU64,
    pending: Arc<PendingMap>,
    closed: Arc<AtomicBool>,
    outgoing: mpsc::UnboundedSender<Message>,
    status_tx: Arc<watch::Sender<String>>,
    api_ids: HashMap<Api, u64>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl WsChannel {
    /// Connect to `endpoint` and run the handshake.
    pub async fn open(endpoint: Endpoint) -> Result<Self, RpcError> {
        let (socket, _response) = tokio_tungstenite::connect_async(endpoint.as_str())
            .await
            .map_err(|e| RpcError::Transport(format!("Websocket connect failed: {}", e)))?;
        let (mut sink, mut stream) = socket.split();

        let pending: Arc<PendingMap> = Arc::new(DashMap::new());
        let closed = Arc::new(AtomicBool::new(false));
        let (status_tx, _) = watch::channel("open".to_string());
        let status_tx = Arc::new(status_tx);
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();

        let writer_pending = Arc::clone(&pending);
        let writer_closed = Arc::clone(&closed);
        let writer_endpoint = endpoint.clone();
        let writer = tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = sink.send(message).await {
                    tracing::warn!(endpoint = %writer_endpoint, error = %e, "Websocket write failed");
                    writer_closed.store(true, Ordering::SeqCst);
                    fail_pending(&writer_pending, RpcError::Closed);
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader_pending = Arc::clone(&pending);
        let reader_status = Arc::clone(&status_tx);
        let reader_closed = Arc::clone(&closed);
        let reader_endpoint = endpoint.clone();
        let reader = tokio::spawn(async move {
            let final_status = loop {
                match stream.next().await {
                    Some(Ok(Message::Text(text))) => dispatch(&reader_pending, &text),
                    Some(Ok(Message::Close(_))) | None => break "closed",
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::warn!(endpoint = %reader_endpoint, error = %e, "Websocket read failed");
                        break "error";
                    }
                }
            };
            reader_closed.store(true, Ordering::SeqCst);
            reader_status.send_replace(final_status.to_string());
            fail_pending(&reader_pending, RpcError::Closed);
            tracing::debug!(endpoint = %reader_endpoint, status = final_status, "Websocket reader stopped");
        });

        let mut channel = Self {
            endpoint,
            next_id: AtomicU64::new(1),
            pending,
            closed,
            outgoing,
            status_tx,
            api_ids: HashMap::new(),
            reader,
            writer,
        };
        channel.handshake().await?;
        Ok(channel)
    }

    async fn handshake(&mut self) -> Result<(), RpcError> {
        let login = self
            .call(LOGIN_API_ID, "login", vec![json!(""), json!("")])
            .await?;
        if login != Value::Bool(true) {
            return Err(RpcError::Remote {
                message: format!("Login refused: {}", login),
            });
        }

        for api in Api::RESOLVED {
            match self.call(LOGIN_API_ID, api.name(), Vec::new()).await {
                Ok(id) => {
                    let id = id.as_u64().ok_or_else(|| {
                        RpcError::Decode(format!("API id for {} is not an integer: {}", api, id))
                    })?;
                    self.api_ids.insert(api, id);
                }
                // Nodes without the messaging plugin still serve everything else.
                Err(RpcError::Remote { message }) if api == Api::Messaging => {
                    tracing::warn!(endpoint = %self.endpoint, reason = %message, "Messaging API unavailable");
                }
                Err(e) => return Err(e),
            }
        }

        let chain_id = self.execute(Api::Database, "get_chain_id", Vec::new()).await?;
        tracing::debug!(endpoint = %self.endpoint, chain_id = %chain_id, "Handshake complete");
        Ok(())
    }

    async fn call(&self, api_id: u64, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };
        // Checked after the insert: a reader that stopped earlier will not drain this entry.
        if self.closed.load(Ordering::SeqCst) {
            return Err(RpcError::Closed);
        }

        let request = json!({
            "id": id,
            "method": "call",
            "params": [api_id, method, params],
        });
        tracing::trace!(endpoint = %self.endpoint, id, method, "RPC request");
        self.outgoing
            .send(Message::Text(request.to_string().into()))
            .map_err(|_| RpcError::Closed)?;

        rx.await.map_err(|_| RpcError::Closed)?
    }
}

#[async_trait]
impl RpcChannel for WsChannel {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn execute(&self, api: Api, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let api_id = match api {
            Api::Login => LOGIN_API_ID,
            other => *self
                .api_ids
                .get(&other)
                .ok_or_else(|| RpcError::Transport(format!("{} API is not available", other)))?,
        };
        self.call(api_id, method, params).await
    }

    fn status(&self) -> watch::Receiver<String> {
        self.status_tx.subscribe()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let _ = self.outgoing.send(Message::Close(None));
        self.status_tx.send_replace("closed".to_string());
        fail_pending(&self.pending, RpcError::Closed);
        tracing::debug!(endpoint = %self.endpoint, "Websocket closed");
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Removes an abandoned request (timeout, cancellation) from the pending map.
struct PendingGuard<'a> {
    pending: &'a PendingMap,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}

/// Route one incoming frame to its waiting caller.
fn dispatch(pending: &PendingMap, text: &str) {
    let frame: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "Dropping malformed frame");
            return;
        }
    };
    if frame.get("method").and_then(Value::as_str) == Some("notice") {
        tracing::trace!("Ignoring notice");
        return;
    }
    let Some(id) = frame.get("id").and_then(Value::as_u64) else {
        tracing::debug!("Dropping frame without id");
        return;
    };
    let Some((_, waiter)) = pending.remove(&id) else {
        tracing::debug!(id, "No caller waiting for response");
        return;
    };

    let result = match frame.get("error") {
        Some(error) => Err(RpcError::Remote {
            message: error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
        }),
        None => Ok(frame.get("result").cloned().unwrap_or(Value::Null)),
    };
    let _ = waiter.send(result);
}

fn fail_pending(pending: &PendingMap, error: RpcError) {
    let ids: Vec<u64> = pending.iter().map(|entry| *entry.key()).collect();
    for id in ids {
        if let Some((_, waiter)) = pending.remove(&id) {
            let _ = waiter.send(Err(error.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_result_and_error() {
        let pending = PendingMap::new();
        let (tx1, mut rx1) = oneshot::channel();
        let (tx2, mut rx2) = oneshot::channel();
        pending.insert(1, tx1);
        pending.insert(2, tx2);

        dispatch(&pending, r#"{"id":1,"result":{"head_block_number":5}}"#);
        dispatch(&pending, r#"{"id":2,"error":{"message":"bad op"}}"#);

        assert_eq!(
            rx1.try_recv().unwrap(),
            Ok(json!({"head_block_number": 5}))
        );
        assert_eq!(
            rx2.try_recv().unwrap(),
            Err(RpcError::Remote {
                message: "bad op".into()
            })
        );
        assert!(pending.is_empty());
    }

    #[test]
    fn test_dispatch_ignores_notice_and_garbage() {
        let pending = PendingMap::new();
        let (tx, mut rx) = oneshot::channel();
        pending.insert(3, tx);

        dispatch(&pending, r#"{"method":"notice","params":[1,[]]}"#);
        dispatch(&pending, "not json");
        dispatch(&pending, r#"{"id":99,"result":null}"#);

        assert!(rx.try_recv().is_err());
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_fail_pending_drains_map() {
        let pending = PendingMap::new();
        let (tx, mut rx) = oneshot::channel();
        pending.insert(4, tx);

        fail_pending(&pending, RpcError::Closed);
        assert_eq!(rx.try_recv().unwrap(), Err(RpcError::Closed));
        assert!(pending.is_empty());
    }
}
