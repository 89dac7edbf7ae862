//! Transport seam between the engine and a node.
//!
//! A [`Transport`] turns an [`Endpoint`] into a ready [`RpcChannel`]: the
//! socket is open, the login handshake is done and API ids are resolved.
//! The websocket implementation lives in `websocket.rs`; tests plug in
//! scripted implementations.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

use crate::net::connection::Endpoint;

/// Logical API a call is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Api {
    /// Fixed API id 1, used only for the handshake.
    Login,
    Database,
    History,
    NetworkBroadcast,
    Messaging,
}

impl Api {
    /// Name the node registers the API under.
    pub fn name(&self) -> &'static str {
        match self {
            Api::Login => "login",
            Api::Database => "database",
            Api::History => "history",
            Api::NetworkBroadcast => "network_broadcast",
            Api::Messaging => "messaging",
        }
    }

    /// APIs resolved during the handshake.
    pub const RESOLVED: [Api; 4] = [Api::Database, Api::History, Api::NetworkBroadcast, Api::Messaging];
}

impl fmt::Display for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors raised by a channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// Socket-level failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The node answered with an error object.
    #[error("Remote error: {message}")]
    Remote { message: String },

    /// No answer before the call deadline.
    #[error("Call timed out after {0:?}")]
    Timeout(Duration),

    /// Caller cancelled the call.
    #[error("Call cancelled")]
    Cancelled,

    /// Channel was closed while the call was pending.
    #[error("Channel closed")]
    Closed,

    /// The answer did not have the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),
}

/// A connected, multiplexed channel to one node.
#[async_trait]
pub trait RpcChannel: Send + Sync {
    /// Endpoint this channel is connected to.
    fn endpoint(&self) -> &Endpoint;

    /// Call `method` on `api`.
    async fn execute(&self, api: Api, method: &str, params: Vec<Value>) -> Result<Value, RpcError>;

    /// Raw status strings (`open`, `closed`, `reconnect`, `error`).
    fn status(&self) -> watch::Receiver<String>;

    /// Close the socket. Pending calls fail with [`RpcError::Closed`].
    async fn close(&self);
}

/// Factory of connected channels.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to `endpoint` and complete the handshake.
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn RpcChannel>, RpcError>;
}
