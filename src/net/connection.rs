//! Endpoints and the normalized connection state.
//!
//! # Responsibilities
//! - Parse and hold node endpoint URLs
//! - Normalize the transport's raw status strings into [`ConnectionState`]
//! - Track state changes through a watch channel (single writer, many readers)

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::DcoreError;

/// A node websocket endpoint (`ws://` or `wss://`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(url::Url);

impl Endpoint {
    pub fn parse(raw: &str) -> Result<Self, DcoreError> {
        let url: url::Url = raw
            .trim()
            .parse()
            .map_err(|e| DcoreError::Config(format!("Invalid endpoint '{}': {}", raw, e)))?;
        match url.scheme() {
            "ws" | "wss" => Ok(Self(url)),
            other => Err(DcoreError::Config(format!(
                "Endpoint '{}' has unsupported scheme '{}'",
                raw, other
            ))),
        }
    }

    pub fn url(&self) -> &url::Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl FromStr for Endpoint {
    type Err = DcoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Connection state as seen by consumers of the shared channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Socket is open and the handshake completed.
    Open = 0,
    /// Socket is closed.
    Closed = 1,
    /// Transport is re-establishing the socket.
    Reconnect = 2,
    /// Transport reported an error.
    Error = 3,
    /// Transport reported a status this client does not know.
    Unknown = 4,
}

impl ConnectionState {
    /// Normalize a raw transport status. Unrecognized strings map to `Unknown`.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "open" => ConnectionState::Open,
            "closed" => ConnectionState::Closed,
            "reconnect" => ConnectionState::Reconnect,
            "error" => ConnectionState::Error,
            _ => ConnectionState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
            ConnectionState::Reconnect => "reconnect",
            ConnectionState::Error => "error",
            ConnectionState::Unknown => "unknown",
        }
    }
}

impl From<u8> for ConnectionState {
    fn from(value: u8) -> Self {
        match value {
            0 => ConnectionState::Open,
            1 => ConnectionState::Closed,
            2 => ConnectionState::Reconnect,
            3 => ConnectionState::Error,
            _ => ConnectionState::Unknown,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback invoked on every state change of the winning channel.
pub type StatusCallback = Arc<dyn Fn(ConnectionState) + Send + Sync>;

/// Single-writer state cell; readers subscribe through [`StateTracker::subscribe`].
#[derive(Clone)]
pub struct StateTracker {
    tx: Arc<watch::Sender<ConnectionState>>,
    callback: Option<StatusCallback>,
}

impl StateTracker {
    pub fn new(callback: Option<StatusCallback>) -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::Closed);
        Self {
            tx: Arc::new(tx),
            callback,
        }
    }

    pub fn current(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }

    /// Publish `raw` as a normalized state and notify the callback.
    pub fn publish_raw(&self, raw: &str) -> ConnectionState {
        let state = ConnectionState::from_raw(raw);
        self.publish(state);
        state
    }

    pub fn publish(&self, state: ConnectionState) {
        self.tx.send_replace(state);
        crate::observability::metrics::record_connection_state(state);
        if let Some(callback) = &self.callback {
            callback(state);
        }
    }
}

impl fmt::Debug for StateTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateTracker")
            .field("state", &self.current())
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}
