//! Endpoint racing and the shared connection.
//!
//! # Responsibilities
//! - Race a connection attempt against every endpoint of the set
//! - Memoize the winner (or the aggregated failure) for every caller
//! - Close losers that finished their handshake after the winner
//! - Forward the winner's raw status into [`ConnectionState`]
//!
//! # Design Decisions
//! - No retry of the whole race: a failed race stays failed for this manager
//! - The winner's status forwarder is the only writer of the state

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, OnceCell};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::config::schema::NetworkConfig;
use crate::error::{DcoreError, DcoreResult, EndpointFailure};
use crate::net::connection::{ConnectionState, Endpoint, StateTracker, StatusCallback};
use crate::net::rpc::RpcClient;
use crate::net::transport::{RpcChannel, RpcError, Transport};
use crate::observability::metrics;
use crate::resilience::timeouts::{with_deadline, DeadlineError};

/// Default deadline of a single connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default deadline of a single RPC call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of one connection attempt task.
type Attempt = (Endpoint, Result<Result<Arc<dyn RpcChannel>, RpcError>, DeadlineError>);

/// Owns the redundant endpoint set of one logical network.
pub struct ConnectionManager {
    endpoints: Vec<Endpoint>,
    transport: Arc<dyn Transport>,
    connect_timeout: Duration,
    call_timeout: Duration,
    cancel: CancellationToken,
    state: StateTracker,
    connection: OnceCell<DcoreResult<RpcClient>>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    pub fn new(endpoints: Vec<Endpoint>, transport: Arc<dyn Transport>) -> Self {
        Self {
            endpoints,
            transport,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            cancel: CancellationToken::new(),
            state: StateTracker::new(None),
            connection: OnceCell::new(),
            forwarder: Mutex::new(None),
        }
    }

    /// Build from the `[network]` config section.
    pub fn from_config(config: &NetworkConfig, transport: Arc<dyn Transport>) -> DcoreResult<Self> {
        let endpoints = config
            .endpoints
            .iter()
            .map(|raw| Endpoint::parse(raw))
            .collect::<DcoreResult<Vec<_>>>()?;
        Ok(Self::new(endpoints, transport).with_timeouts(
            Duration::from_secs(config.connect_timeout_secs),
            Duration::from_secs(config.call_timeout_secs),
        ))
    }

    pub fn with_timeouts(mut self, connect: Duration, call: Duration) -> Self {
        self.connect_timeout = connect;
        self.call_timeout = call;
        self
    }

    /// Invoke `callback` on every state change of the winning channel.
    pub fn with_status_callback(mut self, callback: StatusCallback) -> Self {
        self.state = StateTracker::new(Some(callback));
        self
    }

    /// Tie connection attempts and calls to `token`.
    pub fn with_cancellation(mut self, token: &CancellationToken) -> Self {
        self.cancel = token.child_token();
        self
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn state(&self) -> ConnectionState {
        self.state.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// True once a race has been won.
    pub fn is_connected(&self) -> bool {
        matches!(self.connection.get(), Some(Ok(_)))
    }

    /// The shared connection.
    ///
    /// The first call starts the race; concurrent and later calls wait on
    /// and receive the same outcome.
    pub async fn connect(&self) -> DcoreResult<RpcClient> {
        self.connection
            .get_or_init(|| self.race())
            .await
            .clone()
    }

    /// Close the shared channel, if any, and stop the status forwarder.
    pub async fn shutdown(&self) {
        if let Some(Ok(client)) = self.connection.get() {
            client.close().await;
        }
        self.cancel.cancel();
        self.state.publish(ConnectionState::Closed);
        if let Ok(mut guard) = self.forwarder.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }

    async fn race(&self) -> DcoreResult<RpcClient> {
        if self.endpoints.is_empty() {
            return Err(DcoreError::ConnectionFailed(Vec::new()));
        }
        tracing::info!(endpoints = self.endpoints.len(), "Racing connection attempts");

        let mut attempts: JoinSet<Attempt> = JoinSet::new();
        for endpoint in &self.endpoints {
            let endpoint = endpoint.clone();
            let transport = Arc::clone(&self.transport);
            let cancel = self.cancel.child_token();
            let deadline = self.connect_timeout;
            attempts.spawn(async move {
                let outcome = with_deadline(deadline, &cancel, transport.connect(&endpoint)).await;
                (endpoint, outcome)
            });
        }

        let mut failures = Vec::with_capacity(self.endpoints.len());
        while let Some(joined) = attempts.join_next().await {
            let (endpoint, outcome) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    failures.push(EndpointFailure {
                        endpoint: "<attempt>".to_string(),
                        reason: format!("Connection task failed: {}", e),
                    });
                    continue;
                }
            };

            let reason = match outcome {
                Ok(Ok(channel)) => {
                    metrics::record_connection_attempt(true);
                    tracing::info!(endpoint = %endpoint, "Connection race won");
                    attempts.abort_all();
                    tokio::spawn(close_losers(attempts));
                    self.spawn_status_forwarder(&channel);
                    return Ok(RpcClient::new(channel, self.call_timeout, self.cancel.clone()));
                }
                Ok(Err(e)) => e.to_string(),
                Err(e) => e.to_string(),
            };
            metrics::record_connection_attempt(false);
            tracing::warn!(endpoint = %endpoint, reason = %reason, "Connection attempt failed");
            failures.push(EndpointFailure {
                endpoint: endpoint.to_string(),
                reason,
            });
        }

        Err(DcoreError::ConnectionFailed(failures))
    }

    fn spawn_status_forwarder(&self, channel: &Arc<dyn RpcChannel>) {
        let mut status = channel.status();
        let tracker = self.state.clone();
        let endpoint = channel.endpoint().clone();
        let cancel = self.cancel.clone();

        let initial = status.borrow_and_update().clone();
        tracker.publish_raw(&initial);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = status.changed() => {
                        if changed.is_err() {
                            tracker.publish(ConnectionState::Closed);
                            break;
                        }
                        let raw = status.borrow_and_update().clone();
                        let state = tracker.publish_raw(&raw);
                        tracing::info!(endpoint = %endpoint, raw = %raw, state = %state, "Connection state changed");
                    }
                }
            }
        });

        if let Ok(mut guard) = self.forwarder.lock() {
            *guard = Some(handle);
        }
    }
}

/// Drain aborted attempts, closing any that finished before the abort landed.
async fn close_losers(mut attempts: JoinSet<Attempt>) {
    while let Some(joined) = attempts.join_next().await {
        if let Ok((endpoint, Ok(Ok(channel)))) = joined {
            tracing::debug!(endpoint = %endpoint, "Closing losing connection");
            channel.close().await;
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Ok(mut guard) = self.forwarder.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoints", &self.endpoints)
            .field("connect_timeout", &self.connect_timeout)
            .field("call_timeout", &self.call_timeout)
            .field("state", &self.state.current())
            .finish()
    }
}
