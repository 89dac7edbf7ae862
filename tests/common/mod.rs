//! Shared utilities for integration testing.
//!
//! [`MockTransport`] stands in for the websocket transport: each endpoint gets
//! a delay and an outcome. [`ScriptedChannel`] stands in for a node: it answers
//! from a per-method script and records every call in order.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

use dcore_client::net::{Api, ConnectionManager, Endpoint, RpcChannel, RpcError, Transport};

pub const CHAIN_ID: &str = "17401602b201b3c45a3ad98afc6fb458f91f519bd30d1058adf6f2bed66376bc";
// Well-known graphene test key; never holds funds.
pub const TEST_WIF: &str = "5KQwrPbwdL6PhXujxW37FSSQZ1JiwsST4cqQzDeyXtP79zkvFD3";
/// Serialization returned by the scripted `get_transaction_hex`, trailing
/// empty signature list included.
pub const TRANSACTION_HEX: &str = "deadbeef00";

pub fn endpoint(raw: &str) -> Endpoint {
    Endpoint::parse(raw).unwrap()
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub api: Api,
    pub method: String,
    pub params: Vec<Value>,
}

/// A node that answers from a script.
pub struct ScriptedChannel {
    endpoint: Endpoint,
    responses: Mutex<HashMap<String, Result<Value, RpcError>>>,
    calls: Mutex<Vec<Call>>,
    status: watch::Sender<String>,
    closes: AtomicUsize,
}

impl ScriptedChannel {
    pub fn new(raw_endpoint: &str) -> Self {
        let (status, _) = watch::channel("open".to_string());
        Self {
            endpoint: endpoint(raw_endpoint),
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            status,
            closes: AtomicUsize::new(0),
        }
    }

    /// A node answering every call the transaction pipeline makes.
    pub fn node(raw_endpoint: &str) -> Self {
        Self::new(raw_endpoint)
            .respond("get_required_fees", json!([{ "amount": 5, "asset_id": "1.3.0" }]))
            .respond(
                "get_dynamic_global_properties",
                json!({
                    "head_block_number": 0x0001_2345u64,
                    "head_block_id": "00012345aabbccdd000000000000000000000000",
                    "time": "2024-01-01T00:00:00"
                }),
            )
            .respond("get_transaction_hex", json!(TRANSACTION_HEX))
            .respond("get_chain_id", json!(CHAIN_ID))
            .respond("broadcast_transaction", Value::Null)
    }

    pub fn respond(self, method: &str, value: Value) -> Self {
        self.responses.lock().unwrap().insert(method.to_string(), Ok(value));
        self
    }

    pub fn fail(self, method: &str, error: RpcError) -> Self {
        self.responses.lock().unwrap().insert(method.to_string(), Err(error));
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.method).collect()
    }

    pub fn calls_to(&self, method: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|call| call.method == method).collect()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Push a raw transport status to subscribers.
    pub fn set_status(&self, raw: &str) {
        self.status.send_replace(raw.to_string());
    }
}

#[async_trait]
impl RpcChannel for ScriptedChannel {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn execute(&self, api: Api, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        self.calls.lock().unwrap().push(Call {
            api,
            method: method.to_string(),
            params,
        });
        self.responses
            .lock()
            .unwrap()
            .get(method)
            .cloned()
            .unwrap_or_else(|| {
                Err(RpcError::Remote {
                    message: format!("unscripted method {}", method),
                })
            })
    }

    fn status(&self) -> watch::Receiver<String> {
        self.status.subscribe()
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.status.send_replace("closed".to_string());
    }
}

/// What a mocked endpoint does once its delay has elapsed.
#[derive(Clone)]
pub enum Outcome {
    Connect(Arc<ScriptedChannel>),
    Fail(String),
    /// Never answers.
    Hang,
}

/// Transport with a scripted delay and outcome per endpoint.
#[derive(Default)]
pub struct MockTransport {
    plans: HashMap<String, (Duration, Outcome)>,
    connects: AtomicUsize,
    completed: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, raw_endpoint: &str, delay: Duration, outcome: Outcome) -> Self {
        self.plans
            .insert(endpoint(raw_endpoint).as_str().to_string(), (delay, outcome));
        self
    }

    /// Attempts started.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Attempts that ran past their delay (not aborted).
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn RpcChannel>, RpcError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let (delay, outcome) = self
            .plans
            .get(endpoint.as_str())
            .cloned()
            .ok_or_else(|| RpcError::Transport(format!("no route to {}", endpoint)))?;

        tokio::time::sleep(delay).await;
        self.completed.fetch_add(1, Ordering::SeqCst);

        match outcome {
            Outcome::Connect(channel) => {
                let channel: Arc<dyn RpcChannel> = channel;
                Ok(channel)
            }
            Outcome::Fail(reason) => Err(RpcError::Transport(reason)),
            Outcome::Hang => std::future::pending().await,
        }
    }
}

/// Manager over `transport` for the given raw endpoints.
pub fn manager(transport: &Arc<MockTransport>, endpoints: &[&str]) -> ConnectionManager {
    let transport: Arc<dyn Transport> = transport.clone();
    ConnectionManager::new(endpoints.iter().map(|raw| endpoint(raw)).collect(), transport)
}

/// Manager with a single endpoint answering through `channel`.
pub fn single_node(channel: Arc<ScriptedChannel>) -> Arc<ConnectionManager> {
    let raw = channel.endpoint.as_str().to_string();
    let transport = Arc::new(MockTransport::new().with(&raw, Duration::ZERO, Outcome::Connect(channel)));
    Arc::new(manager(&transport, &[raw.as_str()]))
}
