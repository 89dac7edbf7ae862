//! Typed, deadline-enforced access to a connected channel.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::net::connection::Endpoint;
use crate::net::transport::{Api, RpcChannel, RpcError};
use crate::observability::metrics;
use crate::resilience::timeouts::{with_deadline, DeadlineError};

/// Cheap-to-clone handle on the shared channel.
///
/// Every call carries the configured deadline and honors the client's
/// cancellation token.
#[derive(Clone)]
pub struct RpcClient {
    channel: Arc<dyn RpcChannel>,
    call_timeout: Duration,
    cancel: CancellationToken,
}

impl RpcClient {
    pub fn new(channel: Arc<dyn RpcChannel>, call_timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            channel,
            call_timeout,
            cancel,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.channel.endpoint()
    }

    pub fn channel(&self) -> &Arc<dyn RpcChannel> {
        &self.channel
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Raw JSON call.
    pub async fn execute(&self, api: Api, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let started = Instant::now();
        let result = match with_deadline(
            self.call_timeout,
            &self.cancel,
            self.channel.execute(api, method, params),
        )
        .await
        {
            Ok(result) => result,
            Err(DeadlineError::Timeout(after)) => Err(RpcError::Timeout(after)),
            Err(DeadlineError::Cancelled) => Err(RpcError::Cancelled),
        };

        metrics::record_rpc_call(method, result.is_ok(), started.elapsed());
        if let Err(e) = &result {
            tracing::debug!(
                endpoint = %self.channel.endpoint(),
                api = %api,
                method,
                error = %e,
                "RPC call failed"
            );
        }
        result
    }

    /// Call and decode the result into `T`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        api: Api,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, RpcError> {
        let value = self.execute(api, method, params).await?;
        serde_json::from_value(value).map_err(|e| RpcError::Decode(format!("{}: {}", method, e)))
    }

    pub async fn database<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T, RpcError> {
        self.call(Api::Database, method, params).await
    }

    pub async fn history<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T, RpcError> {
        self.call(Api::History, method, params).await
    }

    pub async fn broadcast<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T, RpcError> {
        self.call(Api::NetworkBroadcast, method, params).await
    }

    pub async fn messaging<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T, RpcError> {
        self.call(Api::Messaging, method, params).await
    }

    pub async fn close(&self) {
        self.channel.close().await;
    }
}

impl fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcClient")
            .field("endpoint", &self.channel.endpoint().as_str())
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}
