//! Component wiring.
//!
//! [`DcoreContext`] is built once from a validated [`ClientConfig`] and owns
//! the shared connection manager. Every component gets its collaborators
//! from here; there is no process-wide state.

use std::sync::Arc;

use crate::blockchain::content::ContentKeyProtocol;
use crate::blockchain::transaction::TransactionPipeline;
use crate::config::schema::ClientConfig;
use crate::config::validation::validate_config;
use crate::error::{DcoreError, DcoreResult};
use crate::net::{ConnectionManager, StatusCallback, Transport, WsTransport};

/// Shared components of one client instance.
#[derive(Debug, Clone)]
pub struct DcoreContext {
    config: Arc<ClientConfig>,
    connections: Arc<ConnectionManager>,
    transactions: TransactionPipeline,
    content: ContentKeyProtocol,
}

impl DcoreContext {
    /// Build every component over `transport`.
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> DcoreResult<Self> {
        Self::build(config, transport, None)
    }

    /// Like [`DcoreContext::new`], reporting connection state changes to `callback`.
    pub fn with_status_callback(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        callback: StatusCallback,
    ) -> DcoreResult<Self> {
        Self::build(config, transport, Some(callback))
    }

    /// Websocket transport.
    pub fn websocket(config: ClientConfig) -> DcoreResult<Self> {
        Self::new(config, Arc::new(WsTransport::new()))
    }

    fn build(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        callback: Option<StatusCallback>,
    ) -> DcoreResult<Self> {
        validate_config(&config).map_err(|errors| {
            DcoreError::Config(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        })?;

        let mut manager = ConnectionManager::from_config(&config.network, transport)?;
        if let Some(callback) = callback {
            manager = manager.with_status_callback(callback);
        }
        let connections = Arc::new(manager);

        Ok(Self {
            transactions: TransactionPipeline::new(Arc::clone(&connections), config.transaction.clone()),
            content: ContentKeyProtocol::new(Arc::clone(&connections)),
            connections,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    pub fn transactions(&self) -> &TransactionPipeline {
        &self.transactions
    }

    pub fn content(&self) -> &ContentKeyProtocol {
        &self.content
    }

    pub async fn shutdown(&self) {
        self.connections.shutdown().await;
    }
}
