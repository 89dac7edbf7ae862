//! Transaction assembly, fees, signing and broadcast.
//!
//! # Responsibilities
//! - Collect validated operations into a transaction
//! - Query the fee schedule and attach one fee per operation
//! - Bind the transaction to a recent block and an expiration
//! - Sign `sha256(chain_id || serialized transaction)`
//! - Broadcast over the shared channel and classify the outcome
//!
//! # State machine
//! ```text
//! Empty → OperationsAdded → FeesComputed → Signed → Broadcast → Confirmed
//!                     └──────────┴─────────────┴──────────┴─────→ Failed
//! ```
//! Signing without `sign` skips the `Signed` state.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::blockchain::operation::Operation;
use crate::config::schema::TransactionConfig;
use crate::crypto::hash::sha256;
use crate::crypto::keys::PrivateKey;
use crate::error::{DcoreError, DcoreResult};
use crate::net::{ConnectionManager, RpcClient, RpcError};
use crate::observability::metrics;

/// Expiration timestamps as the node formats them (UTC, no zone suffix).
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Where a transaction is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Empty,
    OperationsAdded,
    FeesComputed,
    Signed,
    Broadcast,
    /// Accepted into the node's pending pool (not finality).
    Confirmed,
    Failed,
}

/// A transaction under construction.
#[derive(Debug, Clone)]
pub struct Transaction {
    operations: Vec<Operation>,
    fee_asset_id: String,
    ref_block_num: u16,
    ref_block_prefix: u32,
    expiration: String,
    signatures: Vec<String>,
    state: TxState,
}

impl Transaction {
    pub fn new(fee_asset_id: impl Into<String>) -> Self {
        Self {
            operations: Vec::new(),
            fee_asset_id: fee_asset_id.into(),
            ref_block_num: 0,
            ref_block_prefix: 0,
            expiration: String::new(),
            signatures: Vec::new(),
            state: TxState::Empty,
        }
    }

    /// Append an operation. Only allowed before fees are computed.
    pub fn add(&mut self, mut operation: Operation) -> DcoreResult<&mut Self> {
        if !matches!(self.state, TxState::Empty | TxState::OperationsAdded) {
            return Err(DcoreError::InvalidState(format!(
                "Cannot add operations in state {:?}",
                self.state
            )));
        }
        operation.ensure_fee(&self.fee_asset_id);
        self.operations.push(operation);
        self.state = TxState::OperationsAdded;
        Ok(self)
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn signatures(&self) -> &[String] {
        &self.signatures
    }

    pub fn ref_block_num(&self) -> u16 {
        self.ref_block_num
    }

    pub fn ref_block_prefix(&self) -> u32 {
        self.ref_block_prefix
    }

    pub fn expiration(&self) -> &str {
        &self.expiration
    }

    /// Attach one fee per operation, in order.
    pub fn set_fees(&mut self, fees: Vec<Value>) -> DcoreResult<()> {
        if self.state != TxState::OperationsAdded {
            return Err(DcoreError::InvalidState(format!(
                "Cannot set fees in state {:?}",
                self.state
            )));
        }
        if fees.len() != self.operations.len() {
            return Err(DcoreError::FeeComputationFailed(format!(
                "Expected {} fees, node returned {}",
                self.operations.len(),
                fees.len()
            )));
        }
        for (operation, fee) in self.operations.iter_mut().zip(fees) {
            operation.set_fee(fee);
        }
        self.state = TxState::FeesComputed;
        Ok(())
    }

    pub fn set_reference_block(&mut self, reference: &ReferenceBlock) {
        self.ref_block_num = reference.ref_block_num;
        self.ref_block_prefix = reference.ref_block_prefix;
        self.expiration = reference.expiration.clone();
    }

    /// JSON form the node accepts, signatures included.
    pub fn to_json(&self) -> Value {
        json!({
            "ref_block_num": self.ref_block_num,
            "ref_block_prefix": self.ref_block_prefix,
            "expiration": self.expiration,
            "operations": self.operations.iter().map(Operation::to_json).collect::<Vec<_>>(),
            "extensions": [],
            "signatures": self.signatures,
        })
    }

    fn operations_json(&self) -> Value {
        Value::Array(self.operations.iter().map(Operation::to_json).collect())
    }

    fn fail(&mut self) {
        self.state = TxState::Failed;
    }
}

/// Reference to a recent block plus the expiration derived from its time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceBlock {
    pub ref_block_num: u16,
    pub ref_block_prefix: u32,
    pub expiration: String,
}

/// Subset of `get_dynamic_global_properties` used for reference blocks.
#[derive(Debug, Clone, Deserialize)]
pub struct DynamicGlobalProperties {
    pub head_block_number: u64,
    pub head_block_id: String,
    pub time: String,
}

impl ReferenceBlock {
    /// Derive from the head block: low 16 bits of its number, bytes 4..8 of its id.
    pub fn from_properties(props: &DynamicGlobalProperties, expiration_secs: u32) -> DcoreResult<Self> {
        let id = hex::decode(&props.head_block_id)
            .map_err(|e| reference_error(format!("Head block id is not hex: {}", e)))?;
        if id.len() < 8 {
            return Err(reference_error(format!(
                "Head block id too short: {}",
                props.head_block_id
            )));
        }
        let ref_block_prefix = u32::from_le_bytes([id[4], id[5], id[6], id[7]]);

        let head_time = NaiveDateTime::parse_from_str(props.time.trim_end_matches('Z'), TIME_FORMAT)
            .map_err(|e| reference_error(format!("Invalid head block time '{}': {}", props.time, e)))?;
        let expiration = head_time
            .checked_add_signed(chrono::Duration::seconds(i64::from(expiration_secs)))
            .ok_or_else(|| reference_error("Expiration overflows".to_string()))?;

        Ok(Self {
            ref_block_num: (props.head_block_number & 0xFFFF) as u16,
            ref_block_prefix,
            expiration: expiration.format(TIME_FORMAT).to_string(),
        })
    }
}

// The reference block is part of the signed payload.
fn reference_error(message: String) -> DcoreError {
    DcoreError::SigningFailed(message)
}

/// Produces the binary serialization a signature covers.
#[async_trait]
pub trait TransactionEncoder: Send + Sync {
    /// Serialize `transaction` (no signatures) exactly as the node does.
    async fn encode(&self, client: &RpcClient, transaction: &Value) -> DcoreResult<Vec<u8>>;
}

/// Asks the node for the serialization (`get_transaction_hex`).
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeTransactionEncoder;

#[async_trait]
impl TransactionEncoder for NodeTransactionEncoder {
    async fn encode(&self, client: &RpcClient, transaction: &Value) -> DcoreResult<Vec<u8>> {
        let encoded: String = client
            .database("get_transaction_hex", vec![transaction.clone()])
            .await
            .map_err(|e| DcoreError::SigningFailed(format!("Serialization failed: {}", e)))?;
        let mut bytes = hex::decode(&encoded)
            .map_err(|e| DcoreError::SigningFailed(format!("Serialization is not hex: {}", e)))?;

        // The node serializes the signed form; drop the empty signature count.
        match bytes.pop() {
            Some(0) => Ok(bytes),
            _ => Err(DcoreError::SigningFailed(
                "Serialization does not end with an empty signature list".to_string(),
            )),
        }
    }
}

/// What the node accepted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BroadcastReceipt {
    /// Transaction id (hex of the first 20 bytes of the serialization's SHA-256).
    /// `None` for unsigned broadcasts, which are never serialized locally.
    pub id: Option<String>,
    pub ref_block_num: u16,
    pub expiration: String,
    pub signatures: Vec<String>,
}

/// Turns transactions into broadcasts over the shared connection.
///
/// Cloneable; independent transactions can be broadcast concurrently.
#[derive(Clone)]
pub struct TransactionPipeline {
    manager: Arc<ConnectionManager>,
    encoder: Arc<dyn TransactionEncoder>,
    config: TransactionConfig,
    chain_id: Arc<OnceCell<Vec<u8>>>,
}

impl TransactionPipeline {
    pub fn new(manager: Arc<ConnectionManager>, config: TransactionConfig) -> Self {
        Self {
            manager,
            encoder: Arc::new(NodeTransactionEncoder),
            config,
            chain_id: Arc::new(OnceCell::new()),
        }
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn TransactionEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// An empty transaction paying fees in the configured asset.
    pub fn new_transaction(&self) -> Transaction {
        Transaction::new(self.config.fee_asset_id.clone())
    }

    /// Build a transaction from `operations` and broadcast it.
    pub async fn broadcast_operations(
        &self,
        operations: Vec<Operation>,
        key: &PrivateKey,
        sign: bool,
    ) -> DcoreResult<BroadcastReceipt> {
        let mut transaction = self.new_transaction();
        for operation in operations {
            transaction.add(operation)?;
        }
        self.broadcast(&mut transaction, key, sign).await
    }

    /// Fees, reference block, signature, broadcast. Strictly in that order.
    pub async fn broadcast(
        &self,
        transaction: &mut Transaction,
        key: &PrivateKey,
        sign: bool,
    ) -> DcoreResult<BroadcastReceipt> {
        if transaction.state() != TxState::OperationsAdded {
            return Err(DcoreError::InvalidState(format!(
                "Cannot broadcast a transaction in state {:?}",
                transaction.state()
            )));
        }

        let client = self.manager.connect().await?;

        if let Err(e) = self.compute_fees(&client, transaction).await {
            transaction.fail();
            return Err(e);
        }

        match self.reference_block(&client).await {
            Ok(reference) => transaction.set_reference_block(&reference),
            Err(e) => {
                transaction.fail();
                return Err(e);
            }
        }

        let id = if sign {
            match self.sign(&client, transaction, key).await {
                Ok(id) => Some(id),
                Err(e) => {
                    transaction.fail();
                    return Err(e);
                }
            }
        } else {
            None
        };

        transaction.state = TxState::Broadcast;
        let submitted: Result<Value, RpcError> = client
            .broadcast("broadcast_transaction", vec![transaction.to_json()])
            .await;

        match submitted {
            Ok(_) => {
                transaction.state = TxState::Confirmed;
                metrics::record_broadcast("accepted");
                tracing::info!(
                    id = id.as_deref().unwrap_or("unsigned"),
                    operations = transaction.operations().len(),
                    "Transaction accepted"
                );
                Ok(BroadcastReceipt {
                    id,
                    ref_block_num: transaction.ref_block_num,
                    expiration: transaction.expiration.clone(),
                    signatures: transaction.signatures.clone(),
                })
            }
            Err(RpcError::Remote { message }) => {
                transaction.fail();
                metrics::record_broadcast("rejected");
                tracing::warn!(reason = %message, "Transaction rejected");
                Err(DcoreError::BroadcastRejected(message))
            }
            Err(e) => {
                transaction.fail();
                metrics::record_broadcast("transport_error");
                tracing::warn!(error = %e, "Transaction broadcast failed");
                Err(DcoreError::BroadcastTransportError(e.to_string()))
            }
        }
    }

    async fn compute_fees(&self, client: &RpcClient, transaction: &mut Transaction) -> DcoreResult<()> {
        let fees: Vec<Value> = client
            .database(
                "get_required_fees",
                vec![transaction.operations_json(), json!(self.config.fee_asset_id)],
            )
            .await
            .map_err(|e| DcoreError::FeeComputationFailed(e.to_string()))?;

        // Nested operations answer with `[fee, [inner fees]]`; the outer fee is the one attached.
        let fees = fees
            .into_iter()
            .map(|fee| match fee {
                Value::Array(mut parts) if !parts.is_empty() => parts.swap_remove(0),
                other => other,
            })
            .collect();
        transaction.set_fees(fees)?;
        tracing::debug!(operations = transaction.operations().len(), "Fees attached");
        Ok(())
    }

    async fn reference_block(&self, client: &RpcClient) -> DcoreResult<ReferenceBlock> {
        let props: DynamicGlobalProperties = client
            .database("get_dynamic_global_properties", Vec::new())
            .await
            .map_err(|e| DcoreError::SigningFailed(format!("Reference block unavailable: {}", e)))?;
        ReferenceBlock::from_properties(&props, self.config.expiration_secs)
    }

    async fn sign(
        &self,
        client: &RpcClient,
        transaction: &mut Transaction,
        key: &PrivateKey,
    ) -> DcoreResult<String> {
        let encoded = self.encoder.encode(client, &transaction.to_json()).await?;
        let chain_id = self.chain_id(client).await?;

        let mut message = Vec::with_capacity(chain_id.len() + encoded.len());
        message.extend_from_slice(chain_id);
        message.extend_from_slice(&encoded);
        let signature = key.sign_digest(&sha256(&message))?;

        transaction.signatures.push(hex::encode(signature));
        transaction.state = TxState::Signed;
        Ok(hex::encode(&sha256(&encoded)[..20]))
    }

    /// Chain id bytes from config, or from the node on first use.
    async fn chain_id(&self, client: &RpcClient) -> DcoreResult<&Vec<u8>> {
        self.chain_id
            .get_or_try_init(|| async move {
                let hex_id = match &self.config.chain_id {
                    Some(configured) => configured.clone(),
                    None => client
                        .database::<String>("get_chain_id", Vec::new())
                        .await
                        .map_err(|e| DcoreError::SigningFailed(format!("Chain id unavailable: {}", e)))?,
                };
                hex::decode(&hex_id)
                    .map_err(|e| DcoreError::SigningFailed(format!("Chain id is not hex: {}", e)))
            })
            .await
    }
}

impl fmt::Debug for TransactionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
