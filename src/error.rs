//! Error kinds shared by every component of the client engine.

use std::fmt;
use thiserror::Error;

use crate::net::transport::RpcError;

/// One failed connection attempt, kept for the aggregated `ConnectionFailed` error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointFailure {
    /// Endpoint that was attempted.
    pub endpoint: String,
    /// Why the attempt failed.
    pub reason: String,
}

impl fmt::Display for EndpointFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.endpoint, self.reason)
    }
}

/// Errors that can occur while talking to the network or handling keys.
///
/// The type is `Clone` because a failed connection race is memoized and
/// handed to every caller of [`crate::net::ConnectionManager::connect`].
#[derive(Debug, Clone, Error)]
pub enum DcoreError {
    /// Every endpoint of the endpoint set failed to connect.
    #[error("All endpoints failed to connect: [{}]", join_failures(.0))]
    ConnectionFailed(Vec<EndpointFailure>),

    /// Fee schedule query failed or returned an unusable answer.
    #[error("Fee computation failed: {0}")]
    FeeComputationFailed(String),

    /// Transaction could not be serialized or signed.
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// The node refused the transaction.
    #[error("Broadcast rejected: {0}")]
    BroadcastRejected(String),

    /// The transaction never reached the node.
    #[error("Broadcast transport error: {0}")]
    BroadcastTransportError(String),

    /// Decryption produced a checksum that does not match the plaintext.
    ///
    /// Wrong key and corrupted data are indistinguishable.
    #[error("Checksum mismatch")]
    ChecksumMismatch,

    /// No candidate ElGamal key matches the purchase record.
    #[error("No ElGamal key matches the purchase of {0}")]
    KeyNotFound(String),

    /// Operation payload is missing fields the network requires.
    #[error("Invalid {operation} operation, missing fields: {}", .missing.join(", "))]
    InvalidOperationSchema {
        operation: String,
        missing: Vec<String>,
    },

    /// Malformed WIF, public key string or raw key bytes.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Cipher or encoding failure outside of checksum verification.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// RPC call failed outside of the broadcast step.
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// The network has no object matching the query.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation called in a state that does not allow it.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Rejected configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// The operation did not finish before its deadline.
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

fn join_failures(failures: &[EndpointFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for client operations.
pub type DcoreResult<T> = Result<T, DcoreError>;
