//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the client engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Node endpoints and timeouts.
    pub network: NetworkConfig,

    /// Transaction building settings.
    pub transaction: TransactionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Endpoint set and per-call deadlines.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Redundant websocket endpoints of one network (e.g., "wss://node:8090").
    pub endpoints: Vec<String>,

    /// Deadline of a single connection attempt, handshake included.
    pub connect_timeout_secs: u64,

    /// Deadline of a single RPC call.
    pub call_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            connect_timeout_secs: 10,
            call_timeout_secs: 30,
        }
    }
}

/// Transaction settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TransactionConfig {
    /// Seconds past the head block time before a transaction expires.
    pub expiration_secs: u32,

    /// Asset fees are paid in.
    pub fee_asset_id: String,

    /// Chain id (64 hex chars). Queried from the node when absent.
    pub chain_id: Option<String>,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            expiration_secs: 30,
            fee_asset_id: "1.3.0".to_string(),
            chain_id: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the pretty format.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}
