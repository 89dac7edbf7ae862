//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate endpoint URLs, value ranges and id formats
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::ClientConfig;
use crate::net::connection::Endpoint;

/// One rejected config value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check every rule and collect all failures.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.network.endpoints.is_empty() {
        errors.push(ValidationError::new("network.endpoints", "at least one endpoint is required"));
    }
    for (i, raw) in config.network.endpoints.iter().enumerate() {
        if let Err(e) = Endpoint::parse(raw) {
            errors.push(ValidationError::new(format!("network.endpoints[{}]", i), e.to_string()));
        }
    }
    if config.network.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("network.connect_timeout_secs", "must be greater than 0"));
    }
    if config.network.call_timeout_secs == 0 {
        errors.push(ValidationError::new("network.call_timeout_secs", "must be greater than 0"));
    }

    if config.transaction.expiration_secs == 0 {
        errors.push(ValidationError::new("transaction.expiration_secs", "must be greater than 0"));
    }
    if !is_object_id(&config.transaction.fee_asset_id, 1, 3) {
        errors.push(ValidationError::new(
            "transaction.fee_asset_id",
            format!("'{}' is not an asset id (1.3.N)", config.transaction.fee_asset_id),
        ));
    }
    if let Some(chain_id) = &config.transaction.chain_id {
        if chain_id.len() != 64 || !chain_id.chars().all(|c| c.is_ascii_hexdigit()) {
            errors.push(ValidationError::new("transaction.chain_id", "must be 64 hex characters"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `space.type.instance` with the given space and type.
pub fn is_object_id(id: &str, space: u8, kind: u8) -> bool {
    let mut parts = id.split('.');
    let (Some(s), Some(t), Some(instance), None) = (parts.next(), parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    s.parse::<u8>() == Ok(space) && t.parse::<u8>() == Ok(kind) && instance.parse::<u64>().is_ok()
}
