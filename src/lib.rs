//! DCore client engine.
//!
//! Resilient connections to a redundant set of node endpoints, typed
//! transaction signing and broadcast, the ElGamal content key exchange and
//! multi-key memo decryption.

pub mod blockchain;
pub mod config;
pub mod context;
pub mod crypto;
pub mod error;
pub mod net;
pub mod observability;
pub mod resilience;

pub use config::schema::ClientConfig;
pub use context::DcoreContext;
pub use error::{DcoreError, DcoreResult};
