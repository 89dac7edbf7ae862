//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! RPC call or connection attempt:
//!     → timeouts.rs (deadline + cancellation token)
//!     → On failure: error surfaces to the caller, no automatic retry
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every network round trip has a deadline
//! - Failover happens once, at connection time, by racing endpoints

pub mod timeouts;

pub use timeouts::{with_deadline, DeadlineError};
