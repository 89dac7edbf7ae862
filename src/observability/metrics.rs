//! Metrics collection.
//!
//! # Responsibilities
//! - Define client metrics (connection attempts and state, RPC latency,
//!   broadcast outcomes, memo decryption outcomes)
//! - Record through the `metrics` facade; installing an exporter is left to
//!   the embedding application
//!
//! # Metrics
//! - `dcore_connection_attempts_total` (counter): attempts by outcome
//! - `dcore_connection_state` (gauge): numeric [`ConnectionState`]
//! - `dcore_rpc_calls_total` (counter): calls by method, outcome
//! - `dcore_rpc_call_duration_seconds` (histogram): call latency by method
//! - `dcore_broadcasts_total` (counter): broadcasts by outcome
//! - `dcore_memo_decryptions_total` (counter): memo decryptions by outcome

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

use crate::net::connection::ConnectionState;

/// Metric names.
pub mod names {
    pub const CONNECTION_ATTEMPTS: &str = "dcore_connection_attempts_total";
    pub const CONNECTION_STATE: &str = "dcore_connection_state";
    pub const RPC_CALLS: &str = "dcore_rpc_calls_total";
    pub const RPC_DURATION: &str = "dcore_rpc_call_duration_seconds";
    pub const BROADCASTS: &str = "dcore_broadcasts_total";
    pub const MEMO_DECRYPTIONS: &str = "dcore_memo_decryptions_total";
}

/// Register metric descriptions with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(names::CONNECTION_ATTEMPTS, "Connection attempts by outcome");
    describe_gauge!(
        names::CONNECTION_STATE,
        "Connection state (0=open, 1=closed, 2=reconnect, 3=error, 4=unknown)"
    );
    describe_counter!(names::RPC_CALLS, "RPC calls by method and outcome");
    describe_histogram!(names::RPC_DURATION, "RPC call latency in seconds");
    describe_counter!(names::BROADCASTS, "Transaction broadcasts by outcome");
    describe_counter!(names::MEMO_DECRYPTIONS, "Memo decryptions by outcome");
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}

pub fn record_connection_attempt(success: bool) {
    counter!(names::CONNECTION_ATTEMPTS, "outcome" => outcome(success)).increment(1);
}

pub fn record_connection_state(state: ConnectionState) {
    gauge!(names::CONNECTION_STATE).set(state as u8 as f64);
}

pub fn record_rpc_call(method: &str, success: bool, elapsed: Duration) {
    let method = method.to_string();
    counter!(names::RPC_CALLS, "method" => method.clone(), "outcome" => outcome(success)).increment(1);
    histogram!(names::RPC_DURATION, "method" => method).record(elapsed.as_secs_f64());
}

/// `outcome` is one of `accepted`, `rejected`, `transport_error`.
pub fn record_broadcast(outcome: &'static str) {
    counter!(names::BROADCASTS, "outcome" => outcome).increment(1);
}

pub fn record_memo_decryption(success: bool) {
    counter!(names::MEMO_DECRYPTIONS, "outcome" => outcome(success)).increment(1);
}
