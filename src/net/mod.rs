//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Endpoint set (config)
//!     → manager.rs (race one attempt per endpoint, memoize the winner)
//!     → transport.rs (Transport::connect → RpcChannel after handshake)
//!     → websocket.rs (tokio-tungstenite socket, id-multiplexed calls)
//!     → rpc.rs (RpcClient: deadline + cancellation on every call)
//!     → Hand off to the transaction pipeline and content key protocol
//!
//! Connection States:
//!     Closed → Open → {Reconnect, Error, Closed}, Unknown for anything else
//! ```
//!
//! # Design Decisions
//! - A single shared channel per manager; calls are multiplexed by id
//! - Losing attempts are aborted, late finishers are closed
//! - The transport is a trait so tests can script node behavior

pub mod connection;
pub mod manager;
pub mod rpc;
pub mod transport;
pub mod websocket;

pub use connection::{ConnectionState, Endpoint, StatusCallback};
pub use manager::ConnectionManager;
pub use rpc::RpcClient;
pub use transport::{Api, RpcChannel, RpcError, Transport};
pub use websocket::WsTransport;
