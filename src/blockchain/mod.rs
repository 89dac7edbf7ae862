//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Caller builds operations
//!     → operation.rs (required-field validation, [id, payload] form)
//!     → transaction.rs (fees → reference block → sign → broadcast)
//!     → net::ConnectionManager (shared channel)
//!
//! Purchased content
//!     → content.rs (purchase record → matching ElGamal key → content key)
//!
//! Transfer history
//!     → memo.rs (try every candidate key, empty string when none opens it)
//! ```
//!
//! # Security Constraints
//! - Private keys come from WIF, brain keys, wallet files or the environment
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts

pub mod content;
pub mod memo;
pub mod operation;
pub mod transaction;
pub mod wallet;
pub mod wallet_file;

pub use content::{ContentKeyProtocol, ContentKeys, KeyParts};
pub use memo::{Memo, MemoDecryptor};
pub use operation::{AssetAmount, Operation, OperationKind};
pub use transaction::{
    BroadcastReceipt, NodeTransactionEncoder, Transaction, TransactionEncoder, TransactionPipeline, TxState,
};
pub use wallet::Wallet;
pub use wallet_file::{PlainKeys, WalletExport};
