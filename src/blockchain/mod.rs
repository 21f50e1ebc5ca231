//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment Variables (posting key)
//!     → signer.rs (external key management, signing)
//!     → transaction.rs (operation envelope, signed transaction, receipts)
//!     → client.rs (JSON-RPC to one node, with timeouts)
//! ```
//!
//! # Security Constraints
//! - Posting keys ONLY from environment variables
//! - Never log keys or sensitive data
//! - All RPC calls have configurable timeouts

pub mod client;
pub mod signer;
pub mod transaction;
pub mod types;

pub use client::{HiveRpcClient, NodeRpc};
pub use signer::{CommandSigner, PostingKey, SignerError, TransactionSigner};
pub use transaction::{BroadcastReceipt, BroadcastResult, CustomJsonOperation, SignedTransaction};
pub use types::{ChainProperties, RpcError, RpcResult, SignedBlock};
