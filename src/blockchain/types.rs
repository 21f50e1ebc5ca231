//! Chain-specific types and error definitions.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Errors that can occur on a single RPC call to a single node.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RpcError {
    /// Connection or HTTP-level failure.
    #[error("RPC transport error: {0}")]
    Transport(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} ms")]
    Timeout(u64),

    /// The node answered with a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Remote { code: i64, message: String },

    /// The node answered with something that is not the expected shape.
    #[error("Malformed RPC response: {0}")]
    Malformed(String),
}

/// Message fragments Hive uses when a signature lacks the required authority.
const AUTH_REJECTION_MARKERS: &[&str] = &[
    "missing required posting authority",
    "missing posting authority",
    "missing authority",
    "irrelevant signature",
];

/// Message fragment Hive uses when a transaction with the same id was already applied.
const DUPLICATE_TRANSACTION_MARKER: &str = "duplicate transaction";

impl RpcError {
    /// Whether the node refused a transaction the chain already holds.
    pub fn is_duplicate_transaction(&self) -> bool {
        match self {
            RpcError::Remote { message, .. } => {
                message.to_lowercase().contains(DUPLICATE_TRANSACTION_MARKER)
            }
            _ => false,
        }
    }

    /// Whether the node rejected the transaction's credentials.
    pub fn is_auth_rejection(&self) -> bool {
        match self {
            RpcError::Remote { message, .. } => {
                let message = message.to_lowercase();
                AUTH_REJECTION_MARKERS.iter().any(|marker| message.contains(marker))
            }
            _ => false,
        }
    }
}

/// Result type for single-node RPC calls.
pub type RpcResult<T> = Result<T, RpcError>;

/// Subset of `get_dynamic_global_properties` the relay needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainProperties {
    pub head_block_number: u64,
    pub last_irreversible_block_num: u64,
}

/// A block as returned by `condenser_api.get_block`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedBlock {
    /// Production time assigned by the witness.
    #[serde(deserialize_with = "hive_time")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub transactions: Vec<BlockTransaction>,
    /// Parallel to `transactions`.
    #[serde(default)]
    pub transaction_ids: Vec<String>,
}

/// One transaction inside a block.
///
/// Operations are kept as raw JSON: their contents come from arbitrary
/// accounts and are only interpreted by the payload codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockTransaction {
    #[serde(default)]
    pub operations: Vec<serde_json::Value>,
}

/// Resource-credit manabar of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RcManabar {
    #[serde(deserialize_with = "lenient_u64")]
    pub current_mana: u64,
    pub last_update_time: i64,
}

/// Entry of `rc_api.find_rc_accounts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RcAccount {
    pub account: String,
    pub rc_manabar: RcManabar,
    #[serde(deserialize_with = "lenient_u64")]
    pub max_rc: u64,
}

/// Hive timestamps are UTC without an offset: `2024-05-01T12:00:03`.
fn hive_time<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let trimmed = raw.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}

/// Large integers arrive as JSON strings on newer nodes and numbers on older ones.
fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Number(u64),
        Text(String),
    }

    match Lenient::deserialize(deserializer)? {
        Lenient::Number(n) => Ok(n),
        Lenient::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}
