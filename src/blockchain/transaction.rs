//! Operation envelopes, signed transactions and broadcast bookkeeping.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

/// Operation type name of the chain's application-defined envelope.
pub const CUSTOM_JSON: &str = "custom_json";

/// The chain's generic application-defined operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomJsonOperation {
    #[serde(default)]
    pub required_auths: Vec<String>,
    #[serde(default)]
    pub required_posting_auths: Vec<String>,
    /// Application identifier.
    pub id: String,
    /// Application payload, itself a JSON document serialized to a string.
    pub json: String,
}

impl CustomJsonOperation {
    /// Condenser wire form: `["custom_json", {...}]`.
    pub fn to_operation(&self) -> Value {
        json!([CUSTOM_JSON, self])
    }
}

/// A transaction signed by the signing collaborator, ready to broadcast.
///
/// Opaque to the relay: it is forwarded to nodes exactly as produced, so
/// every retry re-delivers the very same signed bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignedTransaction(pub Value);

/// Node answer to `broadcast_transaction_synchronous`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastReceipt {
    pub id: String,
    pub block_num: u64,
    #[serde(default)]
    pub trx_num: u32,
    #[serde(default)]
    pub expired: bool,
}

/// Confirmed outcome of one payload of a `post`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastResult {
    pub transaction_id: String,
    pub block_number: u64,
    /// Number of URLs carried by this payload.
    pub url_count: usize,
    /// Synthesized by a dry-run writer; nothing was submitted.
    #[serde(default)]
    pub dry_run: bool,
}

impl BroadcastResult {
    /// Placeholder transaction id returned in dry-run mode: 40 hex zeros, the
    /// shape of a real transaction id.
    pub const DRY_RUN_TRANSACTION_ID: &'static str = "0000000000000000000000000000000000000000";

    /// A synthetic success for dry-run mode.
    pub fn dry_run(url_count: usize) -> Self {
        Self {
            transaction_id: Self::DRY_RUN_TRANSACTION_ID.to_string(),
            block_number: 0,
            url_count,
            dry_run: true,
        }
    }
}

/// Lifecycle of one in-flight submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastOutcome {
    Pending,
    Confirmed(BroadcastReceipt),
    Failed(String),
}

/// One in-flight write attempt.
#[derive(Debug, Clone)]
pub struct PendingBroadcast {
    /// Serialized application payload carried by the transaction.
    pub payload: String,
    /// Endpoint of the most recent delivery attempt.
    pub endpoint: Option<Url>,
    pub attempts: u32,
    pub outcome: BroadcastOutcome,
}

impl PendingBroadcast {
    pub fn new(payload: String) -> Self {
        Self {
            payload,
            endpoint: None,
            attempts: 0,
            outcome: BroadcastOutcome::Pending,
        }
    }

    /// Record a delivery attempt against `endpoint`.
    pub fn record_attempt(&mut self, endpoint: &Url) {
        self.attempts += 1;
        self.endpoint = Some(endpoint.clone());
    }

    pub fn confirm(&mut self, receipt: BroadcastReceipt) {
        self.outcome = BroadcastOutcome::Confirmed(receipt);
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.outcome = BroadcastOutcome::Failed(reason.into());
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.outcome, BroadcastOutcome::Pending)
    }
}
