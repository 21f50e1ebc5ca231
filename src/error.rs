//! Error taxonomy surfaced to callers.
//!
//! Every remote-facing operation funnels raw transport failures through
//! [`RpcError`] and then into one of the [`PodpingError`] kinds. Callers
//! never see a `reqwest` error directly.

use thiserror::Error;

use crate::blockchain::types::RpcError;
use crate::blockchain::transaction::BroadcastResult;

/// Errors returned by the reader, writer and credit gauge.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PodpingError {
    /// Bad input. No I/O was attempted and the call is never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The node rejected the account's credentials or signature.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Transport failure that survived every retry.
    #[error("Connection error: {reason} (last node: {})", node.as_deref().unwrap_or("none"))]
    Connection {
        reason: String,
        node: Option<String>,
    },

    /// The chain already holds this signed transaction, possibly from an
    /// earlier delivery whose reply was lost. Re-posting would duplicate it.
    #[error("Transaction already broadcast: {0}")]
    AlreadyBroadcast(String),

    /// Transient remote error that could not be classified more precisely.
    #[error("Network error: {0}")]
    Network(String),
}

impl PodpingError {
    /// Whether another delivery attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PodpingError::Connection { .. } | PodpingError::Network(_))
    }

    /// Build a connection error naming the node that was last tried.
    pub fn connection(reason: impl Into<String>, node: Option<&str>) -> Self {
        PodpingError::Connection {
            reason: reason.into(),
            node: node.map(str::to_string),
        }
    }
}

impl From<RpcError> for PodpingError {
    fn from(err: RpcError) -> Self {
        if err.is_auth_rejection() {
            return PodpingError::Authentication(err.to_string());
        }
        if err.is_duplicate_transaction() {
            return PodpingError::AlreadyBroadcast(err.to_string());
        }
        match err {
            RpcError::Transport(_) | RpcError::Timeout(_) => PodpingError::Connection {
                reason: err.to_string(),
                node: None,
            },
            RpcError::Remote { .. } | RpcError::Malformed(_) => {
                PodpingError::Network(err.to_string())
            }
        }
    }
}

/// Result type for relay operations.
pub type PodpingResult<T> = Result<T, PodpingError>;

/// Failure of a multi-payload `post`.
///
/// Carries the payloads confirmed before the failing one so that nothing is
/// silently half-published.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{error} ({} payload(s) confirmed before failure)", completed.len())]
pub struct PostError {
    /// Results for payloads that were confirmed, in submission order.
    pub completed: Vec<BroadcastResult>,
    /// Zero-based index of the payload that failed.
    pub failed_index: usize,
    /// The underlying failure.
    #[source]
    pub error: PodpingError,
}

impl PostError {
    /// Error raised before any payload was submitted.
    pub fn before_submission(error: PodpingError) -> Self {
        Self {
            completed: Vec::new(),
            failed_index: 0,
            error,
        }
    }

    /// The underlying error kind.
    pub fn kind(&self) -> &PodpingError {
        &self.error
    }
}

impl From<PodpingError> for PostError {
    fn from(error: PodpingError) -> Self {
        Self::before_submission(error)
    }
}
