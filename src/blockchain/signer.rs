//! Transaction signing collaborator.
//!
//! # Security
//! - Posting keys are loaded ONLY from environment variables
//! - Keys are never logged or serialized
//! - Signing itself is delegated to an external key-management program

use async_trait::async_trait;
use serde_json::{json, Value};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::blockchain::transaction::SignedTransaction;
use crate::error::PodpingError;

/// Environment variable name for the posting key.
pub const POSTING_KEY_ENV_VAR: &str = "PODPING_HIVE_POSTING_KEY";

/// Exit status a signing program uses to say the key was rejected.
pub const KEY_REJECTED_EXIT_CODE: i32 = 2;

/// Errors raised by a signer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignerError {
    /// The key is invalid or lacks authority for the account.
    #[error("Signing rejected: {0}")]
    Rejected(String),

    /// The signer could not run.
    #[error("Signer unavailable: {0}")]
    Unavailable(String),

    /// The signer produced something that is not a signed transaction.
    #[error("Invalid signed transaction: {0}")]
    InvalidOutput(String),
}

impl From<SignerError> for PodpingError {
    fn from(err: SignerError) -> Self {
        match err {
            SignerError::Rejected(_) => PodpingError::Authentication(err.to_string()),
            SignerError::Unavailable(_) | SignerError::InvalidOutput(_) => {
                PodpingError::Network(err.to_string())
            }
        }
    }
}

/// Produces signed transactions for an account.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Wrap `operations` (condenser wire form) into a transaction signed for `account`.
    async fn sign(
        &self,
        account: &str,
        operations: &[Value],
    ) -> Result<SignedTransaction, SignerError>;
}

/// A posting key. Debug output is redacted.
#[derive(Clone)]
pub struct PostingKey(String);

impl PostingKey {
    /// Wrap a key string, rejecting blanks.
    pub fn new(key: impl Into<String>) -> Result<Self, SignerError> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            return Err(SignerError::Rejected("posting key is empty".into()));
        }
        Ok(Self(key))
    }

    /// Load the key from environment variable.
    ///
    /// Reads `PODPING_HIVE_POSTING_KEY` from environment.
    pub fn from_env() -> Result<Self, SignerError> {
        let key = std::env::var(POSTING_KEY_ENV_VAR).map_err(|_| {
            SignerError::Rejected(format!("Environment variable {} not set", POSTING_KEY_ENV_VAR))
        })?;
        Self::new(key)
    }

    fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for PostingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PostingKey(***)")
    }
}

/// Signs by running an external program.
///
/// The program receives `{"account", "operations"}` on stdin and the key in
/// `PODPING_HIVE_POSTING_KEY`, and prints the signed transaction JSON on
/// stdout. Exit status 2 means the key was rejected.
#[derive(Debug, Clone)]
pub struct CommandSigner {
    program: String,
    args: Vec<String>,
    key: PostingKey,
    timeout: Duration,
}

impl CommandSigner {
    /// Create a signer from `[program, args...]`.
    pub fn new(command: &[String], key: PostingKey) -> Result<Self, SignerError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| SignerError::Unavailable("no signer command configured".into()))?;

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            key,
            timeout: Duration::from_secs(30),
        })
    }

    /// Override the time allowed for the program to answer.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl TransactionSigner for CommandSigner {
    async fn sign(
        &self,
        account: &str,
        operations: &[Value],
    ) -> Result<SignedTransaction, SignerError> {
        let request = json!({ "account": account, "operations": operations }).to_string();

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env(POSTING_KEY_ENV_VAR, self.key.expose())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                SignerError::Unavailable(format!("failed to run '{}': {}", self.program, e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(request.as_bytes())
                .await
                .map_err(|e| SignerError::Unavailable(format!("failed to write request: {}", e)))?;
        }

        let timed_out = format!("signer timed out after {:?}", self.timeout);
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| SignerError::Unavailable(timed_out))?
            .map_err(|e| SignerError::Unavailable(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(match output.status.code() {
                Some(KEY_REJECTED_EXIT_CODE) => SignerError::Rejected(stderr),
                code => {
                    SignerError::Unavailable(format!("signer exited with {:?}: {}", code, stderr))
                }
            });
        }

        let value: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| SignerError::InvalidOutput(e.to_string()))?;
        let signed = value
            .get("signatures")
            .and_then(Value::as_array)
            .is_some_and(|signatures| !signatures.is_empty());
        if !signed {
            return Err(SignerError::InvalidOutput("transaction carries no signatures".into()));
        }

        tracing::debug!(account, "Transaction signed");
        Ok(SignedTransaction(value))
    }
}
