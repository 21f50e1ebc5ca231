//! Notification broadcaster.
//!
//! # Data Flow
//! ```text
//! post(urls, reason, medium)
//!     → URL validation (no I/O)
//!     → packing into size-bounded payloads
//!     → custom_json envelopes (all built before anything is sent)
//!     → per payload: sign once, deliver through the pool with failover
//!     → confirmed results, in submission order
//! ```
//!
//! # Design Decisions
//! - Validation, packing and encoding finish before the first submission,
//!   so bad input never leads to partial publication
//! - Retries re-deliver the same signed transaction; nothing is re-signed
//! - A failure partway reports the payloads already confirmed

use chrono::Utc;
use std::sync::Arc;
use url::Url;

use crate::blockchain::transaction::{
    BroadcastReceipt, BroadcastResult, CustomJsonOperation, PendingBroadcast, SignedTransaction,
};
use crate::blockchain::{NodeRpc, TransactionSigner};
use crate::config::schema::CHAIN_MAX_PAYLOAD_BYTES;
use crate::config::WriterConfig;
use crate::credits::{validate_account_name, CreditGauge, CreditReport};
use crate::error::{PodpingError, PodpingResult, PostError};
use crate::observability::metrics;
use crate::payload::{Medium, Payload, PayloadCodec, Reason, PAYLOAD_VERSION};
use crate::pool::NodePool;
use crate::resilience::{call_with_failover, RetryPolicy};
use crate::writer::packing::PayloadPacker;

/// Check that `raw` is an absolute URL with a scheme and a host.
pub fn validate_feed_url(raw: &str) -> PodpingResult<Url> {
    let url = Url::parse(raw)
        .map_err(|e| PodpingError::Validation(format!("invalid URL '{}': {}", raw, e)))?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err(PodpingError::Validation(format!("URL '{}' has no host", raw)));
    }
    Ok(url)
}

/// Builder for [`ChainWriter`].
pub struct ChainWriterBuilder {
    account: String,
    pool: Arc<NodePool>,
    rpc: Arc<dyn NodeRpc>,
    signer: Option<Arc<dyn TransactionSigner>>,
    retry: RetryPolicy,
    max_payload_bytes: usize,
    dry_run: bool,
    session_id: Option<u64>,
}

impl ChainWriterBuilder {
    pub fn signer(mut self, signer: Arc<dyn TransactionSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn max_payload_bytes(mut self, max_payload_bytes: usize) -> Self {
        self.max_payload_bytes = max_payload_bytes;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Fix the session id instead of drawing a random one.
    pub fn session_id(mut self, session_id: u64) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Apply the `writer` config section.
    pub fn config(self, config: &WriterConfig) -> Self {
        self.max_payload_bytes(config.max_payload_bytes).dry_run(config.dry_run)
    }

    pub fn build(self) -> PodpingResult<ChainWriter> {
        validate_account_name(&self.account).map_err(PodpingError::Validation)?;
        if self.signer.is_none() && !self.dry_run {
            return Err(PodpingError::Validation(
                "a signer is required unless dry-run is enabled".into(),
            ));
        }

        let session_id = self
            .session_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().as_u64_pair().0);
        let gauge = CreditGauge::new(self.pool.clone(), self.rpc.clone())
            .with_retry_policy(self.retry.clone());

        tracing::debug!(
            account = %self.account,
            session_id,
            dry_run = self.dry_run,
            "Chain writer ready"
        );

        Ok(ChainWriter {
            account: self.account,
            pool: self.pool,
            rpc: self.rpc,
            signer: self.signer,
            codec: PayloadCodec::new(self.max_payload_bytes),
            retry: self.retry,
            dry_run: self.dry_run,
            session_id,
            gauge,
        })
    }
}

/// Publishes feed notifications for one account.
///
/// Safe to share between tasks. Concurrent `post` calls are not ordered
/// relative to each other.
pub struct ChainWriter {
    account: String,
    pool: Arc<NodePool>,
    rpc: Arc<dyn NodeRpc>,
    signer: Option<Arc<dyn TransactionSigner>>,
    codec: PayloadCodec,
    retry: RetryPolicy,
    dry_run: bool,
    session_id: u64,
    gauge: CreditGauge,
}

impl ChainWriter {
    pub fn builder(
        account: impl Into<String>,
        pool: Arc<NodePool>,
        rpc: Arc<dyn NodeRpc>,
    ) -> ChainWriterBuilder {
        ChainWriterBuilder {
            account: account.into(),
            pool,
            rpc,
            signer: None,
            retry: RetryPolicy::default(),
            max_payload_bytes: CHAIN_MAX_PAYLOAD_BYTES,
            dry_run: false,
            session_id: None,
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Publish `urls`, split into as few payloads as the size limit allows.
    ///
    /// Returns one result per payload, in submission order.
    pub async fn post(
        &self,
        urls: &[String],
        reason: Reason,
        medium: Medium,
    ) -> Result<Vec<BroadcastResult>, PostError> {
        let operations = self.prepare(urls, reason, medium)?;

        if self.dry_run {
            tracing::info!(
                account = %self.account,
                payloads = operations.len(),
                urls = urls.len(),
                "Dry run, nothing submitted"
            );
            return Ok(operations
                .iter()
                .map(|(_, url_count)| {
                    metrics::record_broadcast("dry_run");
                    BroadcastResult::dry_run(*url_count)
                })
                .collect());
        }

        let mut completed = Vec::with_capacity(operations.len());
        for (index, (operation, url_count)) in operations.into_iter().enumerate() {
            match self.publish(operation, url_count).await {
                Ok(result) => completed.push(result),
                Err(error) => {
                    metrics::record_broadcast("failed");
                    tracing::error!(
                        account = %self.account,
                        payload = index,
                        confirmed = completed.len(),
                        error = %error,
                        "Broadcast failed"
                    );
                    return Err(PostError {
                        completed,
                        failed_index: index,
                        error,
                    });
                }
            }
        }

        Ok(completed)
    }

    /// Publish a single URL.
    pub async fn post_one(
        &self,
        url: &str,
        reason: Reason,
        medium: Medium,
    ) -> PodpingResult<BroadcastResult> {
        let mut results = self
            .post(&[url.to_string()], reason, medium)
            .await
            .map_err(|e| e.error)?;
        results
            .pop()
            .ok_or_else(|| PodpingError::Network("broadcast produced no result".into()))
    }

    /// Resource credits of the writer's own account.
    pub async fn credits(&self) -> PodpingResult<CreditReport> {
        self.gauge.get_credits(&self.account).await
    }

    /// Validate, pack and encode. Pure: no I/O happens here.
    fn prepare(
        &self,
        urls: &[String],
        reason: Reason,
        medium: Medium,
    ) -> PodpingResult<Vec<(CustomJsonOperation, usize)>> {
        if urls.is_empty() {
            return Err(PodpingError::Validation("at least one URL is required".into()));
        }
        for url in urls {
            validate_feed_url(url)?;
        }

        let packer = PayloadPacker::new(medium, reason, self.codec.max_payload_bytes())?;
        let timestamp_ns = Utc::now().timestamp_nanos_opt().map_or(0, |ns| ns.max(0) as u64);

        packer
            .pack(urls)?
            .into_iter()
            .map(|chunk| {
                let payload = Payload {
                    version: PAYLOAD_VERSION.to_string(),
                    medium,
                    reason,
                    iris: chunk.to_vec(),
                    timestamp_ns,
                    session_id: self.session_id,
                };
                self.codec
                    .encode(&self.account, &payload)
                    .map(|op| (op, chunk.len()))
                    .map_err(|e| PodpingError::Validation(e.to_string()))
            })
            .collect()
    }

    /// Sign one payload and deliver it.
    async fn publish(
        &self,
        operation: CustomJsonOperation,
        url_count: usize,
    ) -> PodpingResult<BroadcastResult> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| PodpingError::Validation("no signer configured".into()))?;

        let signed = signer.sign(&self.account, &[operation.to_operation()]).await?;
        let mut pending = PendingBroadcast::new(operation.json);

        let result = self.submit(&signed, &mut pending).await;
        match result {
            Ok(receipt) if receipt.expired => {
                pending.fail("expired");
                Err(PodpingError::Network(format!(
                    "transaction {} expired before inclusion",
                    receipt.id
                )))
            }
            Ok(receipt) => {
                tracing::info!(
                    account = %self.account,
                    tx = %receipt.id,
                    block = receipt.block_num,
                    urls = url_count,
                    attempts = pending.attempts,
                    "Notification broadcast"
                );
                let result = BroadcastResult {
                    transaction_id: receipt.id.clone(),
                    block_number: receipt.block_num,
                    url_count,
                    dry_run: false,
                };
                pending.confirm(receipt);
                metrics::record_broadcast("confirmed");
                Ok(result)
            }
            Err(PodpingError::AlreadyBroadcast(reason)) if pending.attempts > 1 => {
                // An earlier attempt reached the chain but its reply was lost.
                tracing::warn!(
                    account = %self.account,
                    urls = url_count,
                    attempts = pending.attempts,
                    "Transaction was likely included by an earlier attempt"
                );
                pending.fail("already broadcast");
                Err(PodpingError::AlreadyBroadcast(format!(
                    "transaction may already be included after {} attempt(s), do not re-post: {}",
                    pending.attempts, reason
                )))
            }
            Err(error) => {
                pending.fail(error.to_string());
                Err(error)
            }
        }
    }

    async fn submit(
        &self,
        signed: &SignedTransaction,
        pending: &mut PendingBroadcast,
    ) -> PodpingResult<BroadcastReceipt> {
        let rpc = self.rpc.clone();
        call_with_failover(&self.pool, &self.retry, "broadcast_transaction", |endpoint| {
            pending.record_attempt(endpoint.url());
            let rpc = rpc.clone();
            async move { rpc.broadcast_transaction(endpoint.url(), signed).await }
        })
        .await
    }
}

impl std::fmt::Debug for ChainWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainWriter")
            .field("account", &self.account)
            .field("session_id", &self.session_id)
            .field("dry_run", &self.dry_run)
            .field("max_payload_bytes", &self.codec.max_payload_bytes())
            .finish()
    }
}
