//! Sequential block reader.
//!
//! # Responsibilities
//! - Follow the chain frontier (irreversible or head) block by block
//! - Fetch each block through the pool, failing over between nodes
//! - Decode notification operations and hand them to the dispatcher in
//!   `(block, ordinal)` order
//!
//! # Design Decisions
//! - The cursor advances only after a block has been fully delivered, so a
//!   failed fetch retries the same block and nothing is skipped
//! - Decode failures are data, not faults: they are logged at debug level
//! - Pool exhaustion on a block is fatal and stops the reader
//! - Stop requests are observed between blocks, during the poll sleep and
//!   while waiting for a cooled-down node; an RPC in flight is let finish
//! - A stop request stays pending until a run consumes it, so a stop issued
//!   before a spawned run is first polled still ends that run

use std::sync::Arc;
use std::time::Duration;

use crate::blockchain::types::{RpcError, SignedBlock};
use crate::blockchain::NodeRpc;
use crate::config::schema::CHAIN_MAX_PAYLOAD_BYTES;
use crate::config::{ReadMode, ReaderConfig};
use crate::error::{PodpingError, PodpingResult};
use crate::events::{EventDispatcher, NotificationEvent};
use crate::observability::metrics;
use crate::payload::{OperationContext, PayloadCodec};
use crate::pool::NodePool;
use crate::reader::state::{ReaderState, ReaderStats, SharedState, StartFrom};
use crate::lifecycle::ShutdownSignal;
use crate::resilience::{call_with_failover_until, RetryPolicy};

/// Control handle for a running reader.
#[derive(Debug, Clone)]
pub struct ReaderHandle {
    shared: Arc<SharedState>,
}

impl ReaderHandle {
    /// Ask the reader to stop.
    ///
    /// The block in progress completes first. A reader that is not running
    /// moves straight to `Stopped`, and its next run ends before fetching
    /// anything, which covers a run spawned but not yet polled.
    pub fn stop(&self) {
        self.shared.shutdown.trigger();
        if !self.shared.is_running() {
            self.shared.set_state(ReaderState::Stopped);
        }
    }

    pub fn state(&self) -> ReaderState {
        self.shared.state()
    }

    /// Next block to process, once a run has started.
    pub fn cursor(&self) -> Option<u64> {
        self.shared.cursor()
    }

    pub fn stats(&self) -> ReaderStats {
        self.shared.stats()
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }
}

/// Releases the run slot and re-arms the stop flag however the loop exits.
struct RunGuard<'a>(&'a SharedState);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.set_state(ReaderState::Stopped);
        self.0.shutdown.reset();
        self.0.finish();
    }
}

/// Streams notification events from the chain.
pub struct ChainReader {
    pool: Arc<NodePool>,
    rpc: Arc<dyn NodeRpc>,
    dispatcher: Arc<EventDispatcher>,
    codec: PayloadCodec,
    config: ReaderConfig,
    retry: RetryPolicy,
    shared: Arc<SharedState>,
}

impl ChainReader {
    pub fn new(
        pool: Arc<NodePool>,
        rpc: Arc<dyn NodeRpc>,
        dispatcher: Arc<EventDispatcher>,
        config: ReaderConfig,
    ) -> Self {
        Self {
            pool,
            rpc,
            dispatcher,
            codec: PayloadCodec::new(CHAIN_MAX_PAYLOAD_BYTES),
            config,
            retry: RetryPolicy::default(),
            shared: Arc::new(SharedState::new()),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    pub fn handle(&self) -> ReaderHandle {
        ReaderHandle {
            shared: self.shared.clone(),
        }
    }

    /// Run the poll loop until stopped or until the pool is exhausted.
    ///
    /// Returns the cursor (next unprocessed block) on a clean stop. Running
    /// a stopped reader again resumes from `start`. A reader told to start at
    /// the head but stopped before learning it fails with a validation error,
    /// since it has no cursor to report.
    pub async fn run(&self, start: StartFrom) -> PodpingResult<u64> {
        if !self.shared.try_begin() {
            return Err(PodpingError::Validation("reader is already running".into()));
        }
        let _guard = RunGuard(&self.shared);
        let mut signal = self.shared.shutdown.subscribe();

        self.shared.set_state(ReaderState::Polling);
        let mut cursor = match start {
            StartFrom::Block(block) => block,
            StartFrom::Head => {
                let frontier = self.frontier(&mut signal).await;
                match frontier.inspect_err(|e| self.log_fatal(e))? {
                    Some(frontier) => frontier,
                    None => {
                        return Err(PodpingError::Validation(
                            "reader was stopped before it started".into(),
                        ))
                    }
                }
            }
        };
        self.shared.set_cursor(cursor);

        tracing::info!(
            cursor,
            mode = ?self.config.read_mode,
            subscribers = self.dispatcher.len(),
            "Chain reader started"
        );

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        'poll: loop {
            if signal.is_triggered() {
                break;
            }

            self.shared.set_state(ReaderState::Polling);
            let frontier = self.frontier(&mut signal).await;
            let Some(frontier) = frontier.inspect_err(|e| self.log_fatal(e))? else {
                break;
            };

            if frontier < cursor {
                tracing::trace!(cursor, frontier, "Waiting for chain to advance");
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {}
                    _ = signal.triggered() => break,
                }
                continue;
            }

            while cursor <= frontier {
                if signal.is_triggered() {
                    break 'poll;
                }
                let processed = self.process_block(cursor, &mut signal).await;
                if !processed.inspect_err(|e| self.log_fatal(e))? {
                    break 'poll;
                }
                cursor += 1;
                self.shared.set_cursor(cursor);
            }
        }

        tracing::info!(cursor, "Chain reader stopped");
        Ok(cursor)
    }

    fn log_fatal(&self, err: &PodpingError) {
        tracing::error!(cursor = ?self.shared.cursor(), error = %err, "Chain reader halted");
    }

    /// Highest block the reader may process, per the configured mode.
    ///
    /// `None` when stopped while waiting for a node.
    async fn frontier(&self, signal: &mut ShutdownSignal) -> PodpingResult<Option<u64>> {
        let rpc = self.rpc.clone();
        let props = call_with_failover_until(
            &self.pool,
            &self.retry,
            "get_dynamic_global_properties",
            signal,
            |endpoint| {
                let rpc = rpc.clone();
                async move { rpc.chain_properties(endpoint.url()).await }
            },
        )
        .await?;

        Ok(props.map(|props| match self.config.read_mode {
            ReadMode::Irreversible => props.last_irreversible_block_num,
            ReadMode::Head => props.head_block_number,
        }))
    }

    async fn fetch_block(
        &self,
        block_number: u64,
        signal: &mut ShutdownSignal,
    ) -> PodpingResult<Option<SignedBlock>> {
        let rpc = self.rpc.clone();
        call_with_failover_until(&self.pool, &self.retry, "get_block", signal, |endpoint| {
            let rpc = rpc.clone();
            async move {
                // A node that reports the frontier but cannot serve the block is lagging.
                rpc.get_block(endpoint.url(), block_number)
                    .await?
                    .ok_or_else(|| {
                        RpcError::Malformed(format!("block {} not available", block_number))
                    })
            }
        })
        .await
    }

    /// Fetch, filter and deliver one block.
    ///
    /// Returns `false` if stopped before the block was fetched; nothing was
    /// delivered and the cursor must not move.
    async fn process_block(
        &self,
        block_number: u64,
        signal: &mut ShutdownSignal,
    ) -> PodpingResult<bool> {
        self.shared.set_state(ReaderState::Fetching);
        let Some(block) = self.fetch_block(block_number, signal).await? else {
            return Ok(false);
        };

        self.shared.set_state(ReaderState::Filtering);
        let events = self.decode_block(block_number, &block);

        self.shared.set_state(ReaderState::Delivering);
        let urls: usize = events.iter().map(NotificationEvent::len).sum();
        for event in &events {
            tracing::debug!(
                block = event.block_number,
                ordinal = event.ordinal,
                account = %event.account,
                urls = event.len(),
                "Notification observed"
            );
            self.dispatcher.dispatch(event).await;
        }

        self.shared.record_block(events.len() as u64, urls as u64);
        metrics::record_block_processed(block_number, events.len());
        Ok(true)
    }

    /// Decode every notification in `block`, in within-block order.
    fn decode_block(&self, block_number: u64, block: &SignedBlock) -> Vec<NotificationEvent> {
        let mut events = Vec::new();
        let mut ordinal: u32 = 0;

        for (index, transaction) in block.transactions.iter().enumerate() {
            let transaction_id = block.transaction_ids.get(index).map(String::as_str);

            for operation in &transaction.operations {
                let ctx = OperationContext {
                    block_number,
                    timestamp: block.timestamp,
                    transaction_id,
                    ordinal,
                };
                ordinal += 1;

                match self.codec.decode(operation, &ctx) {
                    Ok(event) => events.push(event),
                    Err(err) if err.is_unrelated() => {}
                    Err(err) => {
                        tracing::debug!(
                            block = block_number,
                            ordinal = ctx.ordinal,
                            error = %err,
                            "Skipping malformed notification"
                        );
                    }
                }
            }
        }

        events
    }
}

impl std::fmt::Debug for ChainReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainReader")
            .field("config", &self.config)
            .field("state", &self.shared.state())
            .field("cursor", &self.shared.cursor())
            .finish()
    }
}
