//! Retry logic.
//!
//! # Responsibilities
//! - Route each attempt through the pool, so every retry may land on a different node
//! - Feed outcomes back into endpoint health
//! - Back off exponentially (with jitter) between attempts
//!
//! # Design Decisions
//! - Authentication rejections return immediately; retrying cannot fix a bad key
//! - Duplicate-transaction rejections return immediately and do not count
//!   against the node
//! - Every other failure counts against the endpoint and is retried
//! - Exhaustion always surfaces as a ConnectionError naming the last node

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::blockchain::types::RpcResult;
use crate::config::RetryConfig;
use crate::error::{PodpingError, PodpingResult};
use crate::lifecycle::ShutdownSignal;
use crate::pool::{Endpoint, NodePool};
use crate::resilience::backoff::calculate_backoff;

/// Bounded retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base_delay_ms, self.max_delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }
}

/// Run `call` against pool endpoints until it succeeds or attempts run out.
pub async fn call_with_failover<T, F, Fut>(
    pool: &NodePool,
    policy: &RetryPolicy,
    operation: &'static str,
    call: F,
) -> PodpingResult<T>
where
    F: FnMut(Arc<Endpoint>) -> Fut,
    Fut: Future<Output = RpcResult<T>>,
{
    match failover(pool, policy, operation, None, call).await? {
        Some(value) => Ok(value),
        None => Err(PodpingError::connection(format!("{} was never attempted", operation), None)),
    }
}

/// Like [`call_with_failover`], but gives up with `Ok(None)` when `signal`
/// fires while waiting for an endpoint or backing off.
///
/// A call already in flight is allowed to finish.
pub async fn call_with_failover_until<T, F, Fut>(
    pool: &NodePool,
    policy: &RetryPolicy,
    operation: &'static str,
    signal: &mut ShutdownSignal,
    call: F,
) -> PodpingResult<Option<T>>
where
    F: FnMut(Arc<Endpoint>) -> Fut,
    Fut: Future<Output = RpcResult<T>>,
{
    failover(pool, policy, operation, Some(signal), call).await
}

async fn stopped(signal: Option<&mut ShutdownSignal>) {
    match signal {
        Some(signal) => signal.triggered().await,
        None => std::future::pending().await,
    }
}

async fn failover<T, F, Fut>(
    pool: &NodePool,
    policy: &RetryPolicy,
    operation: &'static str,
    mut signal: Option<&mut ShutdownSignal>,
    mut call: F,
) -> PodpingResult<Option<T>>
where
    F: FnMut(Arc<Endpoint>) -> Fut,
    Fut: Future<Output = RpcResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_failure = None;

    for attempt in 1..=max_attempts {
        let endpoint = tokio::select! {
            biased;
            _ = stopped(signal.as_deref_mut()) => return Ok(None),
            endpoint = pool.pick() => endpoint,
        };

        match call(endpoint.clone()).await {
            Ok(value) => {
                pool.report_success(&endpoint);
                return Ok(Some(value));
            }
            Err(err) if err.is_auth_rejection() => {
                tracing::warn!(
                    operation,
                    node = %endpoint.url(),
                    error = %err,
                    "Node rejected credentials, not retrying"
                );
                return Err(PodpingError::Authentication(err.to_string()));
            }
            Err(err) if err.is_duplicate_transaction() => {
                // The node is healthy; the chain already holds this transaction.
                tracing::warn!(
                    operation,
                    node = %endpoint.url(),
                    attempt,
                    error = %err,
                    "Node reports transaction already known, not retrying"
                );
                return Err(PodpingError::AlreadyBroadcast(err.to_string()));
            }
            Err(err) => {
                pool.report_failure(&endpoint);
                tracing::warn!(
                    operation,
                    node = %endpoint.url(),
                    attempt,
                    max_attempts,
                    error = %err,
                    "RPC call failed"
                );
                last_failure = Some((err, endpoint.url().to_string()));

                if attempt < max_attempts {
                    tokio::select! {
                        biased;
                        _ = stopped(signal.as_deref_mut()) => return Ok(None),
                        _ = tokio::time::sleep(policy.backoff(attempt)) => {}
                    }
                }
            }
        }
    }

    Err(match last_failure {
        Some((err, node)) => PodpingError::connection(
            format!("{} failed after {} attempt(s): {}", operation, max_attempts, err),
            Some(&node),
        ),
        None => PodpingError::connection(format!("{} was never attempted", operation), None),
    })
}
