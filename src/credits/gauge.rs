//! Resource-credit gauge.
//!
//! Hive stores each account's manabar as of its last use; the live value is
//! obtained by applying linear regeneration since `last_update_time`. The
//! gauge only reports. Whether to hold back a broadcast is the caller's call.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::blockchain::types::RcAccount;
use crate::blockchain::NodeRpc;
use crate::error::{PodpingError, PodpingResult};
use crate::observability::metrics;
use crate::pool::NodePool;
use crate::resilience::{call_with_failover, RetryPolicy};

/// Seconds for an empty manabar to refill completely (5 days).
pub const RC_REGENERATION_SECS: i64 = 432_000;

/// Remaining broadcast budget of one account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreditReport {
    pub account: String,
    /// Mana available now, regeneration included.
    pub current_mana: u64,
    pub max_mana: u64,
    /// `current_mana / max_mana` on a 0-100 scale.
    pub percentage: f64,
}

impl CreditReport {
    /// Build a report from raw node data as of `now` (unix seconds).
    pub fn from_rc_account(rc: &RcAccount, now: i64) -> Self {
        let current_mana = regenerated_mana(
            rc.rc_manabar.current_mana,
            rc.max_rc,
            rc.rc_manabar.last_update_time,
            now,
        );
        let percentage = if rc.max_rc == 0 {
            0.0
        } else {
            current_mana as f64 * 100.0 / rc.max_rc as f64
        };

        Self {
            account: rc.account.clone(),
            current_mana,
            max_mana: rc.max_rc,
            percentage,
        }
    }

    pub fn is_below(&self, percentage: f64) -> bool {
        self.percentage < percentage
    }
}

/// Mana after linear regeneration from `last_update` to `now`, capped at `max`.
pub fn regenerated_mana(current: u64, max: u64, last_update: i64, now: i64) -> u64 {
    let elapsed = now.saturating_sub(last_update).clamp(0, RC_REGENERATION_SECS) as u128;
    let regenerated = max as u128 * elapsed / RC_REGENERATION_SECS as u128;
    (current as u128 + regenerated).min(max as u128) as u64
}

/// Check a Hive account name.
///
/// 3 to 16 characters; dot-separated segments of at least three characters,
/// each starting with a letter, ending with a letter or digit, and made of
/// lowercase letters, digits and hyphens.
pub fn validate_account_name(name: &str) -> Result<(), String> {
    if !(3..=16).contains(&name.len()) {
        return Err(format!("account name '{}' must be 3 to 16 characters", name));
    }

    for segment in name.split('.') {
        let bytes = segment.as_bytes();
        let valid = bytes.len() >= 3
            && bytes[0].is_ascii_lowercase()
            && bytes[bytes.len() - 1].is_ascii_alphanumeric()
            && bytes
                .iter()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-');
        if !valid {
            return Err(format!("account name '{}' is not a valid Hive account", name));
        }
    }

    Ok(())
}

/// Queries resource credits through the node pool.
#[derive(Clone)]
pub struct CreditGauge {
    pool: Arc<NodePool>,
    rpc: Arc<dyn NodeRpc>,
    retry: RetryPolicy,
}

impl CreditGauge {
    pub fn new(pool: Arc<NodePool>, rpc: Arc<dyn NodeRpc>) -> Self {
        Self {
            pool,
            rpc,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Current budget of `account`.
    ///
    /// Fails with a validation error for malformed or unknown accounts.
    pub async fn get_credits(&self, account: &str) -> PodpingResult<CreditReport> {
        validate_account_name(account).map_err(PodpingError::Validation)?;

        let rpc = self.rpc.clone();
        let owned = account.to_string();
        let rc = call_with_failover(&self.pool, &self.retry, "find_rc_accounts", |endpoint| {
            let rpc = rpc.clone();
            let account = owned.clone();
            async move { rpc.find_rc_account(endpoint.url(), &account).await }
        })
        .await?
        .ok_or_else(|| PodpingError::Validation(format!("account '{}' does not exist", account)))?;

        let report = CreditReport::from_rc_account(&rc, Utc::now().timestamp());
        metrics::record_credits(account, report.percentage);
        tracing::debug!(
            account,
            current = report.current_mana,
            max = report.max_mana,
            percentage = report.percentage,
            "Resource credits"
        );

        Ok(report)
    }
}
