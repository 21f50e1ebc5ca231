//! Endpoint pool management.
//!
//! # Responsibilities
//! - Hold the configured RPC endpoints
//! - Select the next endpoint to use
//! - Apply failure/success reports and cooldowns

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::config::validation::validate_node_url;
use crate::config::{PodpingConfig, PoolConfig};
use crate::error::{PodpingError, PodpingResult};
use crate::observability::metrics;
use crate::pool::endpoint::Endpoint;

/// Point-in-time view of one endpoint, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointStatus {
    pub url: String,
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub cooldown_remaining: Option<Duration>,
}

/// Pool of interchangeable RPC endpoints.
#[derive(Debug)]
pub struct NodePool {
    endpoints: Vec<Arc<Endpoint>>,
    config: PoolConfig,
    /// Wakes waiters in `pick()` when a degraded endpoint recovers early.
    recovered: Notify,
}

impl NodePool {
    /// Create a pool from node URLs.
    ///
    /// Fails with a validation error if the list is empty or any URL is invalid.
    pub fn new(urls: &[String], config: PoolConfig) -> PodpingResult<Self> {
        if urls.is_empty() {
            return Err(PodpingError::Validation("node pool needs at least one endpoint".into()));
        }

        let endpoints = urls
            .iter()
            .map(|raw| {
                validate_node_url(raw)
                    .map(|url| Arc::new(Endpoint::new(url)))
                    .map_err(PodpingError::Validation)
            })
            .collect::<PodpingResult<Vec<_>>>()?;

        tracing::debug!(endpoints = endpoints.len(), "Node pool created");

        Ok(Self {
            endpoints,
            config,
            recovered: Notify::new(),
        })
    }

    /// Create a pool from the `nodes` and `pool` config sections.
    pub fn from_config(config: &PodpingConfig) -> PodpingResult<Self> {
        Self::new(&config.nodes, config.pool.clone())
    }

    /// Select an endpoint without waiting.
    ///
    /// Returns the earliest cooldown expiry if every endpoint is cooling down.
    pub fn try_pick(&self) -> Result<Arc<Endpoint>, Instant> {
        let now = Instant::now();
        let snapshot: Vec<_> = self
            .endpoints
            .iter()
            .map(|endpoint| (endpoint, endpoint.health()))
            .collect();

        // Never-failed endpoints sort first (None < Some); ties keep config order.
        let available = snapshot
            .iter()
            .filter(|(_, health)| !health.in_cooldown(now))
            .min_by_key(|(_, health)| health.last_failure);

        if let Some((endpoint, _)) = available {
            return Ok(Arc::clone(endpoint));
        }

        let earliest = snapshot
            .iter()
            .filter_map(|(_, health)| health.cooldown_until)
            .min()
            .unwrap_or(now);
        Err(earliest)
    }

    /// Select an endpoint, waiting for a cooldown to expire if necessary.
    pub async fn pick(&self) -> Arc<Endpoint> {
        loop {
            let recovered = self.recovered.notified();
            tokio::pin!(recovered);
            recovered.as_mut().enable();

            match self.try_pick() {
                Ok(endpoint) => return endpoint,
                Err(until) => {
                    let wait = until.saturating_duration_since(Instant::now());
                    tracing::warn!(
                        wait_ms = wait.as_millis() as u64,
                        "All endpoints cooling down, waiting"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep_until(until) => {}
                        _ = &mut recovered => {}
                    }
                }
            }
        }
    }

    /// Record a failed call against `endpoint`.
    pub fn report_failure(&self, endpoint: &Endpoint) {
        metrics::record_node_failure(endpoint.url().as_str());

        if let Some(cooldown) = endpoint.mark_failure(&self.config, Instant::now()) {
            metrics::record_endpoint_health(endpoint.url().as_str(), false);
            tracing::warn!(
                node = %endpoint.url(),
                failures = endpoint.health().consecutive_failures,
                cooldown_ms = cooldown.as_millis() as u64,
                "Endpoint entering cooldown"
            );
        }
    }

    /// Record a successful call against `endpoint`.
    pub fn report_success(&self, endpoint: &Endpoint) {
        if endpoint.mark_success() {
            metrics::record_endpoint_health(endpoint.url().as_str(), true);
            tracing::debug!(node = %endpoint.url(), "Endpoint recovered");
            self.recovered.notify_waiters();
        }
    }

    /// All endpoints, in configuration order.
    pub fn endpoints(&self) -> &[Arc<Endpoint>] {
        &self.endpoints
    }

    /// Health overview of every endpoint.
    pub fn status(&self) -> Vec<EndpointStatus> {
        let now = Instant::now();
        self.endpoints
            .iter()
            .map(|endpoint| {
                let health = endpoint.health();
                EndpointStatus {
                    url: endpoint.url().to_string(),
                    consecutive_failures: health.consecutive_failures,
                    total_failures: health.total_failures,
                    cooldown_remaining: health
                        .cooldown_until
                        .filter(|until| *until > now)
                        .map(|until| until - now),
                }
            })
            .collect()
    }
}
