//! Endpoint abstraction.
//!
//! # Responsibilities
//! - Represent a single RPC node
//! - Track consecutive and lifetime failures
//! - Track the cooldown deadline once the failure threshold is exceeded

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

use crate::config::PoolConfig;
use crate::resilience::backoff::cooldown_delay;

/// Snapshot of an endpoint's health.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndpointHealth {
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Failures over the endpoint's lifetime.
    pub total_failures: u64,
    /// When the most recent failure was reported.
    pub last_failure: Option<Instant>,
    /// The endpoint is not selectable before this instant.
    pub cooldown_until: Option<Instant>,
}

impl EndpointHealth {
    /// Whether the endpoint is cooling down at `now`.
    pub fn in_cooldown(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| until > now)
    }
}

/// A single RPC node.
#[derive(Debug)]
pub struct Endpoint {
    url: Url,
    health: Mutex<EndpointHealth>,
}

impl Endpoint {
    /// Create a healthy endpoint.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            health: Mutex::new(EndpointHealth::default()),
        }
    }

    /// The node's RPC URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Current health snapshot.
    pub fn health(&self) -> EndpointHealth {
        *self.health.lock().expect("endpoint health mutex poisoned")
    }

    /// Record a failure. Returns the cooldown applied, if the threshold was exceeded.
    pub(crate) fn mark_failure(&self, config: &PoolConfig, now: Instant) -> Option<Duration> {
        let mut health = self.health.lock().expect("endpoint health mutex poisoned");
        health.consecutive_failures = health.consecutive_failures.saturating_add(1);
        health.total_failures += 1;
        health.last_failure = Some(now);

        if health.consecutive_failures > config.failure_threshold {
            let cooldown = cooldown_delay(
                health.consecutive_failures,
                config.cooldown_base_ms,
                config.cooldown_max_ms,
            );
            health.cooldown_until = Some(now + cooldown);
            return Some(cooldown);
        }
        None
    }

    /// Record a success. Returns true if the endpoint had been degraded.
    pub(crate) fn mark_success(&self) -> bool {
        let mut health = self.health.lock().expect("endpoint health mutex poisoned");
        let was_degraded = health.consecutive_failures > 0 || health.cooldown_until.is_some();
        health.consecutive_failures = 0;
        health.cooldown_until = None;
        was_degraded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint::new(Url::parse("https://api.hive.blog").unwrap())
    }

    #[test]
    fn test_threshold_then_cooldown() {
        let config = PoolConfig {
            failure_threshold: 2,
            cooldown_base_ms: 100,
            cooldown_max_ms: 10_000,
        };
        let ep = endpoint();
        let now = Instant::now();

        assert_eq!(ep.mark_failure(&config, now), None);
        assert_eq!(ep.mark_failure(&config, now), None);
        // Third consecutive failure exceeds the threshold: 100ms * 2^3
        assert_eq!(ep.mark_failure(&config, now), Some(Duration::from_millis(800)));

        let health = ep.health();
        assert_eq!(health.consecutive_failures, 3);
        assert!(health.in_cooldown(now));
        assert!(!health.in_cooldown(now + Duration::from_millis(800)));
    }

    #[test]
    fn test_success_resets() {
        let config = PoolConfig {
            failure_threshold: 0,
            cooldown_base_ms: 100,
            cooldown_max_ms: 10_000,
        };
        let ep = endpoint();
        ep.mark_failure(&config, Instant::now());

        assert!(ep.mark_success());
        let health = ep.health();
        assert_eq!(health.consecutive_failures, 0);
        assert_eq!(health.total_failures, 1);
        assert_eq!(health.cooldown_until, None);

        assert!(!ep.mark_success());
    }
}
