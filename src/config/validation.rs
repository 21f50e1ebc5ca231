//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate node URLs and value ranges (timeouts > 0, sizes within chain limits)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PodpingConfig → Result<(), Vec<ConfigIssue>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::{PodpingConfig, CHAIN_MAX_PAYLOAD_BYTES};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ConfigIssue {
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Check a node URL: must be absolute http(s) with a host.
pub fn validate_node_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| format!("invalid URL '{}': {}", raw, e))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}' in '{}'", url.scheme(), raw));
    }
    if url.host().is_none() {
        return Err(format!("missing host in '{}'", raw));
    }
    Ok(url)
}

/// Validate a parsed configuration.
pub fn validate_config(config: &PodpingConfig) -> Result<(), Vec<ConfigIssue>> {
    let mut issues = Vec::new();

    if config.nodes.is_empty() {
        issues.push(ConfigIssue::new("nodes", "at least one node is required"));
    }
    for (i, node) in config.nodes.iter().enumerate() {
        if let Err(message) = validate_node_url(node) {
            issues.push(ConfigIssue::new(&format!("nodes[{}]", i), message));
        }
    }

    if config.pool.cooldown_base_ms == 0 {
        issues.push(ConfigIssue::new("pool.cooldown_base_ms", "must be greater than zero"));
    }
    if config.pool.cooldown_base_ms > config.pool.cooldown_max_ms {
        issues.push(ConfigIssue::new(
            "pool.cooldown_max_ms",
            "must not be smaller than pool.cooldown_base_ms",
        ));
    }

    if config.reader.poll_interval_ms == 0 {
        issues.push(ConfigIssue::new("reader.poll_interval_ms", "must be greater than zero"));
    }
    if config.reader.handler_timeout_ms == 0 {
        issues.push(ConfigIssue::new("reader.handler_timeout_ms", "must be greater than zero"));
    }

    let max_payload_bytes = config.writer.max_payload_bytes;
    if max_payload_bytes == 0 || max_payload_bytes > CHAIN_MAX_PAYLOAD_BYTES {
        issues.push(ConfigIssue::new(
            "writer.max_payload_bytes",
            format!("must be between 1 and {}", CHAIN_MAX_PAYLOAD_BYTES),
        ));
    }

    if config.retries.max_attempts == 0 {
        issues.push(ConfigIssue::new("retries.max_attempts", "must be at least 1"));
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        issues.push(ConfigIssue::new(
            "retries.max_delay_ms",
            "must not be smaller than retries.base_delay_ms",
        ));
    }

    if config.timeouts.connect_secs == 0 {
        issues.push(ConfigIssue::new("timeouts.connect_secs", "must be greater than zero"));
    }
    if config.timeouts.request_secs == 0 {
        issues.push(ConfigIssue::new("timeouts.request_secs", "must be greater than zero"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        issues.push(ConfigIssue::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}
