//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Public Hive API nodes used when the config names none.
pub const DEFAULT_NODES: &[&str] = &[
    "https://api.hive.blog",
    "https://hived.emre.sh",
    "https://api.deathwing.me",
    "https://rpc.ausbit.dev",
    "https://rpc.ecency.com",
    "https://hive-api.arcange.eu",
    "https://api.openhive.network",
    "https://techcoderx.com",
    "https://rpc.mahdiyari.info",
];

/// Largest `custom_json` payload the chain accepts, in bytes.
pub const CHAIN_MAX_PAYLOAD_BYTES: usize = 8192;

/// Hive produces one block every three seconds.
pub const BLOCK_INTERVAL_MS: u64 = 3000;

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PodpingConfig {
    /// RPC node URLs, in preference order.
    pub nodes: Vec<String>,

    /// Endpoint health and cooldown settings.
    pub pool: PoolConfig,

    /// Block reader settings.
    pub reader: ReaderConfig,

    /// Broadcast settings.
    pub writer: WriterConfig,

    /// Retry configuration shared by reads and broadcasts.
    pub retries: RetryConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for PodpingConfig {
    fn default() -> Self {
        Self {
            nodes: DEFAULT_NODES.iter().map(|n| n.to_string()).collect(),
            pool: PoolConfig::default(),
            reader: ReaderConfig::default(),
            writer: WriterConfig::default(),
            retries: RetryConfig::default(),
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Endpoint pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Consecutive failures tolerated before an endpoint enters cooldown.
    pub failure_threshold: u32,

    /// Base cooldown in milliseconds, doubled per consecutive failure.
    pub cooldown_base_ms: u64,

    /// Upper bound on a single cooldown in milliseconds.
    pub cooldown_max_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_base_ms: 250,
            cooldown_max_ms: 60_000,
        }
    }
}

/// Which chain frontier the reader follows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadMode {
    /// Last irreversible block. Never observes reorganized data.
    #[default]
    Irreversible,
    /// Head block. Lower latency; a block may later be reorganized away.
    Head,
}

/// Block reader configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Delay between frontier polls once caught up, in milliseconds.
    pub poll_interval_ms: u64,

    /// Frontier to follow.
    pub read_mode: ReadMode,

    /// Block to start from. `None` starts at the current frontier.
    pub start_block: Option<u64>,

    /// Soft timeout for a single subscriber callback, in milliseconds.
    pub handler_timeout_ms: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: BLOCK_INTERVAL_MS,
            read_mode: ReadMode::Irreversible,
            start_block: None,
            handler_timeout_ms: 10_000,
        }
    }
}

/// Broadcast configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Hive account that signs notifications.
    /// Overridden by `PODPING_HIVE_ACCOUNT`.
    pub account: String,

    /// Validate and pack, but never submit.
    pub dry_run: bool,

    /// Maximum serialized payload size in bytes.
    pub max_payload_bytes: usize,

    /// External signing program and its arguments.
    /// The posting key is handed over in `PODPING_HIVE_POSTING_KEY`.
    pub signer_command: Vec<String>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            account: String::new(),
            dry_run: false,
            max_payload_bytes: CHAIN_MAX_PAYLOAD_BYTES,
            signer_command: Vec::new(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts per remote call, first attempt included.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Timeout configuration for RPC calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            request_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level filter (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "podping_relay=info,podping=info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
