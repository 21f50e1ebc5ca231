//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pool, reader, writer, dispatcher, gauge:
//!     → logging.rs (tracing events: node failover, block progress, broadcasts)
//!     → metrics.rs (blocks read, notifications, broadcasts, node failures)
//!
//! Consumers:
//!     → stderr, pretty or one JSON object per line
//!     → Prometheus scrape endpoint, when enabled
//! ```
//!
//! # Design Decisions
//! - Logs go to stderr so `watch --json` output on stdout stays machine-readable
//! - Metric calls are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
