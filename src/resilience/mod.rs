//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Remote call:
//!     → pool picks an endpoint
//!     → timeouts.rs (enforce request deadline)
//!     → On failure: report to pool, retries.rs backs off and picks again
//!     → Attempts exhausted: ConnectionError naming the last node
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Reads are retried freely; writes are retried only as re-deliveries of the
//!   same signed transaction
//! - Authentication and duplicate-transaction rejections are never retried
//! - A stop signal interrupts waits for a cooled-down endpoint and backoff
//!   sleeps, never an RPC already in flight

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use retries::{call_with_failover, call_with_failover_until, RetryPolicy};
