//! RPC endpoint pool.
//!
//! # Data Flow
//! ```text
//! Remote call needed
//!     → pool.rs pick(): skip endpoints cooling down,
//!       prefer least-recent failure (never-failed first, config order on ties)
//!     → caller performs the call
//!     → report_success() resets the endpoint / report_failure() counts it
//!     → past the failure threshold: exponential cooldown
//! ```
//!
//! # Design Decisions
//! - Pure selection state; no network I/O happens here
//! - Endpoints are never removed, only deprioritized, so a recovered node rejoins
//! - When every endpoint is cooling down, pick() waits for the earliest expiry
//!   instead of failing; this is the pool's only backpressure
//! - State is scoped to a pool instance, never global

pub mod endpoint;
pub mod pool;

pub use endpoint::{Endpoint, EndpointHealth};
pub use pool::{EndpointStatus, NodePool};
