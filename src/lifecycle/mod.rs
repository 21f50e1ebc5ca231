//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     stop() / signal → flag set → reader loop observes at next checkpoint → exit
//!
//! Signals (signals.rs):
//!     SIGINT (Ctrl+C) → trigger graceful stop
//! ```
//!
//! # Design Decisions
//! - Stop is cooperative: in-flight RPC calls complete, no block is abandoned midway
//! - The flag is level-triggered, so a stop issued before anyone waits is not lost

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
