//! Notification broadcasting.
//!
//! - chain_writer.rs: validation, signing and delivery with failover
//! - packing.rs: splitting URL lists into size-bounded payloads

pub mod chain_writer;
pub mod packing;

pub use chain_writer::{validate_feed_url, ChainWriter, ChainWriterBuilder};
pub use packing::PayloadPacker;
