//! Block reader.
//!
//! - chain_reader.rs: the poll loop and its control handle
//! - state.rs: loop phases, start positions and counters

pub mod chain_reader;
pub mod state;

pub use chain_reader::{ChainReader, ReaderHandle};
pub use state::{ReaderState, ReaderStats, StartFrom};
