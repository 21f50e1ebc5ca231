//! Reader state shared between the polling task and its handles.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

use crate::config::ReaderConfig;
use crate::lifecycle::Shutdown;

/// Phase of the reader loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReaderState {
    Idle,
    /// Waiting for the frontier to reach the cursor.
    Polling,
    Fetching,
    Filtering,
    Delivering,
    /// Terminal until the reader is run again.
    Stopped,
}

impl ReaderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReaderState::Idle => "idle",
            ReaderState::Polling => "polling",
            ReaderState::Fetching => "fetching",
            ReaderState::Filtering => "filtering",
            ReaderState::Delivering => "delivering",
            ReaderState::Stopped => "stopped",
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ReaderState::Polling,
            2 => ReaderState::Fetching,
            3 => ReaderState::Filtering,
            4 => ReaderState::Delivering,
            5 => ReaderState::Stopped,
            _ => ReaderState::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ReaderState::Idle => 0,
            ReaderState::Polling => 1,
            ReaderState::Fetching => 2,
            ReaderState::Filtering => 3,
            ReaderState::Delivering => 4,
            ReaderState::Stopped => 5,
        }
    }
}

impl fmt::Display for ReaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a run begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartFrom {
    /// The current frontier, skipping any backlog.
    Head,
    /// A specific block, replaying history from there.
    Block(u64),
}

impl StartFrom {
    pub fn from_config(config: &ReaderConfig) -> Self {
        config.start_block.map_or(StartFrom::Head, StartFrom::Block)
    }
}

/// Counters accumulated over the reader's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    pub blocks_processed: u64,
    pub events_delivered: u64,
    pub urls_seen: u64,
}

const NO_CURSOR: u64 = u64::MAX;

#[derive(Debug)]
pub(crate) struct SharedState {
    state: AtomicU8,
    cursor: AtomicU64,
    running: AtomicBool,
    pub(crate) shutdown: Shutdown,
    blocks_processed: AtomicU64,
    events_delivered: AtomicU64,
    urls_seen: AtomicU64,
}

impl SharedState {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(ReaderState::Idle.as_u8()),
            cursor: AtomicU64::new(NO_CURSOR),
            running: AtomicBool::new(false),
            shutdown: Shutdown::new(),
            blocks_processed: AtomicU64::new(0),
            events_delivered: AtomicU64::new(0),
            urls_seen: AtomicU64::new(0),
        }
    }

    pub(crate) fn state(&self) -> ReaderState {
        ReaderState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: ReaderState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    pub(crate) fn cursor(&self) -> Option<u64> {
        match self.cursor.load(Ordering::Acquire) {
            NO_CURSOR => None,
            cursor => Some(cursor),
        }
    }

    pub(crate) fn set_cursor(&self, cursor: u64) {
        self.cursor.store(cursor, Ordering::Release);
    }

    /// Claim the single run slot. Returns false if a run is in progress.
    pub(crate) fn try_begin(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn finish(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn record_block(&self, events: u64, urls: u64) {
        self.blocks_processed.fetch_add(1, Ordering::Relaxed);
        self.events_delivered.fetch_add(events, Ordering::Relaxed);
        self.urls_seen.fetch_add(urls, Ordering::Relaxed);
    }

    pub(crate) fn stats(&self) -> ReaderStats {
        ReaderStats {
            blocks_processed: self.blocks_processed.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            urls_seen: self.urls_seen.load(Ordering::Relaxed),
        }
    }
}
