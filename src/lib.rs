//! Podping relay library.
//!
//! Publishes and follows podcast feed-update notifications carried as
//! `custom_json` operations on the Hive blockchain.
//!
//! # Architecture Overview
//!
//! ```text
//!   ChainWriter ──▶ NodePool ──▶ Hive nodes ──▶ NodePool ──▶ ChainReader
//!       │              ▲                                        │
//!       │              │                                        ▼
//!   PayloadPacker   CreditGauge                           PayloadCodec
//!   PayloadCodec                                                │
//!   TransactionSigner                                           ▼
//!                                                        EventDispatcher
//!                                                               │
//!                                                               ▼
//!                                                        subscriber callbacks
//! ```

// Chain access
pub mod blockchain;
pub mod pool;
pub mod resilience;

// Notification pipeline
pub mod credits;
pub mod events;
pub mod payload;
pub mod reader;
pub mod writer;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use blockchain::{CommandSigner, HiveRpcClient, NodeRpc, PostingKey, TransactionSigner};
pub use config::PodpingConfig;
pub use credits::{CreditGauge, CreditReport};
pub use error::{PodpingError, PodpingResult, PostError};
pub use events::{EventDispatcher, HandlerError, NotificationEvent, NotificationHandler};
pub use payload::{Medium, PayloadCodec, Reason};
pub use pool::NodePool;
pub use reader::{ChainReader, ReaderHandle, ReaderState, StartFrom};
pub use writer::ChainWriter;
