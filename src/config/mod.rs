//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → env overrides (PODPING_HIVE_ACCOUNT)
//!     → PodpingConfig (validated, immutable)
//!     → sections handed to pool, reader, writer
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Secrets (posting key) never live in the config file

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::PodpingConfig;
pub use schema::{
    LogFormat, ObservabilityConfig, PoolConfig, ReadMode, ReaderConfig, RetryConfig,
    TimeoutConfig, WriterConfig,
};
