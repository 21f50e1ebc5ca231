//! Resource-credit reporting.

pub mod gauge;

pub use gauge::{validate_account_name, CreditGauge, CreditReport};
