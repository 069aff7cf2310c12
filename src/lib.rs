//! GreenMile: a carbon-credit ledger and trading system for employee
//! commutes.
//!
//! Employees log commutes and earn credits for the carbon they save
//! relative to driving; employers trade their team's pooled credits with
//! other companies. This facade re-exports the member crates.

pub use greenmile_commute as commute;
pub use greenmile_core as core;
pub use greenmile_ledger as ledger;
pub use greenmile_trading as trading;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
