//! Commute logging and credit accrual for GreenMile
//!
//! This crate converts logged commutes into carbon-credit accruals on the
//! commuting employee's ledger account, and runs the approval workflow that
//! gates a second credit adjustment.

use greenmile_core::storage::StorageError;
use greenmile_ledger::LedgerError;

pub mod accrual;
pub mod log;
pub mod record;

pub use accrual::{carbon_saved_kg, AccrualPolicy};
pub use log::{CommuteLog, CommuteSummary, CreditHistoryEntry, StatusUpdate};
pub use record::{Commute, CommuteMethod, CommuteStatus};

/// Error types for commute operations
#[derive(Debug, thiserror::Error)]
pub enum CommuteError {
    /// Bad input shape or range
    #[error("validation error: {0}")]
    Validation(String),

    /// Commute not found
    #[error("commute not found: {0}")]
    CommuteNotFound(String),

    /// Error from the credit ledger
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Error in the storage backend
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for commute operations
pub type CommuteResult<T> = Result<T, CommuteError>;
