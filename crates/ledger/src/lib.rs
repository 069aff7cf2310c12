//! Carbon-credit account ledger for GreenMile
//!
//! This crate tracks employer and employee credit balances, enforces the
//! non-negative balance invariant in one place, and executes the pooled team
//! transfer used by trade settlement.

use greenmile_core::storage::StorageError;

pub mod account;
pub mod ledger;
pub mod team;

pub use account::{Account, Role};
pub use ledger::{AccountDelta, CreditLedger, Settlement};
pub use team::{TeamMember, TeamView};

/// Error types for ledger operations
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Bad input shape or range
    #[error("validation error: {0}")]
    Validation(String),

    /// Account not found
    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// Account exists but has not been approved by an admin
    #[error("account is not approved: {0}")]
    AccountNotApproved(String),

    /// Caller holds the wrong role for the operation
    #[error("account {account_id} has role {actual}, operation requires {required}")]
    RoleMismatch {
        account_id: String,
        required: Role,
        actual: Role,
    },

    /// A debit would take a single account below zero
    #[error("insufficient balance on {account_id}: available {available}, requested {requested}")]
    InsufficientBalance {
        account_id: String,
        available: f64,
        requested: f64,
    },

    /// A team-level transfer or offer exceeds the pooled team balance
    #[error("insufficient team credits: available {available}, requested {requested}")]
    InsufficientTeamCredits {
        available: f64,
        requested: f64,
        employer: f64,
        employees: f64,
    },

    /// Error in the storage backend
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
