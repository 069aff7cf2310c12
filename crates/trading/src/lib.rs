//! Team credit trading for GreenMile
//!
//! Employers post offers to sell their team's pooled credits; another
//! employer accepts an offer and the ledger settles the transfer atomically.
//! Offers carry no escrow, so solvency is only decided at settlement.

use greenmile_core::storage::StorageError;
use greenmile_ledger::LedgerError;

pub mod engine;
pub mod offer;

pub use engine::{AcceptedTrade, TradeDirection, TradeHistory, TradeRecord, TradingEngine};
pub use offer::{OfferStatus, TradeOffer};

/// Error types for trading operations
#[derive(Debug, thiserror::Error)]
pub enum TradingError {
    /// Bad input shape or range
    #[error("validation error: {0}")]
    Validation(String),

    /// Caller is not allowed to perform this operation
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Offer not found
    #[error("offer not found: {0}")]
    OfferNotFound(String),

    /// Offer exists but is no longer open for acceptance
    #[error("offer {id} is not available (status: {status})")]
    OfferNotAvailable { id: String, status: OfferStatus },

    /// Error from the credit ledger
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Error in the storage backend
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for trading operations
pub type TradingResult<T> = Result<T, TradingError>;
