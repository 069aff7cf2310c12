//! Trade offer types.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use greenmile_core::utils::timestamp_secs;

/// Lifecycle of a trade offer. `Accepted` and `Cancelled` are terminal; an
/// offer never re-opens once it leaves `Available`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Available,
    Accepted,
    Cancelled,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Available => "available",
            OfferStatus::Accepted => "accepted",
            OfferStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An offer to sell team credits, posted by an employer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeOffer {
    pub id: String,
    /// Selling employer
    pub employer_id: String,
    /// Seller's company name, denormalized for listings
    pub company_name: Option<String>,
    /// Credits for sale
    pub amount: f64,
    pub status: OfferStatus,
    /// Buying employer, set when the offer is accepted
    pub acceptor_id: Option<String>,
    pub created_at: u64,
    pub accepted_at: Option<u64>,
}

impl TradeOffer {
    pub(crate) fn new(employer_id: &str, company_name: Option<String>, amount: f64) -> Self {
        Self {
            id: format!("offer-{}", Uuid::new_v4()),
            employer_id: employer_id.to_string(),
            company_name,
            amount,
            status: OfferStatus::Available,
            acceptor_id: None,
            created_at: timestamp_secs(),
            accepted_at: None,
        }
    }

    /// Whether the offer has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, OfferStatus::Accepted | OfferStatus::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_offers_are_available() {
        let offer = TradeOffer::new("employer-1", Some("Acme".to_string()), 10.0);
        assert_eq!(offer.status, OfferStatus::Available);
        assert!(!offer.is_terminal());
        assert!(offer.acceptor_id.is_none());
    }

    #[test]
    fn accepted_and_cancelled_are_terminal() {
        let mut offer = TradeOffer::new("employer-1", None, 10.0);
        offer.status = OfferStatus::Accepted;
        assert!(offer.is_terminal());
        offer.status = OfferStatus::Cancelled;
        assert!(offer.is_terminal());
    }
}
