//! Trading engine: offer lifecycle and settlement orchestration.
//!
//! The offers map is the concurrency authority for acceptance. The write
//! lock is held across the availability check, the ledger settlement, and
//! the status flip, so two concurrent accepts of one offer serialize and
//! exactly one can succeed. Lock order is offers, then the ledger's own
//! internal locks.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{error, info};

use greenmile_core::notify::{Notification, Notifier};
use greenmile_core::storage::{JsonStorage, Storage};
use greenmile_core::utils::timestamp_secs;
use greenmile_ledger::{CreditLedger, Role, Settlement, TeamView};

use crate::offer::{OfferStatus, TradeOffer};
use crate::{TradingError, TradingResult};

const OFFERS_PATH: &str = "trading/offers";

/// An accepted offer together with the ledger settlement that paid for it
#[derive(Debug, Clone)]
pub struct AcceptedTrade {
    pub offer: TradeOffer,
    pub settlement: Settlement,
}

/// Which side of a trade a company was on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeDirection {
    Incoming,
    Outgoing,
}

/// One row in a company's trade history
#[derive(Debug, Clone, Serialize)]
pub struct TradeRecord {
    pub offer_id: String,
    /// Acceptance time for settled trades, creation time otherwise
    pub date: u64,
    pub amount: f64,
    pub direction: TradeDirection,
    pub status: OfferStatus,
    /// Counterparty company, `None` while the offer is still open
    pub partner_company: Option<String>,
}

/// A company's trading activity plus its current tradable total
#[derive(Debug, Clone, Serialize)]
pub struct TradeHistory {
    pub employer_id: String,
    pub company_name: Option<String>,
    /// Current team total, computed fresh
    pub total_credits: f64,
    /// Newest first
    pub trades: Vec<TradeRecord>,
}

/// The trading engine: posts, lists, accepts and cancels trade offers,
/// delegating settlement to the credit ledger.
pub struct TradingEngine {
    /// Storage for offer data
    storage: Arc<dyn Storage>,
    /// The ledger that settles accepted offers
    ledger: Arc<CreditLedger>,
    /// Sink for post-commit notifications
    notifier: Arc<dyn Notifier>,
    /// Offers cache (by id)
    offers: Arc<RwLock<HashMap<String, TradeOffer>>>,
}

impl TradingEngine {
    /// Create a new trading engine, loading existing offers
    pub async fn new(
        storage: Arc<dyn Storage>,
        ledger: Arc<CreditLedger>,
        notifier: Arc<dyn Notifier>,
    ) -> TradingResult<Self> {
        let engine = Self {
            storage,
            ledger,
            notifier,
            offers: Arc::new(RwLock::new(HashMap::new())),
        };

        engine.load_offers().await?;

        Ok(engine)
    }

    /// Load offers from storage into the cache
    async fn load_offers(&self) -> TradingResult<()> {
        let keys = self.storage.list(OFFERS_PATH).await?;
        let mut offers = self.offers.write().await;

        for key in keys {
            let offer: TradeOffer = self.storage.get_json(&key).await?;
            offers.insert(offer.id.clone(), offer);
        }

        info!("loaded {} trade offers", offers.len());
        Ok(())
    }

    /// Write an offer to storage
    async fn persist_offer(&self, offer: &TradeOffer) -> TradingResult<()> {
        let key = format!("{}/{}", OFFERS_PATH, offer.id);
        self.storage.put_json(&key, offer).await?;
        Ok(())
    }

    /// Post an offer to sell team credits.
    ///
    /// No escrow happens here: balances are untouched, and solvency is
    /// decided again at acceptance. The team total must still cover the
    /// amount now, so an offer is at least plausible when posted. Returns
    /// the offer and the team view the check was made against.
    pub async fn create_offer(
        &self,
        caller_id: &str,
        amount: f64,
    ) -> TradingResult<(TradeOffer, TeamView)> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(TradingError::Validation(
                "offer amount must be a positive number of credits".to_string(),
            ));
        }

        let seller = self
            .ledger
            .require_approved_role(caller_id, Role::Employer)
            .await?;

        let team = self.ledger.team_view(caller_id).await?;
        if team.total() < amount {
            return Err(TradingError::Ledger(
                greenmile_ledger::LedgerError::InsufficientTeamCredits {
                    available: team.total(),
                    requested: amount,
                    employer: team.employer_balance,
                    employees: team.employee_total(),
                },
            ));
        }

        let offer = TradeOffer::new(caller_id, seller.company_name.clone(), amount);
        self.persist_offer(&offer).await?;

        let mut offers = self.offers.write().await;
        offers.insert(offer.id.clone(), offer.clone());
        drop(offers);

        info!(offer_id = %offer.id, seller = caller_id, amount, "trade offer created");

        Ok((offer, team))
    }

    /// Available offers the caller could accept: everyone's except their
    /// own, newest first
    pub async fn available_offers(&self, caller_id: &str) -> TradingResult<Vec<TradeOffer>> {
        self.ledger.require_role(caller_id, Role::Employer).await?;

        let offers = self.offers.read().await;
        let mut result: Vec<TradeOffer> = offers
            .values()
            .filter(|o| o.status == OfferStatus::Available && o.employer_id != caller_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(result)
    }

    /// Get an offer by id
    pub async fn offer(&self, id: &str) -> TradingResult<TradeOffer> {
        let offers = self.offers.read().await;
        offers
            .get(id)
            .cloned()
            .ok_or_else(|| TradingError::OfferNotFound(id.to_string()))
    }

    /// Accept an offer, paying for it out of the buyer's own account and
    /// crediting it from the seller team's pooled balances.
    ///
    /// The offers write lock spans the availability check, the settlement,
    /// and the status flip. Of two concurrent accepts, the second sees the
    /// offer already accepted and gets `OfferNotAvailable`.
    pub async fn accept_offer(&self, offer_id: &str, caller_id: &str) -> TradingResult<AcceptedTrade> {
        self.ledger
            .require_approved_role(caller_id, Role::Employer)
            .await?;

        let mut offers = self.offers.write().await;
        let offer = offers
            .get_mut(offer_id)
            .ok_or_else(|| TradingError::OfferNotFound(offer_id.to_string()))?;

        if offer.employer_id == caller_id {
            return Err(TradingError::Validation(
                "cannot accept your own offer".to_string(),
            ));
        }
        if offer.status != OfferStatus::Available {
            return Err(TradingError::OfferNotAvailable {
                id: offer_id.to_string(),
                status: offer.status,
            });
        }

        let settlement = self
            .ledger
            .settle_team_transfer(&offer.employer_id, caller_id, offer.amount)
            .await?;

        let mut accepted = offer.clone();
        accepted.status = OfferStatus::Accepted;
        accepted.acceptor_id = Some(caller_id.to_string());
        accepted.accepted_at = Some(timestamp_secs());

        // The offer flip must land in storage before the cache shows it.
        // If the write is rejected, reverse the transfer so neither half
        // survives: a reload must never find the offer still available with
        // its settlement already applied.
        if let Err(e) = self.persist_offer(&accepted).await {
            error!(offer_id, "offer update failed after settlement, reversing transfer");
            self.ledger.reverse_settlement(&settlement).await?;
            return Err(e);
        }
        *offer = accepted.clone();
        drop(offers);

        self.notifier
            .notify(Notification::TradeSettled {
                offer_id: accepted.id.clone(),
                seller_id: accepted.employer_id.clone(),
                buyer_id: caller_id.to_string(),
                amount: accepted.amount,
            })
            .await;

        info!(
            offer_id,
            seller = %accepted.employer_id,
            buyer = caller_id,
            amount = accepted.amount,
            "trade offer accepted"
        );

        Ok(AcceptedTrade {
            offer: accepted,
            settlement,
        })
    }

    /// Cancel an offer. Only the seller may cancel, and cancelling an
    /// already-terminal offer is an idempotent no-op returning the offer
    /// unchanged.
    pub async fn cancel_offer(&self, offer_id: &str, caller_id: &str) -> TradingResult<TradeOffer> {
        let mut offers = self.offers.write().await;
        let offer = offers
            .get_mut(offer_id)
            .ok_or_else(|| TradingError::OfferNotFound(offer_id.to_string()))?;

        if offer.employer_id != caller_id {
            return Err(TradingError::Unauthorized(
                "only the seller can cancel an offer".to_string(),
            ));
        }
        if offer.is_terminal() {
            return Ok(offer.clone());
        }

        let mut cancelled = offer.clone();
        cancelled.status = OfferStatus::Cancelled;
        self.persist_offer(&cancelled).await?;
        *offer = cancelled.clone();
        drop(offers);

        info!(offer_id, seller = caller_id, "trade offer cancelled");

        Ok(cancelled)
    }

    /// Every offer in the system, newest first. Admin only.
    pub async fn all_offers(&self, caller_id: &str) -> TradingResult<Vec<TradeOffer>> {
        self.ledger.require_role(caller_id, Role::Admin).await?;

        let offers = self.offers.read().await;
        let mut result: Vec<TradeOffer> = offers.values().cloned().collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(result)
    }

    /// A company's trade history plus its current team total. Callers may
    /// only read their own history.
    pub async fn company_history(
        &self,
        caller_id: &str,
        employer_id: &str,
    ) -> TradingResult<TradeHistory> {
        if caller_id != employer_id {
            return Err(TradingError::Unauthorized(
                "companies can only read their own trade history".to_string(),
            ));
        }
        let employer = self
            .ledger
            .require_role(employer_id, Role::Employer)
            .await?;
        let team = self.ledger.team_view(employer_id).await?;

        let involved: Vec<TradeOffer> = {
            let offers = self.offers.read().await;
            offers
                .values()
                .filter(|o| {
                    o.employer_id == employer_id || o.acceptor_id.as_deref() == Some(employer_id)
                })
                .cloned()
                .collect()
        };

        let mut trades = Vec::with_capacity(involved.len());
        for offer in involved {
            let (direction, partner_id) = if offer.employer_id == employer_id {
                (TradeDirection::Outgoing, offer.acceptor_id.clone())
            } else {
                (TradeDirection::Incoming, Some(offer.employer_id.clone()))
            };

            let partner_company = match partner_id {
                Some(id) => self.ledger.account(&id).await?.company_name,
                None => None,
            };

            trades.push(TradeRecord {
                offer_id: offer.id.clone(),
                date: offer.accepted_at.unwrap_or(offer.created_at),
                amount: offer.amount,
                direction,
                status: offer.status,
                partner_company,
            });
        }
        trades.sort_by(|a, b| b.date.cmp(&a.date));

        Ok(TradeHistory {
            employer_id: employer_id.to_string(),
            company_name: employer.company_name,
            total_credits: team.total(),
            trades,
        })
    }
}
