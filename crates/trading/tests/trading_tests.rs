//! Integration tests for the trading engine: offer lifecycle, settlement
//! orchestration and the concurrent-accept race.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use greenmile_core::notify::NullNotifier;
use greenmile_core::storage::{MemoryStorage, Storage, StorageError, StorageResult};
use greenmile_ledger::{CreditLedger, LedgerError};
use greenmile_trading::{OfferStatus, TradingEngine, TradingError};

/// Storage that can be switched to reject offer writes while account writes
/// keep working, for settlement-compensation tests.
struct OfferFaultStorage {
    inner: MemoryStorage,
    failing: AtomicBool,
}

impl OfferFaultStorage {
    fn new() -> Self {
        Self {
            inner: MemoryStorage::new(),
            failing: AtomicBool::new(false),
        }
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Storage for OfferFaultStorage {
    async fn put(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        if self.failing.load(Ordering::SeqCst) && key.starts_with("trading/offers") {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "write rejected",
            )));
        }
        self.inner.put(key, data).await
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.list(prefix).await
    }
}

/// Two approved employers; acme has a 10/5/3 team, globex is empty.
async fn setup() -> (Arc<CreditLedger>, Arc<TradingEngine>) {
    let storage = Arc::new(MemoryStorage::new());
    let notifier = Arc::new(NullNotifier);
    let ledger = Arc::new(CreditLedger::new(storage.clone(), notifier.clone()).await.unwrap());

    ledger.create_admin("admin-1", "Admin").await.unwrap();
    ledger
        .create_employer("acme", "Acme", "Acme Ltd")
        .await
        .unwrap();
    ledger
        .create_employer("globex", "Globex", "Globex Corp")
        .await
        .unwrap();
    ledger.create_employee("emp-a", "Ann", "acme").await.unwrap();
    ledger.create_employee("emp-b", "Ben", "acme").await.unwrap();
    for id in ["acme", "globex", "emp-a", "emp-b"] {
        ledger.approve_account("admin-1", id).await.unwrap();
    }
    ledger.credit("acme", 10.0).await.unwrap();
    ledger.credit("emp-a", 5.0).await.unwrap();
    ledger.credit("emp-b", 3.0).await.unwrap();

    let engine = Arc::new(
        TradingEngine::new(storage, ledger.clone(), notifier)
            .await
            .unwrap(),
    );
    (ledger, engine)
}

#[tokio::test]
async fn creating_an_offer_checks_the_team_total() {
    let (_ledger, engine) = setup().await;

    let (offer, team) = engine.create_offer("acme", 15.0).await.unwrap();
    assert_eq!(offer.status, OfferStatus::Available);
    assert_eq!(offer.company_name.as_deref(), Some("Acme Ltd"));
    assert_eq!(team.total(), 18.0);

    // No escrow: the balances are untouched by creation.
    let team_after = engine.create_offer("acme", 1.0).await.unwrap().1;
    assert_eq!(team_after.total(), 18.0);
}

#[tokio::test]
async fn oversized_offers_fail_with_a_breakdown() {
    let (_ledger, engine) = setup().await;

    let err = engine.create_offer("acme", 20.0).await.unwrap_err();
    match err {
        TradingError::Ledger(LedgerError::InsufficientTeamCredits {
            available,
            requested,
            employer,
            employees,
        }) => {
            assert_eq!(available, 18.0);
            assert_eq!(requested, 20.0);
            assert_eq!(employer, 10.0);
            assert_eq!(employees, 8.0);
        }
        other => panic!("expected InsufficientTeamCredits, got {other:?}"),
    }
}

#[tokio::test]
async fn accepting_an_offer_settles_the_transfer() {
    let (ledger, engine) = setup().await;

    let (offer, _) = engine.create_offer("acme", 15.0).await.unwrap();
    let trade = engine.accept_offer(&offer.id, "globex").await.unwrap();

    assert_eq!(trade.offer.status, OfferStatus::Accepted);
    assert_eq!(trade.offer.acceptor_id.as_deref(), Some("globex"));
    assert!(trade.offer.accepted_at.is_some());

    assert_eq!(trade.settlement.buyer_balance, 15.0);
    assert_eq!(trade.settlement.seller_team_total, 3.0);
    assert_eq!(ledger.balance("acme").await.unwrap(), 0.0);
    assert_eq!(ledger.balance("emp-a").await.unwrap(), 0.0);
    assert_eq!(ledger.balance("emp-b").await.unwrap(), 3.0);
    assert_eq!(ledger.balance("globex").await.unwrap(), 15.0);
}

#[tokio::test]
async fn listings_exclude_the_callers_own_offers() {
    let (ledger, engine) = setup().await;
    ledger.credit("globex", 4.0).await.unwrap();

    engine.create_offer("acme", 5.0).await.unwrap();
    engine.create_offer("globex", 4.0).await.unwrap();

    let for_globex = engine.available_offers("globex").await.unwrap();
    assert_eq!(for_globex.len(), 1);
    assert_eq!(for_globex[0].employer_id, "acme");

    let for_acme = engine.available_offers("acme").await.unwrap();
    assert_eq!(for_acme.len(), 1);
    assert_eq!(for_acme[0].employer_id, "globex");
}

#[tokio::test]
async fn sellers_cannot_accept_their_own_offers() {
    let (_ledger, engine) = setup().await;

    let (offer, _) = engine.create_offer("acme", 5.0).await.unwrap();
    assert!(matches!(
        engine.accept_offer(&offer.id, "acme").await,
        Err(TradingError::Validation(_))
    ));
}

#[tokio::test]
async fn cancellation_is_seller_only_and_idempotent() {
    let (_ledger, engine) = setup().await;

    let (offer, _) = engine.create_offer("acme", 5.0).await.unwrap();

    assert!(matches!(
        engine.cancel_offer(&offer.id, "globex").await,
        Err(TradingError::Unauthorized(_))
    ));

    let cancelled = engine.cancel_offer(&offer.id, "acme").await.unwrap();
    assert_eq!(cancelled.status, OfferStatus::Cancelled);

    // Cancelling again returns the offer unchanged.
    let again = engine.cancel_offer(&offer.id, "acme").await.unwrap();
    assert_eq!(again.status, OfferStatus::Cancelled);

    // A cancelled offer can no longer be accepted.
    assert!(matches!(
        engine.accept_offer(&offer.id, "globex").await,
        Err(TradingError::OfferNotAvailable { .. })
    ));
}

#[tokio::test]
async fn unapproved_employers_cannot_trade() {
    let (ledger, engine) = setup().await;
    ledger
        .create_employer("initech", "Initech", "Initech Inc")
        .await
        .unwrap();

    assert!(matches!(
        engine.create_offer("initech", 1.0).await,
        Err(TradingError::Ledger(LedgerError::AccountNotApproved(_)))
    ));

    let (offer, _) = engine.create_offer("acme", 5.0).await.unwrap();
    assert!(matches!(
        engine.accept_offer(&offer.id, "initech").await,
        Err(TradingError::Ledger(LedgerError::AccountNotApproved(_)))
    ));
}

#[tokio::test]
async fn an_offer_can_become_unfulfillable() {
    let (ledger, engine) = setup().await;

    let (offer, _) = engine.create_offer("acme", 15.0).await.unwrap();

    // The team spends its credits before anyone accepts.
    ledger.debit("acme", 10.0).await.unwrap();
    ledger.debit("emp-a", 5.0).await.unwrap();

    let err = engine.accept_offer(&offer.id, "globex").await.unwrap_err();
    assert!(matches!(
        err,
        TradingError::Ledger(LedgerError::InsufficientTeamCredits { .. })
    ));

    // The failed acceptance leaves the offer open and balances untouched.
    let offer = engine.offer(&offer.id).await.unwrap();
    assert_eq!(offer.status, OfferStatus::Available);
    assert_eq!(ledger.balance("globex").await.unwrap(), 0.0);
    assert_eq!(ledger.balance("emp-b").await.unwrap(), 3.0);
}

#[tokio::test]
async fn concurrent_accepts_settle_exactly_once() {
    let (ledger, engine) = setup().await;
    ledger
        .create_employer("initech", "Initech", "Initech Inc")
        .await
        .unwrap();
    ledger.approve_account("admin-1", "initech").await.unwrap();

    let (offer, _) = engine.create_offer("acme", 15.0).await.unwrap();

    let a = {
        let engine = engine.clone();
        let id = offer.id.clone();
        tokio::spawn(async move { engine.accept_offer(&id, "globex").await })
    };
    let b = {
        let engine = engine.clone();
        let id = offer.id.clone();
        tokio::spawn(async move { engine.accept_offer(&id, "initech").await })
    };

    let (a, b) = (a.await.unwrap(), b.await.unwrap());
    let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);

    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(
        loser,
        Err(TradingError::OfferNotAvailable { .. })
    ));

    // The credits moved exactly once.
    let buyers = ledger.balance("globex").await.unwrap() + ledger.balance("initech").await.unwrap();
    assert_eq!(buyers, 15.0);
    let team = ledger.team_view("acme").await.unwrap();
    assert_eq!(team.total(), 3.0);
}

#[tokio::test]
async fn failed_offer_write_reverses_the_settlement() {
    let storage = Arc::new(OfferFaultStorage::new());
    let notifier = Arc::new(NullNotifier);
    let ledger = Arc::new(CreditLedger::new(storage.clone(), notifier.clone()).await.unwrap());

    ledger.create_admin("admin-1", "Admin").await.unwrap();
    ledger
        .create_employer("acme", "Acme", "Acme Ltd")
        .await
        .unwrap();
    ledger
        .create_employer("globex", "Globex", "Globex Corp")
        .await
        .unwrap();
    ledger.create_employee("emp-a", "Ann", "acme").await.unwrap();
    ledger.create_employee("emp-b", "Ben", "acme").await.unwrap();
    for id in ["acme", "globex", "emp-a", "emp-b"] {
        ledger.approve_account("admin-1", id).await.unwrap();
    }
    ledger.credit("acme", 10.0).await.unwrap();
    ledger.credit("emp-a", 5.0).await.unwrap();
    ledger.credit("emp-b", 3.0).await.unwrap();

    let engine = TradingEngine::new(storage.clone(), ledger.clone(), notifier)
        .await
        .unwrap();
    let (offer, _) = engine.create_offer("acme", 15.0).await.unwrap();

    storage.set_failing(true);

    let err = engine.accept_offer(&offer.id, "globex").await.unwrap_err();
    assert!(matches!(err, TradingError::Storage(_)));

    // The transfer was reversed to the exact per-account distribution and
    // the offer is still open.
    assert_eq!(ledger.balance("globex").await.unwrap(), 0.0);
    assert_eq!(ledger.balance("acme").await.unwrap(), 10.0);
    assert_eq!(ledger.balance("emp-a").await.unwrap(), 5.0);
    assert_eq!(ledger.balance("emp-b").await.unwrap(), 3.0);
    let reloaded = engine.offer(&offer.id).await.unwrap();
    assert_eq!(reloaded.status, OfferStatus::Available);
    assert!(reloaded.acceptor_id.is_none());

    // Once storage recovers, the same offer settles normally.
    storage.set_failing(false);
    let trade = engine.accept_offer(&offer.id, "globex").await.unwrap();
    assert_eq!(trade.settlement.buyer_balance, 15.0);
    assert_eq!(ledger.balance("globex").await.unwrap(), 15.0);
}

#[tokio::test]
async fn failed_cancel_write_leaves_the_offer_available() {
    let storage = Arc::new(OfferFaultStorage::new());
    let notifier = Arc::new(NullNotifier);
    let ledger = Arc::new(CreditLedger::new(storage.clone(), notifier.clone()).await.unwrap());

    ledger.create_admin("admin-1", "Admin").await.unwrap();
    ledger
        .create_employer("acme", "Acme", "Acme Ltd")
        .await
        .unwrap();
    ledger.approve_account("admin-1", "acme").await.unwrap();
    ledger.credit("acme", 10.0).await.unwrap();

    let engine = TradingEngine::new(storage.clone(), ledger, notifier)
        .await
        .unwrap();
    let (offer, _) = engine.create_offer("acme", 5.0).await.unwrap();

    storage.set_failing(true);
    assert!(engine.cancel_offer(&offer.id, "acme").await.is_err());
    assert_eq!(
        engine.offer(&offer.id).await.unwrap().status,
        OfferStatus::Available
    );

    storage.set_failing(false);
    let cancelled = engine.cancel_offer(&offer.id, "acme").await.unwrap();
    assert_eq!(cancelled.status, OfferStatus::Cancelled);
}

#[tokio::test]
async fn all_offers_is_admin_only() {
    let (_ledger, engine) = setup().await;
    engine.create_offer("acme", 5.0).await.unwrap();

    assert!(matches!(
        engine.all_offers("acme").await,
        Err(TradingError::Ledger(LedgerError::RoleMismatch { .. }))
    ));

    let offers = engine.all_offers("admin-1").await.unwrap();
    assert_eq!(offers.len(), 1);
}

#[tokio::test]
async fn company_history_reports_both_directions() {
    let (ledger, engine) = setup().await;
    ledger.credit("globex", 4.0).await.unwrap();

    let (sold, _) = engine.create_offer("acme", 15.0).await.unwrap();
    engine.accept_offer(&sold.id, "globex").await.unwrap();

    let (bought, _) = engine.create_offer("globex", 4.0).await.unwrap();
    engine.accept_offer(&bought.id, "acme").await.unwrap();

    let (open, _) = engine.create_offer("acme", 1.0).await.unwrap();

    let history = engine.company_history("acme", "acme").await.unwrap();
    assert_eq!(history.company_name.as_deref(), Some("Acme Ltd"));
    assert_eq!(history.trades.len(), 3);

    let outgoing = history
        .trades
        .iter()
        .find(|t| t.offer_id == sold.id)
        .unwrap();
    assert_eq!(outgoing.direction, greenmile_trading::TradeDirection::Outgoing);
    assert_eq!(outgoing.partner_company.as_deref(), Some("Globex Corp"));

    let incoming = history
        .trades
        .iter()
        .find(|t| t.offer_id == bought.id)
        .unwrap();
    assert_eq!(incoming.direction, greenmile_trading::TradeDirection::Incoming);
    assert_eq!(incoming.partner_company.as_deref(), Some("Globex Corp"));

    let pending = history
        .trades
        .iter()
        .find(|t| t.offer_id == open.id)
        .unwrap();
    assert!(pending.partner_company.is_none());
    assert_eq!(pending.status, OfferStatus::Available);

    // Only the company itself may read its history.
    assert!(matches!(
        engine.company_history("globex", "acme").await,
        Err(TradingError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn offers_survive_a_reload() {
    let storage = Arc::new(MemoryStorage::new());
    let notifier = Arc::new(NullNotifier);
    let ledger = Arc::new(CreditLedger::new(storage.clone(), notifier.clone()).await.unwrap());
    ledger.create_admin("admin-1", "Admin").await.unwrap();
    ledger
        .create_employer("acme", "Acme", "Acme Ltd")
        .await
        .unwrap();
    ledger.approve_account("admin-1", "acme").await.unwrap();
    ledger.credit("acme", 10.0).await.unwrap();

    let offer_id = {
        let engine = TradingEngine::new(storage.clone(), ledger.clone(), notifier.clone())
            .await
            .unwrap();
        engine.create_offer("acme", 5.0).await.unwrap().0.id
    };

    let reloaded = TradingEngine::new(storage, ledger, notifier).await.unwrap();
    let offer = reloaded.offer(&offer_id).await.unwrap();
    assert_eq!(offer.status, OfferStatus::Available);
    assert_eq!(offer.amount, 5.0);
}
