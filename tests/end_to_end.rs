//! Whole-system flow over file-backed storage: accounts, commutes, approval,
//! an offer, settlement and history, then a restart to prove everything
//! survives on disk.

use std::sync::Arc;

use chrono::Utc;

use greenmile::commute::{CommuteLog, CommuteStatus};
use greenmile::core::notify::NullNotifier;
use greenmile::core::storage::FileStorage;
use greenmile::ledger::CreditLedger;
use greenmile::trading::{OfferStatus, TradingEngine};

#[tokio::test]
async fn commute_to_trade_flow_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();

    let offer_id = {
        let storage = Arc::new(FileStorage::new(dir.path()).await.unwrap());
        let notifier = Arc::new(NullNotifier);
        let ledger = Arc::new(
            CreditLedger::new(storage.clone(), notifier.clone())
                .await
                .unwrap(),
        );
        let commutes = CommuteLog::new(storage.clone(), ledger.clone(), notifier.clone())
            .await
            .unwrap();
        let trading = TradingEngine::new(storage, ledger.clone(), notifier)
            .await
            .unwrap();

        ledger.create_admin("admin-1", "Admin").await.unwrap();
        ledger
            .create_employer("acme", "Acme", "Acme Ltd")
            .await
            .unwrap();
        ledger
            .create_employer("globex", "Globex", "Globex Corp")
            .await
            .unwrap();
        ledger.create_employee("alice", "Alice", "acme").await.unwrap();
        for id in ["acme", "globex", "alice"] {
            ledger.approve_account("admin-1", id).await.unwrap();
        }

        // 150 km walk: 15 kg saved, 3 credits at logging, 3 more at approval.
        let (commute, credits) = commutes
            .log_commute("alice", Utc::now(), "walk", "Home", "Office", 150.0)
            .await
            .unwrap();
        assert_eq!(credits, 3.0);
        commutes
            .set_status(&commute.id, CommuteStatus::Approved)
            .await
            .unwrap();
        assert_eq!(ledger.balance("alice").await.unwrap(), 6.0);

        // Acme sells 5 of its 6 pooled credits to Globex.
        let (offer, team) = trading.create_offer("acme", 5.0).await.unwrap();
        assert_eq!(team.total(), 6.0);

        let trade = trading.accept_offer(&offer.id, "globex").await.unwrap();
        assert_eq!(trade.settlement.buyer_balance, 5.0);
        assert_eq!(trade.settlement.seller_team_total, 1.0);
        assert_eq!(ledger.balance("alice").await.unwrap(), 1.0);

        let history = trading.company_history("acme", "acme").await.unwrap();
        assert_eq!(history.total_credits, 1.0);
        assert_eq!(history.trades.len(), 1);
        assert_eq!(
            history.trades[0].partner_company.as_deref(),
            Some("Globex Corp")
        );

        offer.id
    };

    // Fresh engines over the same directory see the settled state.
    let storage = Arc::new(FileStorage::new(dir.path()).await.unwrap());
    let notifier = Arc::new(NullNotifier);
    let ledger = Arc::new(
        CreditLedger::new(storage.clone(), notifier.clone())
            .await
            .unwrap(),
    );
    let commutes = CommuteLog::new(storage.clone(), ledger.clone(), notifier.clone())
        .await
        .unwrap();
    let trading = TradingEngine::new(storage, ledger.clone(), notifier)
        .await
        .unwrap();

    assert_eq!(ledger.balance("globex").await.unwrap(), 5.0);
    assert_eq!(ledger.balance("alice").await.unwrap(), 1.0);

    let offer = trading.offer(&offer_id).await.unwrap();
    assert_eq!(offer.status, OfferStatus::Accepted);
    assert_eq!(offer.acceptor_id.as_deref(), Some("globex"));

    let alice = commutes.commutes_for("alice").await.unwrap();
    assert_eq!(alice.len(), 1);
    assert_eq!(alice[0].status, CommuteStatus::Approved);

    let summary = commutes.employee_summary("alice").await.unwrap();
    assert_eq!(summary.total_commutes, 1);
    assert!((summary.total_carbon_saved_kg - 15.0).abs() < 1e-9);
}
