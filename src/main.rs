//! Demo binary: wires the storage, ledger, commute log and trading engine
//! together and walks one end-to-end scenario.

use std::error::Error;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use greenmile_commute::{CommuteLog, CommuteStatus};
use greenmile_core::notify::LogNotifier;
use greenmile_core::storage::FileStorage;
use greenmile_core::utils::timestamp_secs;
use greenmile_ledger::CreditLedger;
use greenmile_trading::TradingEngine;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let data_dir = std::env::temp_dir().join(format!("greenmile-demo-{}", timestamp_secs()));
    info!(path = %data_dir.display(), "starting greenmile demo");

    let storage = Arc::new(FileStorage::new(&data_dir).await?);
    let notifier = Arc::new(LogNotifier);

    let ledger = Arc::new(CreditLedger::new(storage.clone(), notifier.clone()).await?);
    let commutes = CommuteLog::new(storage.clone(), ledger.clone(), notifier.clone()).await?;
    let trading = TradingEngine::new(storage.clone(), ledger.clone(), notifier.clone()).await?;

    // Accounts: one admin, two companies, two employees at the seller.
    ledger.create_admin("admin-1", "Root Admin").await?;
    ledger
        .create_employer("acme", "Acme Logistics", "Acme Logistics Ltd")
        .await?;
    ledger
        .create_employer("globex", "Globex Corp", "Globex Corporation")
        .await?;
    ledger.create_employee("alice", "Alice", "acme").await?;
    ledger.create_employee("bob", "Bob", "acme").await?;

    for id in ["acme", "globex", "alice", "bob"] {
        ledger.approve_account("admin-1", id).await?;
    }

    // Commutes earn the employees credits against the car baseline.
    let (walked, earned) = commutes
        .log_commute("alice", Utc::now(), "walk", "Home", "Office", 120.0)
        .await?;
    info!(commute_id = %walked.id, earned, "alice logged a long walk");

    let (cycled, earned) = commutes
        .log_commute("bob", Utc::now(), "bike", "Home", "Office", 300.0)
        .await?;
    info!(commute_id = %cycled.id, earned, "bob logged a long ride");

    // Approval grants a second round of credits.
    let update = commutes.set_status(&walked.id, CommuteStatus::Approved).await?;
    info!(
        delta = update.credits_delta,
        total = update.total_credits,
        "alice's commute approved"
    );

    let team = ledger.team_view("acme").await?;
    info!(total = team.total(), "acme's tradable team total");

    // Acme sells part of its pooled credits to Globex.
    let (offer, _) = trading.create_offer("acme", 3.0).await?;
    info!(offer_id = %offer.id, amount = offer.amount, "acme posted an offer");

    let listed = trading.available_offers("globex").await?;
    info!(count = listed.len(), "offers visible to globex");

    let trade = trading.accept_offer(&offer.id, "globex").await?;
    info!(
        buyer_balance = trade.settlement.buyer_balance,
        seller_team_total = trade.settlement.seller_team_total,
        "trade settled"
    );

    let history = trading.company_history("acme", "acme").await?;
    info!(
        trades = history.trades.len(),
        total = history.total_credits,
        "acme's trade history"
    );

    Ok(())
}
