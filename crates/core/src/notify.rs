//! Notification sink for post-commit side effects.
//!
//! The original system emailed users after an admin approved something. Here
//! that is an external fire-and-forget sink: engines emit a [`Notification`]
//! after a successful commit, and delivery never participates in, or blocks,
//! the financial operation that triggered it.

use async_trait::async_trait;
use tracing::info;

/// Events emitted by the engines after a successful state change.
#[derive(Debug, Clone)]
pub enum Notification {
    /// An admin approved an account.
    AccountApproved { account_id: String },
    /// A commute moved into the approved state and earned credits.
    CommuteApproved {
        commute_id: String,
        employee_id: String,
        credits: f64,
    },
    /// A trade offer was accepted and settled.
    TradeSettled {
        offer_id: String,
        seller_id: String,
        buyer_id: String,
        amount: f64,
    },
}

/// A delivery sink for notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification. Implementations must not surface delivery
    /// failures to the caller; they log and move on.
    async fn notify(&self, event: Notification);
}

/// Sink that logs every notification through `tracing`.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: Notification) {
        info!(?event, "notification dispatched");
    }
}

/// Sink that drops every notification, for tests.
#[derive(Debug, Default)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, _event: Notification) {}
}
