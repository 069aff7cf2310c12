//! Commute log and accrual engine.
//!
//! Logging a commute credits the employee immediately; the status workflow
//! applies a second adjustment on top. Both use the one canonical formula in
//! [`crate::accrual`], always recomputed from the commute's stored method and
//! distance. Callers are trusted to have authenticated the reviewer; the log
//! itself does not gate status changes.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use greenmile_core::notify::{Notification, Notifier};
use greenmile_core::storage::{JsonStorage, Storage};
use greenmile_ledger::{CreditLedger, Role};

use crate::accrual::{carbon_saved_kg, AccrualPolicy};
use crate::record::{Commute, CommuteMethod, CommuteStatus};
use crate::{CommuteError, CommuteResult};

/// Path constants for storage
const POLICY_PATH: &str = "commutes/policy";
const COMMUTES_PATH: &str = "commutes/records";

/// Result of a status transition
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub commute: Commute,
    /// Signed credit change applied to the employee's balance
    pub credits_delta: f64,
    /// The employee's balance after the transition
    pub total_credits: f64,
}

/// Per-commute entry in an employee's credit history
#[derive(Debug, Clone, Serialize)]
pub struct CreditHistoryEntry {
    pub date: DateTime<Utc>,
    pub method: CommuteMethod,
    pub distance_km: f64,
    pub credits: f64,
    pub status: CommuteStatus,
}

/// Aggregate totals over an employee's approved commutes
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommuteSummary {
    pub total_commutes: usize,
    pub total_distance_km: f64,
    pub total_carbon_saved_kg: f64,
}

/// The commute log: records commutes and applies credit accrual to the
/// commuting employee's ledger account.
pub struct CommuteLog {
    /// Storage for commute data
    storage: Arc<dyn Storage>,
    /// The credit ledger accruals are applied to
    ledger: Arc<CreditLedger>,
    /// Sink for post-commit notifications
    notifier: Arc<dyn Notifier>,
    /// Accrual policy, loaded once at startup
    policy: AccrualPolicy,
    /// Commutes cache (by id)
    commutes: Arc<RwLock<HashMap<String, Commute>>>,
    /// Commute ids by employee id
    by_employee: Arc<RwLock<HashMap<String, BTreeSet<String>>>>,
}

impl CommuteLog {
    /// Create a new commute log, loading the policy and existing records
    pub async fn new(
        storage: Arc<dyn Storage>,
        ledger: Arc<CreditLedger>,
        notifier: Arc<dyn Notifier>,
    ) -> CommuteResult<Self> {
        let policy = Self::load_policy(&*storage).await;

        let log = Self {
            storage,
            ledger,
            notifier,
            policy,
            commutes: Arc::new(RwLock::new(HashMap::new())),
            by_employee: Arc::new(RwLock::new(HashMap::new())),
        };

        log.load_commutes().await?;

        Ok(log)
    }

    /// Load the accrual policy from storage, writing back the default on
    /// first run
    async fn load_policy(storage: &dyn Storage) -> AccrualPolicy {
        match storage.get_json::<AccrualPolicy>(POLICY_PATH).await {
            Ok(policy) => policy,
            Err(_) => {
                let policy = AccrualPolicy::default();
                if let Err(e) = storage.put_json(POLICY_PATH, &policy).await {
                    warn!("failed to save default accrual policy: {e}");
                }
                policy
            }
        }
    }

    /// Load commutes from storage into the caches
    async fn load_commutes(&self) -> CommuteResult<()> {
        let keys = self.storage.list(COMMUTES_PATH).await?;
        let mut commutes = self.commutes.write().await;
        let mut by_employee = self.by_employee.write().await;

        for key in keys {
            let commute: Commute = self.storage.get_json(&key).await?;
            by_employee
                .entry(commute.employee_id.clone())
                .or_default()
                .insert(commute.id.clone());
            commutes.insert(commute.id.clone(), commute);
        }

        info!("loaded {} commutes", commutes.len());
        Ok(())
    }

    /// Write a commute record to storage without touching the caches
    async fn persist_commute(&self, commute: &Commute) -> CommuteResult<()> {
        let key = format!("{}/{}", COMMUTES_PATH, commute.id);
        self.storage.put_json(&key, commute).await?;
        Ok(())
    }

    /// Persist a commute and insert it into the caches
    async fn save_commute(&self, commute: &Commute) -> CommuteResult<()> {
        self.persist_commute(commute).await?;

        let mut commutes = self.commutes.write().await;
        let mut by_employee = self.by_employee.write().await;
        by_employee
            .entry(commute.employee_id.clone())
            .or_default()
            .insert(commute.id.clone());
        commutes.insert(commute.id.clone(), commute.clone());

        Ok(())
    }

    /// The accrual policy in effect
    pub fn policy(&self) -> &AccrualPolicy {
        &self.policy
    }

    /// Log a commute and credit the employee's balance.
    ///
    /// Returns the stored commute and the credits earned.
    pub async fn log_commute(
        &self,
        employee_id: &str,
        date: DateTime<Utc>,
        method: &str,
        start_location: &str,
        end_location: &str,
        distance_km: f64,
    ) -> CommuteResult<(Commute, f64)> {
        let method: CommuteMethod = method.parse()?;
        if !distance_km.is_finite() || distance_km <= 0.0 {
            return Err(CommuteError::Validation(
                "distance must be a positive number of kilometres".to_string(),
            ));
        }
        if start_location.trim().is_empty() || end_location.trim().is_empty() {
            return Err(CommuteError::Validation(
                "start and end locations are required".to_string(),
            ));
        }

        self.ledger.require_role(employee_id, Role::Employee).await?;

        let carbon_saved = carbon_saved_kg(method, distance_km);
        let credits = self.policy.credits_for(method, distance_km);

        let commute = Commute::new(
            employee_id,
            date,
            method,
            start_location,
            end_location,
            distance_km,
            carbon_saved,
        );
        self.save_commute(&commute).await?;

        if credits > 0.0 {
            self.ledger.credit(employee_id, credits).await?;
        }

        info!(
            commute_id = %commute.id,
            employee_id,
            method = %method,
            distance_km,
            credits,
            "commute logged"
        );

        Ok((commute, credits))
    }

    /// Transition a commute's approval status, adjusting the employee's
    /// balance according to the transition table.
    ///
    /// Setting the status a commute already has is an idempotent no-op. The
    /// credit delta is always recomputed from the commute's own stored
    /// distance and method.
    pub async fn set_status(
        &self,
        commute_id: &str,
        status: CommuteStatus,
    ) -> CommuteResult<StatusUpdate> {
        let mut commutes = self.commutes.write().await;
        let commute = commutes
            .get_mut(commute_id)
            .ok_or_else(|| CommuteError::CommuteNotFound(commute_id.to_string()))?;

        let previous = commute.status;
        let employee_id = commute.employee_id.clone();
        let credits = self.policy.credits_for(commute.method, commute.distance_km);

        if previous == status {
            let total_credits = self.ledger.balance(&employee_id).await?;
            return Ok(StatusUpdate {
                commute: commute.clone(),
                credits_delta: 0.0,
                total_credits,
            });
        }

        let delta = match (previous, status) {
            (CommuteStatus::Pending, CommuteStatus::Approved)
            | (CommuteStatus::Rejected, CommuteStatus::Approved) => credits,
            (CommuteStatus::Approved, CommuteStatus::Rejected) => -credits,
            // pending -> rejected, and moves back to pending
            _ => 0.0,
        };

        let before = self.ledger.balance(&employee_id).await?;
        let total_credits = if delta > 0.0 {
            self.ledger.credit(&employee_id, delta).await?
        } else if delta < 0.0 {
            // Reversal floors at zero rather than failing.
            self.ledger.debit_saturating(&employee_id, -delta).await?
        } else {
            before
        };

        let mut updated = commute.clone();
        updated.status = status;

        // The record flip lands in storage before the cache shows it. If the
        // write is rejected, put the balance back where it was so the failed
        // transition leaves no trace.
        if let Err(e) = self.persist_commute(&updated).await {
            let moved = total_credits - before;
            if moved > 0.0 {
                self.ledger.debit_saturating(&employee_id, moved).await?;
            } else if moved < 0.0 {
                self.ledger.credit(&employee_id, -moved).await?;
            }
            return Err(e);
        }
        commute.status = status;
        drop(commutes);

        if status == CommuteStatus::Approved {
            self.notifier
                .notify(Notification::CommuteApproved {
                    commute_id: updated.id.clone(),
                    employee_id: employee_id.clone(),
                    credits,
                })
                .await;
        }

        info!(
            commute_id,
            employee_id,
            from = %previous,
            to = %status,
            delta,
            "commute status updated"
        );

        Ok(StatusUpdate {
            commute: updated,
            credits_delta: delta,
            total_credits,
        })
    }

    /// Get a commute by id
    pub async fn commute(&self, id: &str) -> CommuteResult<Commute> {
        let commutes = self.commutes.read().await;
        commutes
            .get(id)
            .cloned()
            .ok_or_else(|| CommuteError::CommuteNotFound(id.to_string()))
    }

    /// All commutes for an employee, newest first
    pub async fn commutes_for(&self, employee_id: &str) -> CommuteResult<Vec<Commute>> {
        let commutes = self.commutes.read().await;
        let by_employee = self.by_employee.read().await;

        let ids = match by_employee.get(employee_id) {
            Some(ids) => ids,
            None => return Ok(Vec::new()),
        };

        let mut result: Vec<Commute> = ids
            .iter()
            .filter_map(|id| commutes.get(id))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.date.cmp(&a.date));

        Ok(result)
    }

    /// Per-commute credit history for an employee, optionally bounded to a
    /// date range, newest first
    pub async fn credit_history(
        &self,
        employee_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> CommuteResult<Vec<CreditHistoryEntry>> {
        let entries = self
            .commutes_for(employee_id)
            .await?
            .into_iter()
            .filter(|c| {
                from.map_or(true, |f| c.date >= f) && to.map_or(true, |t| c.date <= t)
            })
            .map(|c| CreditHistoryEntry {
                date: c.date,
                method: c.method,
                distance_km: c.distance_km,
                credits: self.policy.credits_for(c.method, c.distance_km),
                status: c.status,
            })
            .collect();

        Ok(entries)
    }

    /// Aggregate totals over an employee's approved commutes
    pub async fn employee_summary(&self, employee_id: &str) -> CommuteResult<CommuteSummary> {
        let mut summary = CommuteSummary::default();

        for commute in self.commutes_for(employee_id).await? {
            if commute.status != CommuteStatus::Approved {
                continue;
            }
            summary.total_commutes += 1;
            summary.total_distance_km += commute.distance_km;
            summary.total_carbon_saved_kg += commute.carbon_saved_kg;
        }

        Ok(summary)
    }

    /// Delete a commute, reversing the credits it granted: the logging grant
    /// always, plus the approval grant when the commute is approved. The
    /// reversal floors the balance at zero.
    pub async fn remove_commute(&self, commute_id: &str) -> CommuteResult<Commute> {
        let removed = {
            let mut commutes = self.commutes.write().await;
            let mut by_employee = self.by_employee.write().await;

            let commute = commutes
                .get(commute_id)
                .cloned()
                .ok_or_else(|| CommuteError::CommuteNotFound(commute_id.to_string()))?;

            // Drop the stored record before the caches forget it; a failed
            // delete leaves the commute fully intact.
            self.storage
                .delete(&format!("{}/{}", COMMUTES_PATH, commute_id))
                .await?;

            commutes.remove(commute_id);
            if let Some(ids) = by_employee.get_mut(&commute.employee_id) {
                ids.remove(commute_id);
            }
            commute
        };

        let credits = self.policy.credits_for(removed.method, removed.distance_km);
        let reversal = if removed.status == CommuteStatus::Approved {
            credits * 2.0
        } else {
            credits
        };
        if reversal > 0.0 {
            self.ledger
                .debit_saturating(&removed.employee_id, reversal)
                .await?;
        }

        info!(commute_id, employee_id = %removed.employee_id, reversal, "commute removed");

        Ok(removed)
    }
}
