//! The credit ledger: account store, balance mutation, and the pooled team
//! transfer executed during trade settlement.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use greenmile_core::notify::{Notification, Notifier};
use greenmile_core::storage::{JsonStorage, Storage};
use greenmile_core::utils::timestamp_secs;

use crate::account::{Account, Role};
use crate::team::{TeamMember, TeamView};
use crate::{LedgerError, LedgerResult};

/// Path constant for account storage
const ACCOUNTS_PATH: &str = "ledger/accounts";

/// A single account's balance change within a settlement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountDelta {
    pub account_id: String,
    pub amount: f64,
}

/// Outcome of a pooled team transfer.
///
/// Conservation holds by construction: the deductions sum to `amount`, and
/// the buyer is credited `amount` in full.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub seller_employer_id: String,
    pub buyer_employer_id: String,
    pub amount: f64,
    /// Deductions applied on the seller side: employer first, then approved
    /// employees ascending by account id.
    pub deductions: Vec<AccountDelta>,
    /// Buyer employer balance after the transfer
    pub buyer_balance: f64,
    /// Seller team total after the transfer
    pub seller_team_total: f64,
}

/// The credit ledger.
///
/// Keeps an authoritative in-memory view of all accounts in front of the
/// storage backend. Every balance mutation happens under the accounts write
/// lock, which is the serialization point the settlement engine relies on.
pub struct CreditLedger {
    /// Storage for account data
    storage: Arc<dyn Storage>,
    /// Sink for post-commit notifications
    notifier: Arc<dyn Notifier>,
    /// Accounts cache (by id)
    accounts: Arc<RwLock<HashMap<String, Account>>>,
    /// Employee ids by employer id. The BTreeSet keeps the deterministic
    /// deduction order settlement needs for auditability.
    members_by_employer: Arc<RwLock<HashMap<String, BTreeSet<String>>>>,
}

impl CreditLedger {
    /// Create a new ledger, loading existing accounts from storage
    pub async fn new(storage: Arc<dyn Storage>, notifier: Arc<dyn Notifier>) -> LedgerResult<Self> {
        let ledger = Self {
            storage,
            notifier,
            accounts: Arc::new(RwLock::new(HashMap::new())),
            members_by_employer: Arc::new(RwLock::new(HashMap::new())),
        };

        ledger.load_accounts().await?;

        Ok(ledger)
    }

    /// Load accounts from storage into the caches
    async fn load_accounts(&self) -> LedgerResult<()> {
        let keys = self.storage.list(ACCOUNTS_PATH).await?;
        let mut accounts = self.accounts.write().await;
        let mut members = self.members_by_employer.write().await;

        for key in keys {
            let account: Account = self.storage.get_json(&key).await?;
            if let Some(employer_id) = &account.employer_id {
                members
                    .entry(employer_id.clone())
                    .or_default()
                    .insert(account.id.clone());
            }
            accounts.insert(account.id.clone(), account);
        }

        info!("loaded {} accounts", accounts.len());
        Ok(())
    }

    /// Write an account record to storage without touching the caches
    async fn persist_account(&self, account: &Account) -> LedgerResult<()> {
        let key = format!("{}/{}", ACCOUNTS_PATH, account.id);
        self.storage.put_json(&key, account).await?;
        Ok(())
    }

    /// Persist an account and insert it into the caches
    async fn save_account(&self, account: &Account) -> LedgerResult<()> {
        self.persist_account(account).await?;

        let mut accounts = self.accounts.write().await;
        let mut members = self.members_by_employer.write().await;
        if let Some(employer_id) = &account.employer_id {
            members
                .entry(employer_id.clone())
                .or_default()
                .insert(account.id.clone());
        }
        accounts.insert(account.id.clone(), account.clone());

        Ok(())
    }

    async fn insert_new(&self, account: Account) -> LedgerResult<Account> {
        {
            let accounts = self.accounts.read().await;
            if accounts.contains_key(&account.id) {
                return Err(LedgerError::Validation(format!(
                    "account already exists: {}",
                    account.id
                )));
            }
        }

        self.save_account(&account).await?;
        info!(account_id = %account.id, role = %account.role, "created account");

        Ok(account)
    }

    /// Create a new employer account
    pub async fn create_employer(
        &self,
        id: &str,
        name: &str,
        company_name: &str,
    ) -> LedgerResult<Account> {
        self.insert_new(Account::new_employer(id, name, company_name))
            .await
    }

    /// Create a new employee account attached to an existing employer
    pub async fn create_employee(
        &self,
        id: &str,
        name: &str,
        employer_id: &str,
    ) -> LedgerResult<Account> {
        self.require_role(employer_id, Role::Employer).await?;
        self.insert_new(Account::new_employee(id, name, employer_id))
            .await
    }

    /// Create a new admin account
    pub async fn create_admin(&self, id: &str, name: &str) -> LedgerResult<Account> {
        self.insert_new(Account::new_admin(id, name)).await
    }

    /// Approve an account. Admin-gated; fires an `AccountApproved`
    /// notification after the change is committed.
    pub async fn approve_account(&self, admin_id: &str, account_id: &str) -> LedgerResult<Account> {
        self.require_role(admin_id, Role::Admin).await?;

        let approved = {
            let mut accounts = self.accounts.write().await;
            let mut updated = accounts
                .get(account_id)
                .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))?
                .clone();
            updated.approved = true;
            updated.updated_at = timestamp_secs();

            self.persist_account(&updated).await?;
            accounts.insert(account_id.to_string(), updated.clone());
            updated
        };

        info!(account_id, "account approved");

        self.notifier
            .notify(Notification::AccountApproved {
                account_id: account_id.to_string(),
            })
            .await;

        Ok(approved)
    }

    /// Get an account by id
    pub async fn account(&self, id: &str) -> LedgerResult<Account> {
        let accounts = self.accounts.read().await;
        accounts
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()))
    }

    /// Get the current balance of an account
    pub async fn balance(&self, id: &str) -> LedgerResult<f64> {
        Ok(self.account(id).await?.balance)
    }

    /// Get all employee accounts of an employer, ascending by account id
    pub async fn employees_of(&self, employer_id: &str) -> LedgerResult<Vec<Account>> {
        let accounts = self.accounts.read().await;
        let members = self.members_by_employer.read().await;

        let ids = match members.get(employer_id) {
            Some(ids) => ids,
            None => return Ok(Vec::new()),
        };

        Ok(ids
            .iter()
            .filter_map(|id| accounts.get(id))
            .cloned()
            .collect())
    }

    /// The capability check performed once per operation: the account must
    /// exist and hold the required role.
    pub async fn require_role(&self, id: &str, required: Role) -> LedgerResult<Account> {
        let account = self.account(id).await?;
        if account.role != required {
            return Err(LedgerError::RoleMismatch {
                account_id: id.to_string(),
                required,
                actual: account.role,
            });
        }
        Ok(account)
    }

    /// Role check plus the admin-approval gate used by trading operations
    pub async fn require_approved_role(&self, id: &str, required: Role) -> LedgerResult<Account> {
        let account = self.require_role(id, required).await?;
        if !account.approved {
            return Err(LedgerError::AccountNotApproved(id.to_string()));
        }
        Ok(account)
    }

    fn validate_amount(amount: f64) -> LedgerResult<()> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(LedgerError::Validation(format!(
                "amount must be a positive number, got {amount}"
            )));
        }
        Ok(())
    }

    /// Credit an account. Returns the new balance.
    ///
    /// Like every balance mutation, the change is staged on a clone and
    /// persisted while the accounts write lock is held; the cache is only
    /// updated once the write has landed. A storage failure leaves no
    /// observable change, and persists cannot reorder between writers.
    pub async fn credit(&self, account_id: &str, amount: f64) -> LedgerResult<f64> {
        Self::validate_amount(amount)?;

        let mut accounts = self.accounts.write().await;
        let mut updated = accounts
            .get(account_id)
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))?
            .clone();
        updated.apply_credit(amount);

        self.persist_account(&updated).await?;
        let balance = updated.balance;
        accounts.insert(account_id.to_string(), updated);

        debug!(account_id, amount, balance, "credited account");
        Ok(balance)
    }

    /// Debit an account, failing with `InsufficientBalance` rather than
    /// letting the balance go negative. Returns the new balance.
    pub async fn debit(&self, account_id: &str, amount: f64) -> LedgerResult<f64> {
        Self::validate_amount(amount)?;

        let mut accounts = self.accounts.write().await;
        let mut updated = accounts
            .get(account_id)
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))?
            .clone();
        updated.apply_debit(amount)?;

        self.persist_account(&updated).await?;
        let balance = updated.balance;
        accounts.insert(account_id.to_string(), updated);

        debug!(account_id, amount, balance, "debited account");
        Ok(balance)
    }

    /// Debit up to `amount`, flooring the balance at zero instead of failing.
    /// Used by the commute status workflow when reversing earlier grants.
    /// Returns the new balance.
    pub async fn debit_saturating(&self, account_id: &str, amount: f64) -> LedgerResult<f64> {
        Self::validate_amount(amount)?;

        let mut accounts = self.accounts.write().await;
        let mut updated = accounts
            .get(account_id)
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))?
            .clone();
        let deducted = updated.balance.min(amount);
        if deducted > 0.0 {
            updated.apply_debit(deducted)?;
        }

        self.persist_account(&updated).await?;
        let balance = updated.balance;
        accounts.insert(account_id.to_string(), updated);

        debug!(account_id, deducted, balance, "debited account (saturating)");
        Ok(balance)
    }

    /// Build a team view from already-locked caches, so settlement and the
    /// public read path share one snapshot construction.
    fn team_view_of(
        accounts: &HashMap<String, Account>,
        members: &HashMap<String, BTreeSet<String>>,
        employer: &Account,
    ) -> TeamView {
        let member_balances = members
            .get(&employer.id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| accounts.get(id))
                    .filter(|a| a.approved)
                    .map(|a| TeamMember {
                        account_id: a.id.clone(),
                        balance: a.balance,
                    })
                    .collect()
            })
            .unwrap_or_default();

        TeamView {
            employer_id: employer.id.clone(),
            employer_balance: employer.balance,
            members: member_balances,
        }
    }

    /// Compute an employer's tradable team total from live balances.
    ///
    /// Pure read. Callers making a financial decision re-fetch this
    /// immediately before using it; settlement recomputes it again inside
    /// its own critical section.
    pub async fn team_view(&self, employer_id: &str) -> LedgerResult<TeamView> {
        let accounts = self.accounts.read().await;
        let members = self.members_by_employer.read().await;

        let employer = accounts
            .get(employer_id)
            .ok_or_else(|| LedgerError::AccountNotFound(employer_id.to_string()))?;
        if employer.role != Role::Employer {
            return Err(LedgerError::RoleMismatch {
                account_id: employer_id.to_string(),
                required: Role::Employer,
                actual: employer.role,
            });
        }

        Ok(Self::team_view_of(&accounts, &members, employer))
    }

    /// Atomically transfer `amount` from the seller organization's pooled
    /// accounts to the buyer employer.
    ///
    /// The whole operation runs inside one accounts-write-lock critical
    /// section: solvency re-check, staged deductions (employer first, then
    /// approved employees ascending by account id), and the buyer credit are
    /// read-consistent, and the staged accounts are only committed to the
    /// cache once every check has passed. A failure anywhere leaves no
    /// observable partial mutation.
    pub async fn settle_team_transfer(
        &self,
        seller_employer_id: &str,
        buyer_employer_id: &str,
        amount: f64,
    ) -> LedgerResult<Settlement> {
        Self::validate_amount(amount)?;
        if seller_employer_id == buyer_employer_id {
            return Err(LedgerError::Validation(
                "seller and buyer must be different employers".to_string(),
            ));
        }

        let mut accounts = self.accounts.write().await;
        let members = self.members_by_employer.read().await;

        let seller = accounts
            .get(seller_employer_id)
            .ok_or_else(|| LedgerError::AccountNotFound(seller_employer_id.to_string()))?
            .clone();
        if seller.role != Role::Employer {
            return Err(LedgerError::RoleMismatch {
                account_id: seller_employer_id.to_string(),
                required: Role::Employer,
                actual: seller.role,
            });
        }

        let buyer = accounts
            .get(buyer_employer_id)
            .ok_or_else(|| LedgerError::AccountNotFound(buyer_employer_id.to_string()))?
            .clone();
        if buyer.role != Role::Employer {
            return Err(LedgerError::RoleMismatch {
                account_id: buyer_employer_id.to_string(),
                required: Role::Employer,
                actual: buyer.role,
            });
        }

        // Solvency re-check against current balances, not offer-creation-time
        // balances. The team may have spent credits since the offer was made.
        let team = Self::team_view_of(&accounts, &members, &seller);
        if team.total() < amount {
            return Err(LedgerError::InsufficientTeamCredits {
                available: team.total(),
                requested: amount,
                employer: team.employer_balance,
                employees: team.employee_total(),
            });
        }

        // Stage all mutations on clones; nothing is visible until commit.
        let mut staged: Vec<Account> = Vec::new();
        let mut deductions: Vec<AccountDelta> = Vec::new();
        let mut remaining = amount;

        let mut seller_account = seller;
        let take = seller_account.balance.min(remaining);
        if take > 0.0 {
            seller_account.apply_debit(take)?;
            deductions.push(AccountDelta {
                account_id: seller_account.id.clone(),
                amount: take,
            });
            remaining -= take;
        }
        staged.push(seller_account);

        for member in &team.members {
            if remaining <= 0.0 {
                break;
            }
            let mut account = accounts
                .get(&member.account_id)
                .ok_or_else(|| LedgerError::AccountNotFound(member.account_id.clone()))?
                .clone();
            let take = account.balance.min(remaining);
            if take > 0.0 {
                account.apply_debit(take)?;
                deductions.push(AccountDelta {
                    account_id: account.id.clone(),
                    amount: take,
                });
                remaining -= take;
                staged.push(account);
            }
        }

        // Floating point residue guard; unreachable after the solvency check.
        if remaining > 1e-9 {
            return Err(LedgerError::InsufficientTeamCredits {
                available: team.total(),
                requested: amount,
                employer: team.employer_balance,
                employees: team.employee_total(),
            });
        }

        let mut buyer_account = buyer;
        buyer_account.apply_credit(amount);
        let buyer_balance = buyer_account.balance;
        staged.push(buyer_account);

        // Persist first, commit after: a storage failure aborts with the
        // cache untouched.
        for account in &staged {
            self.persist_account(account).await?;
        }
        for account in staged {
            accounts.insert(account.id.clone(), account);
        }

        let seller_after = accounts
            .get(seller_employer_id)
            .ok_or_else(|| LedgerError::AccountNotFound(seller_employer_id.to_string()))?;
        let seller_team_total = Self::team_view_of(&accounts, &members, seller_after).total();

        info!(
            seller = seller_employer_id,
            buyer = buyer_employer_id,
            amount,
            accounts_touched = deductions.len() + 1,
            "settled team transfer"
        );

        Ok(Settlement {
            seller_employer_id: seller_employer_id.to_string(),
            buyer_employer_id: buyer_employer_id.to_string(),
            amount,
            deductions,
            buyer_balance,
            seller_team_total,
        })
    }

    /// Undo a completed team transfer: debit the buyer the full amount and
    /// restore every recorded deduction to the account it was taken from.
    ///
    /// Used by callers whose own commit fails after the transfer has been
    /// applied, so that neither half of the operation survives. Follows the
    /// same staged-clones, persist-first discipline as the transfer itself.
    pub async fn reverse_settlement(&self, settlement: &Settlement) -> LedgerResult<()> {
        let mut accounts = self.accounts.write().await;

        let mut staged: Vec<Account> = Vec::new();

        let mut buyer = accounts
            .get(&settlement.buyer_employer_id)
            .ok_or_else(|| LedgerError::AccountNotFound(settlement.buyer_employer_id.clone()))?
            .clone();
        buyer.apply_debit(settlement.amount)?;
        staged.push(buyer);

        for delta in &settlement.deductions {
            let mut account = accounts
                .get(&delta.account_id)
                .ok_or_else(|| LedgerError::AccountNotFound(delta.account_id.clone()))?
                .clone();
            account.apply_credit(delta.amount);
            staged.push(account);
        }

        for account in &staged {
            self.persist_account(account).await?;
        }
        for account in staged {
            accounts.insert(account.id.clone(), account);
        }

        info!(
            seller = %settlement.seller_employer_id,
            buyer = %settlement.buyer_employer_id,
            amount = settlement.amount,
            "reversed team transfer"
        );

        Ok(())
    }
}
