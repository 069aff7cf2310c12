//! Account types for the credit ledger.

use std::fmt;

use serde::{Deserialize, Serialize};

use greenmile_core::utils::timestamp_secs;

use crate::{LedgerError, LedgerResult};

/// Role held by an account owner. Authentication itself is the concern of an
/// external identity layer; the ledger only records the role it reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Employer,
    Employee,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Admin => "admin",
            Role::Employer => "employer",
            Role::Employee => "employee",
        };
        f.write_str(s)
    }
}

/// An account in the credit ledger.
///
/// The balance is non-negative at all times and only ever changes through
/// the [`CreditLedger`](crate::CreditLedger) credit, debit, and settlement
/// operations; client input never reaches it directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Account id, assigned by the external identity layer
    pub id: String,
    /// Display name of the owner
    pub name: String,
    /// Role of the owner
    pub role: Role,
    /// Company name, set for employers and denormalised onto trade offers
    pub company_name: Option<String>,
    /// Owning employer, set for employees
    pub employer_id: Option<String>,
    /// Current credit balance
    pub balance: f64,
    /// Admin approval flag. Unapproved employees do not count toward the
    /// tradable team total.
    pub approved: bool,
    /// When the account was created
    pub created_at: u64,
    /// When the account was last updated
    pub updated_at: u64,
}

impl Account {
    /// Create a new employer account
    pub fn new_employer(id: &str, name: &str, company_name: &str) -> Self {
        Self::new(id, name, Role::Employer, Some(company_name.to_string()), None)
    }

    /// Create a new employee account attached to an employer
    pub fn new_employee(id: &str, name: &str, employer_id: &str) -> Self {
        Self::new(id, name, Role::Employee, None, Some(employer_id.to_string()))
    }

    /// Create a new admin account. Admins are approved from the start.
    pub fn new_admin(id: &str, name: &str) -> Self {
        let mut account = Self::new(id, name, Role::Admin, None, None);
        account.approved = true;
        account
    }

    fn new(
        id: &str,
        name: &str,
        role: Role,
        company_name: Option<String>,
        employer_id: Option<String>,
    ) -> Self {
        let now = timestamp_secs();
        Self {
            id: id.to_string(),
            name: name.to_string(),
            role,
            company_name,
            employer_id,
            balance: 0.0,
            approved: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether a debit can be covered without going negative
    pub fn can_debit(&self, amount: f64) -> bool {
        self.balance >= amount
    }

    /// Apply a credit (increase balance)
    pub(crate) fn apply_credit(&mut self, amount: f64) {
        self.balance += amount;
        self.updated_at = timestamp_secs();
    }

    /// Apply a debit (decrease balance), refusing to go below zero
    pub(crate) fn apply_debit(&mut self, amount: f64) -> LedgerResult<()> {
        if !self.can_debit(amount) {
            return Err(LedgerError::InsufficientBalance {
                account_id: self.id.clone(),
                available: self.balance,
                requested: amount,
            });
        }

        self.balance -= amount;
        self.updated_at = timestamp_secs();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debit_never_goes_negative() {
        let mut account = Account::new_employee("emp-1", "Sam", "employer-1");
        account.apply_credit(5.0);

        assert!(account.apply_debit(6.0).is_err());
        assert_eq!(account.balance, 5.0);

        account.apply_debit(5.0).unwrap();
        assert_eq!(account.balance, 0.0);
    }

    #[test]
    fn admin_is_approved_by_default() {
        assert!(Account::new_admin("admin-1", "Root").approved);
        assert!(!Account::new_employer("employer-1", "Ada", "Acme").approved);
    }
}
