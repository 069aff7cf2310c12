//! Team balance aggregation.
//!
//! A team is not a stored entity; it is the derived relationship between an
//! employer and the approved employees referencing it. The view is always
//! computed from live balances, and callers re-fetch it immediately before
//! any financial decision rather than caching a total across a settlement.

use serde::{Deserialize, Serialize};

/// One approved employee's contribution to the team total
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMember {
    pub account_id: String,
    pub balance: f64,
}

/// A consistent snapshot of an employer's pooled tradable balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamView {
    pub employer_id: String,
    pub employer_balance: f64,
    /// Approved employees, ascending by account id. Settlement draws from
    /// them in exactly this order.
    pub members: Vec<TeamMember>,
}

impl TeamView {
    /// Sum of the approved employees' balances
    pub fn employee_total(&self) -> f64 {
        self.members.iter().map(|m| m.balance).sum()
    }

    /// The tradable team total: employer balance plus employee balances
    pub fn total(&self) -> f64 {
        self.employer_balance + self.employee_total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_add_up() {
        let view = TeamView {
            employer_id: "employer-1".to_string(),
            employer_balance: 10.0,
            members: vec![
                TeamMember {
                    account_id: "emp-1".to_string(),
                    balance: 5.0,
                },
                TeamMember {
                    account_id: "emp-2".to_string(),
                    balance: 3.0,
                },
            ],
        };

        assert_eq!(view.employee_total(), 8.0);
        assert_eq!(view.total(), 18.0);
    }
}
