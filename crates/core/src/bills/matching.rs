use serde::{Deserialize, Serialize};

use crate::gateway::Transaction;

/// Identifies the transactions that pay a bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRule {
    #[serde(alias = "match")]
    pub pattern: String,
    pub min_amount: Option<i64>,
    pub max_amount: Option<i64>,
}

impl MatchRule {
    /// Posted debits whose title or description contains the pattern
    /// (case-insensitive). Amount bounds only apply to variable bills.
    pub fn matches(&self, tx: &Transaction, variable: bool) -> bool {
        if !tx.is_posted_debit() {
            return false;
        }
        let needle = self.pattern.to_lowercase();
        let text_match = tx.title.to_lowercase().contains(&needle)
            || tx
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
        if !text_match {
            return false;
        }
        if variable {
            let amount = tx.amount.abs();
            if self.min_amount.is_some_and(|min| amount < min) {
                return false;
            }
            if self.max_amount.is_some_and(|max| amount > max) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::TransactionStatus;
    use chrono::NaiveDate;

    fn tx(amount: i64, title: &str, description: Option<&str>, status: TransactionStatus) -> Transaction {
        Transaction {
            id: "t1".into(),
            date: NaiveDate::from_ymd_opt(2025, 9, 2).unwrap(),
            amount,
            title: title.into(),
            description: description.map(str::to_string),
            subaccount_id: None,
            status,
        }
    }

    fn rule(min: Option<i64>, max: Option<i64>) -> MatchRule {
        MatchRule {
            pattern: "Electric".into(),
            min_amount: min,
            max_amount: max,
        }
    }

    #[test]
    fn test_matches_title_or_description_case_insensitively() {
        let rule = rule(None, None);
        assert!(rule.matches(&tx(-8_000, "CITY ELECTRIC CO", None, TransactionStatus::Posted), false));
        assert!(rule.matches(&tx(-8_000, "ACH", Some("electric bill"), TransactionStatus::Posted), false));
        assert!(!rule.matches(&tx(-8_000, "Water", None, TransactionStatus::Posted), false));
    }

    #[test]
    fn test_ignores_credits_and_pending() {
        let rule = rule(None, None);
        assert!(!rule.matches(&tx(8_000, "Electric refund", None, TransactionStatus::Posted), false));
        assert!(!rule.matches(&tx(-8_000, "Electric", None, TransactionStatus::Pending), false));
    }

    #[test]
    fn test_bounds_only_apply_to_variable_bills() {
        let rule = rule(Some(5_000), Some(10_000));
        let big = tx(-12_000, "Electric", None, TransactionStatus::Posted);
        assert!(rule.matches(&big, false));
        assert!(!rule.matches(&big, true));
        assert!(rule.matches(&tx(-10_000, "Electric", None, TransactionStatus::Posted), true));
        assert!(!rule.matches(&tx(-4_999, "Electric", None, TransactionStatus::Posted), true));
    }
}
