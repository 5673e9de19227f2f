use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::gateway::Transaction;

/// Local filter over the cached transaction page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilter {
    /// Case-insensitive match on title or description.
    pub search: Option<String>,
    /// Inclusive.
    pub min_date: Option<NaiveDate>,
    /// Inclusive.
    pub max_date: Option<NaiveDate>,
    /// Bounds on the absolute amount.
    pub min_amount: Option<i64>,
    pub max_amount: Option<i64>,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &Transaction) -> bool {
        if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let needle = term.to_lowercase();
            let in_title = tx.title.to_lowercase().contains(&needle);
            let in_description = tx
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            if !in_title && !in_description {
                return false;
            }
        }
        if self.min_date.is_some_and(|d| tx.date < d) || self.max_date.is_some_and(|d| tx.date > d) {
            return false;
        }
        let magnitude = tx.amount.abs();
        !(self.min_amount.is_some_and(|m| magnitude < m) || self.max_amount.is_some_and(|m| magnitude > m))
    }
}

/// Money in and out for the current calendar month.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTrends {
    pub month_start: Option<NaiveDate>,
    /// Sum of positive amounts.
    pub earned: i64,
    /// Sum of absolute negative amounts.
    pub spent: i64,
    pub net: i64,
    pub transaction_count: usize,
}

/// Account balance at the last fresh refresh of a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceHistoryPoint {
    pub date: NaiveDate,
    pub balance: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::TransactionStatus;

    fn tx(date: NaiveDate, amount: i64, title: &str, description: Option<&str>) -> Transaction {
        Transaction {
            id: "tx-1".to_string(),
            date,
            amount,
            title: title.to_string(),
            description: description.map(str::to_string),
            subaccount_id: None,
            status: TransactionStatus::Posted,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, d).unwrap()
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(TransactionFilter::default().matches(&tx(day(1), -100, "Coffee", None)));
    }

    #[test]
    fn test_search_checks_title_and_description() {
        let filter = TransactionFilter {
            search: Some("grocer".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&tx(day(1), -100, "GROCERY MARKET", None)));
        assert!(filter.matches(&tx(day(1), -100, "Card", Some("Neighborhood grocer"))));
        assert!(!filter.matches(&tx(day(1), -100, "Coffee", None)));
    }

    #[test]
    fn test_date_bounds_are_inclusive() {
        let filter = TransactionFilter {
            min_date: Some(day(5)),
            max_date: Some(day(10)),
            ..Default::default()
        };
        assert!(filter.matches(&tx(day(5), -1, "a", None)));
        assert!(filter.matches(&tx(day(10), -1, "a", None)));
        assert!(!filter.matches(&tx(day(4), -1, "a", None)));
        assert!(!filter.matches(&tx(day(11), -1, "a", None)));
    }

    #[test]
    fn test_amount_bounds_use_absolute_value() {
        let filter = TransactionFilter {
            min_amount: Some(1_000),
            max_amount: Some(5_000),
            ..Default::default()
        };
        assert!(filter.matches(&tx(day(1), -2_500, "a", None)));
        assert!(filter.matches(&tx(day(1), 5_000, "a", None)));
        assert!(!filter.matches(&tx(day(1), -999, "a", None)));
        assert!(!filter.matches(&tx(day(1), -5_001, "a", None)));
    }
}
