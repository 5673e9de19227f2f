use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::matching::MatchRule;
use crate::errors::{Error, Result, ValidationError};
use crate::gateway::BillRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillFrequency {
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
    SemiAnnually,
    Annually,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CadenceUnit {
    Week,
    Month,
    Year,
}

impl BillFrequency {
    /// Unit and interval the bank schedules this frequency with.
    pub fn cadence(&self) -> (CadenceUnit, u32) {
        match self {
            BillFrequency::Weekly => (CadenceUnit::Week, 1),
            BillFrequency::Biweekly => (CadenceUnit::Week, 2),
            BillFrequency::Monthly => (CadenceUnit::Month, 1),
            BillFrequency::Quarterly => (CadenceUnit::Month, 3),
            BillFrequency::SemiAnnually => (CadenceUnit::Month, 6),
            BillFrequency::Annually => (CadenceUnit::Year, 1),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BillFrequency::Weekly => "WEEKLY",
            BillFrequency::Biweekly => "BIWEEKLY",
            BillFrequency::Monthly => "MONTHLY",
            BillFrequency::Quarterly => "QUARTERLY",
            BillFrequency::SemiAnnually => "SEMI_ANNUALLY",
            BillFrequency::Annually => "ANNUALLY",
        }
    }
}

impl fmt::Display for BillFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillFrequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WEEKLY" => Ok(BillFrequency::Weekly),
            "BIWEEKLY" => Ok(BillFrequency::Biweekly),
            "MONTHLY" => Ok(BillFrequency::Monthly),
            "QUARTERLY" => Ok(BillFrequency::Quarterly),
            "SEMI_ANNUALLY" => Ok(BillFrequency::SemiAnnually),
            "ANNUALLY" => Ok(BillFrequency::Annually),
            _ => Err(ValidationError::InvalidFrequency(s.to_string()).into()),
        }
    }
}

/// Input model for creating a bill. Amounts are cents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBill {
    pub name: String,
    pub amount: i64,
    pub frequency: String,
    pub day_of_month: u32,
    pub match_string: Option<String>,
    pub min_amount: Option<i64>,
    pub max_amount: Option<i64>,
    #[serde(default)]
    pub variable: bool,
}

impl NewBill {
    /// Validates the input and returns the parsed frequency and match rule.
    pub fn validate(&self) -> Result<(BillFrequency, Option<MatchRule>)> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name".to_string()).into());
        }
        if self.amount <= 0 {
            return Err(ValidationError::NonPositiveAmount(self.amount).into());
        }
        if !(1..=31).contains(&self.day_of_month) {
            return Err(ValidationError::InvalidDayOfMonth(self.day_of_month).into());
        }
        let frequency: BillFrequency = self.frequency.parse()?;
        if self.min_amount.is_some_and(|m| m < 0) || self.max_amount.is_some_and(|m| m < 0) {
            return Err(ValidationError::InvalidInput("match amounts cannot be negative".to_string()).into());
        }
        if let (Some(min), Some(max)) = (self.min_amount, self.max_amount) {
            if min > max {
                return Err(ValidationError::InvalidInput(
                    "minimum amount cannot exceed maximum amount".to_string(),
                )
                .into());
            }
        }
        let match_rule = self
            .match_string
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|pattern| MatchRule {
                pattern: pattern.to_string(),
                min_amount: self.min_amount,
                max_amount: self.max_amount,
            });
        Ok((frequency, match_rule))
    }
}

/// A bill with its reservation state as shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub id: String,
    pub name: String,
    pub amount: i64,
    pub frequency: BillFrequency,
    pub day_of_month: u32,
    pub anchor_date: NaiveDate,
    pub match_rule: Option<MatchRule>,
    pub variable: bool,
    pub linked_pocket_id: Option<String>,
    pub paused: bool,
    pub created_at: DateTime<Utc>,
    /// Current balance of the linked pocket; 0 when the pocket is gone.
    pub reserved: i64,
    pub progress: f64,
    /// The date the reservation must be complete by.
    pub next_due_date: Option<NaiveDate>,
    pub estimated_next_funding: i64,
}

impl Bill {
    pub fn is_funded(&self) -> bool {
        self.linked_pocket_id.is_some()
    }

    pub(crate) fn from_record(record: &BillRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            amount: record.amount,
            frequency: record.frequency,
            day_of_month: record.day_of_month,
            anchor_date: record.anchor_date,
            match_rule: record.match_rule.clone(),
            variable: record.variable,
            linked_pocket_id: record.pocket_id.clone(),
            paused: record.paused,
            created_at: record.created_at,
            reserved: 0,
            progress: 0.0,
            next_due_date: None,
            estimated_next_funding: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedBill {
    pub bill: Bill,
    /// Amount actually moved into the new pocket.
    pub reserved_amount: i64,
    pub funding_source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillReserveSummary {
    pub total_reserved: i64,
    pub next_funding_date: Option<NaiveDate>,
    pub estimated_funding: i64,
    pub funding_source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillsOverview {
    pub bills: Vec<Bill>,
    pub summary: BillReserveSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillFunding {
    pub bill_id: String,
    pub amount: i64,
    /// Less than the target because safe-to-spend ran out.
    pub short: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingReport {
    pub funded: Vec<BillFunding>,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedMatch {
    pub bill_id: String,
    pub transaction_id: String,
    /// Amount released from the bill's pocket back to the primary account.
    pub released: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub applied: Vec<AppliedMatch>,
    pub total_released: i64,
}

impl ReconciliationReport {
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}
