use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use log::{debug, info, warn};

use super::bills_model::{
    AppliedMatch, Bill, BillFunding, BillReserveSummary, BillsOverview, CreatedBill, FundingReport,
    NewBill, ReconciliationReport,
};
use super::bills_traits::{bill_scope, BillServiceTrait, ReconciliationRepositoryTrait};
use super::funding_schedule::{anchor_date, current_cycle, progress_percent, target_reservation};
use crate::changes::{Mutation, Resource};
use crate::constants::DEFAULT_FUNDING_SOURCE_NAME;
use crate::errors::{Error, Result, ValidationError};
use crate::events::DomainEvent;
use crate::gateway::{AccountSnapshot, BillRecord, NewBillRequest, Transaction};
use crate::ledger::LedgerService;
use crate::utils::clock::Clock;

/// Service for bills and their reservation pockets.
pub struct BillService {
    ledger: Arc<LedgerService>,
    reconciliations: Arc<dyn ReconciliationRepositoryTrait>,
    clock: Arc<dyn Clock>,
}

impl BillService {
    pub fn new(
        ledger: Arc<LedgerService>,
        reconciliations: Arc<dyn ReconciliationRepositoryTrait>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger,
            reconciliations,
            clock,
        }
    }

    fn changed() -> BTreeSet<Resource> {
        let mut changed = Resource::balance_bearing();
        changed.insert(Resource::Bills);
        changed
    }

    async fn funding_source(&self) -> String {
        match self.ledger.gateway().funding_source_name(false).await {
            Ok(name) if !name.trim().is_empty() => name,
            Ok(_) => DEFAULT_FUNDING_SOURCE_NAME.to_string(),
            Err(e) => {
                warn!("Falling back to default funding source name: {}", e);
                DEFAULT_FUNDING_SOURCE_NAME.to_string()
            }
        }
    }

    /// Builds the display view of a bill against the current pocket balance.
    fn decorate(record: &BillRecord, snapshot: &AccountSnapshot, today: NaiveDate) -> Bill {
        let mut bill = Bill::from_record(record);
        let pocket_balance = record
            .pocket_id
            .as_deref()
            .and_then(|id| snapshot.find(id))
            .map(|p| p.balance);
        if pocket_balance.is_none() {
            bill.linked_pocket_id = None;
        }
        bill.reserved = pocket_balance.unwrap_or(0);
        bill.progress = progress_percent(bill.reserved, bill.amount);

        if let Some(cycle) = current_cycle(record.anchor_date, record.frequency, record.day_of_month, today) {
            bill.next_due_date = Some(cycle.next_due);
        }
        if !record.paused && pocket_balance.is_some() {
            let tomorrow = today + Duration::days(1);
            bill.estimated_next_funding =
                target_reservation(record.amount, record.frequency, record.anchor_date, record.day_of_month, tomorrow)
                    .map(|(_, target)| (target - bill.reserved).max(0))
                    .unwrap_or(0);
        }
        bill
    }

    async fn load_bills(&self, force: bool) -> Result<Vec<Bill>> {
        let gateway = self.ledger.gateway();
        let records = gateway.bills(force).await?;
        let snapshot = gateway.snapshot_or_stale(force).await?.value;
        let today = self.clock.today();

        let mut bills: Vec<Bill> = records
            .iter()
            .map(|r| Self::decorate(r, &snapshot, today))
            .collect();
        bills.sort_by(|a, b| match (a.next_due_date, b.next_due_date) {
            (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.name.cmp(&b.name)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.name.cmp(&b.name),
        });
        Ok(bills)
    }

    fn summarize(&self, bills: &[Bill], funding_source: String) -> BillReserveSummary {
        let estimated_funding: i64 = bills.iter().map(|b| b.estimated_next_funding).sum();
        let has_active = bills.iter().any(|b| !b.paused && b.is_funded());
        BillReserveSummary {
            total_reserved: bills.iter().map(|b| b.reserved).sum(),
            next_funding_date: has_active.then(|| self.clock.today() + Duration::days(1)),
            estimated_funding,
            funding_source,
        }
    }
}

#[async_trait]
impl BillServiceTrait for BillService {
    async fn list_bills(&self, force: bool) -> Result<Vec<Bill>> {
        self.load_bills(force).await
    }

    async fn bills_overview(&self, force: bool) -> Result<BillsOverview> {
        let bills = self.load_bills(force).await?;
        let summary = self.summarize(&bills, self.funding_source().await);
        Ok(BillsOverview { bills, summary })
    }

    async fn bill_reserve_summary(&self, force: bool) -> Result<BillReserveSummary> {
        let bills = self.load_bills(force).await?;
        Ok(self.summarize(&bills, self.funding_source().await))
    }

    async fn create_bill(&self, new_bill: NewBill) -> Result<Mutation<CreatedBill>> {
        let (frequency, match_rule) = new_bill.validate()?;
        self.ledger.ensure_writable()?;
        let name = new_bill.name.trim().to_string();
        let _locks = self.ledger.lock(Vec::<String>::new(), true).await;

        let gateway = self.ledger.gateway();
        let existing = gateway.bills(true).await?;
        if existing.iter().any(|b| b.name.eq_ignore_ascii_case(&name)) {
            return Err(ValidationError::InvalidInput(format!("a bill named '{}' already exists", name)).into());
        }

        let today = self.clock.today();
        let anchor = anchor_date(today, new_bill.day_of_month)
            .ok_or_else(|| Error::Unexpected(format!("cannot compute anchor date for {}", today)))?;
        let (cycle, reserve) = target_reservation(new_bill.amount, frequency, anchor, new_bill.day_of_month, today)
            .ok_or_else(|| Error::Unexpected(format!("cannot compute funding cycle for {}", name)))?;
        debug!(
            "Bill {}: cycle {} -> {}, catch-up reservation {}",
            name, cycle.previous_due, cycle.next_due, reserve
        );

        let snapshot = self.ledger.fresh_snapshot().await?;
        let available = snapshot.safe_to_spend();
        if reserve > available {
            return Err(Error::InsufficientFunds {
                requested: reserve,
                available,
            });
        }

        let funding_source = self.funding_source().await;
        let record = gateway
            .create_bill(NewBillRequest {
                name: name.clone(),
                amount: new_bill.amount,
                frequency,
                day_of_month: new_bill.day_of_month,
                anchor_date: anchor,
                match_rule,
                variable: new_bill.variable,
                reserve_amount: reserve,
            })
            .await?;
        info!("Created bill {} ({}) reserving {}", record.name, record.id, reserve);

        let mut bill = Bill::from_record(&record);
        bill.reserved = reserve;
        bill.progress = progress_percent(reserve, bill.amount);
        bill.next_due_date = Some(cycle.next_due);

        let mutation = Mutation::new(
            CreatedBill {
                bill,
                reserved_amount: reserve,
                funding_source,
            },
            Self::changed(),
        );
        self.ledger
            .finish_mutation(mutation, DomainEvent::bills_changed(vec![record.id]))
            .await
    }

    async fn delete_bill(&self, bill_id: &str) -> Result<Mutation<i64>> {
        self.ledger.ensure_writable()?;
        let gateway = self.ledger.gateway();
        let record = gateway
            .bills(true)
            .await?
            .iter()
            .find(|b| b.id == bill_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Bill {} not found", bill_id)))?;

        let returned = {
            let _locks = self.ledger.lock(record.pocket_id.clone(), true).await;
            let mut returned = 0;
            if let Some(pocket_id) = record.pocket_id.as_deref() {
                let snapshot = self.ledger.fresh_snapshot().await?;
                if snapshot.find(pocket_id).is_some() {
                    returned = self.ledger.remove_pocket_unlocked(&snapshot, pocket_id).await?;
                }
            }
            gateway.delete_bill(bill_id).await?;
            returned
        };
        if let Some(pocket_id) = record.pocket_id.as_deref() {
            self.ledger.forget_lock(pocket_id);
        }
        if let Err(e) = self.reconciliations.clear_scope(&bill_scope(bill_id)).await {
            warn!("Failed to clear reconciliation records for bill {}: {}", bill_id, e);
        }
        info!("Deleted bill {} ({}), returned {}", record.name, bill_id, returned);

        let mutation = Mutation::new(returned, Self::changed());
        self.ledger
            .finish_mutation(mutation, DomainEvent::bills_changed(vec![bill_id.to_string()]))
            .await
    }

    async fn fund_bills(&self) -> Result<Mutation<FundingReport>> {
        self.ledger.ensure_writable()?;
        let gateway = self.ledger.gateway();
        let records = gateway.bills(true).await?;
        let pocket_ids: Vec<String> = records.iter().filter_map(|b| b.pocket_id.clone()).collect();
        let _locks = self.ledger.lock(pocket_ids, true).await;

        let snapshot = self.ledger.fresh_snapshot().await?;
        let primary_id = snapshot
            .primary()
            .map(|p| p.id.clone())
            .ok_or_else(|| Error::Unexpected("bank reported no primary account".to_string()))?;
        let mut available = snapshot.safe_to_spend();
        let today = self.clock.today();
        let mut report = FundingReport::default();

        for record in records.iter().filter(|b| !b.paused) {
            let Some(pocket) = record.pocket_id.as_deref().and_then(|id| snapshot.find(id)) else {
                continue;
            };
            let Some((_, target)) =
                target_reservation(record.amount, record.frequency, record.anchor_date, record.day_of_month, today)
            else {
                continue;
            };
            let need = target - pocket.balance;
            if need <= 0 {
                continue;
            }
            let amount = need.min(available);
            if amount <= 0 {
                warn!("No safe-to-spend left to fund bill {}", record.name);
                report.funded.push(BillFunding {
                    bill_id: record.id.clone(),
                    amount: 0,
                    short: true,
                });
                continue;
            }
            self.ledger
                .move_funds_unlocked(&primary_id, &pocket.id, amount, &format!("Fund {}", record.name))
                .await?;
            available -= amount;
            report.total += amount;
            report.funded.push(BillFunding {
                bill_id: record.id.clone(),
                amount,
                short: amount < need,
            });
        }

        if report.total == 0 {
            return Ok(Mutation::unchanged(report));
        }
        info!("Funded {} bills with {}", report.funded.len(), report.total);
        let bill_ids = report.funded.iter().map(|f| f.bill_id.clone()).collect();
        self.ledger
            .finish_mutation(Mutation::new(report, Self::changed()), DomainEvent::bills_changed(bill_ids))
            .await
    }

    async fn reconcile_transactions(
        &self,
        transactions: &[Transaction],
        only_bill: Option<&str>,
    ) -> Result<Mutation<ReconciliationReport>> {
        self.ledger.ensure_writable()?;
        let records = self.ledger.gateway().bills(false).await?;

        // Pending matches per bill, oldest first.
        let mut pending: Vec<(BillRecord, Vec<&Transaction>)> = Vec::new();
        for record in records.iter() {
            if only_bill.is_some_and(|id| id != record.id) {
                continue;
            }
            let (Some(rule), Some(_)) = (&record.match_rule, &record.pocket_id) else {
                continue;
            };
            let created = record.created_at.date_naive();
            let scope = bill_scope(&record.id);
            let mut matched = Vec::new();
            for tx in transactions {
                if tx.date >= created
                    && rule.matches(tx, record.variable)
                    && !self.reconciliations.is_reconciled(&scope, &tx.id)?
                {
                    matched.push(tx);
                }
            }
            if !matched.is_empty() {
                matched.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
                pending.push((record.clone(), matched));
            }
        }
        if pending.is_empty() {
            return Ok(Mutation::unchanged(ReconciliationReport::default()));
        }

        let pocket_ids: Vec<String> = pending.iter().filter_map(|(r, _)| r.pocket_id.clone()).collect();
        let _locks = self.ledger.lock(pocket_ids, true).await;
        let snapshot = self.ledger.fresh_snapshot().await?;
        let primary_id = snapshot
            .primary()
            .map(|p| p.id.clone())
            .ok_or_else(|| Error::Unexpected("bank reported no primary account".to_string()))?;
        let mut balances: HashMap<String, i64> = snapshot
            .pockets()
            .map(|p| (p.id.clone(), p.balance))
            .collect();

        let mut report = ReconciliationReport::default();
        for (record, matched) in pending {
            let Some(pocket_id) = record.pocket_id.as_deref() else {
                continue;
            };
            let scope = bill_scope(&record.id);
            for tx in matched {
                // Recorded before money moves: a crash in between leaves the
                // money reserved instead of releasing it twice.
                if !self.reconciliations.mark_reconciled(&scope, &tx.id, tx.amount).await? {
                    continue;
                }
                let balance = balances.get(pocket_id).copied().unwrap_or(0);
                let released = tx.amount.abs().min(balance);
                if released > 0 {
                    let note = format!("{} paid", record.name);
                    if let Err(e) = self
                        .ledger
                        .move_funds_unlocked(pocket_id, &primary_id, released, &note)
                        .await
                    {
                        if e.outcome_unknown() {
                            // The release may have gone through; keeping the
                            // mark means it is never applied a second time.
                            warn!(
                                "Release for transaction {} on bill {} has an unknown outcome, keeping it reconciled: {}",
                                tx.id, record.name, e
                            );
                        } else if let Err(unmark_err) = self.reconciliations.unmark(&scope, &tx.id).await {
                            warn!("Failed to roll back reconciliation of {}: {}", tx.id, unmark_err);
                        }
                        return Err(e);
                    }
                    balances.insert(pocket_id.to_string(), balance - released);
                    report.total_released += released;
                }
                debug!("Applied transaction {} to bill {} (released {})", tx.id, record.name, released);
                report.applied.push(AppliedMatch {
                    bill_id: record.id.clone(),
                    transaction_id: tx.id.clone(),
                    released,
                });
            }
        }

        if report.total_released == 0 {
            return Ok(Mutation::new(report, [Resource::Bills]));
        }
        info!(
            "Reconciled {} transactions, released {}",
            report.applied.len(),
            report.total_released
        );
        let bill_ids: Vec<String> = report
            .applied
            .iter()
            .map(|a| a.bill_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        self.ledger
            .finish_mutation(Mutation::new(report, Self::changed()), DomainEvent::bills_changed(bill_ids))
            .await
    }
}

