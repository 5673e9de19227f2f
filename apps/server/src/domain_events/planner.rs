//! Decides what follow-up work a batch of domain events needs.

use pocketbook_core::{events::DomainEvent, Resource};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Plan {
    /// Money moved; refresh the ledger once for the whole batch.
    pub refresh_ledger: bool,
    pub halted: Option<String>,
}

pub fn plan_batch(events: &[DomainEvent]) -> Plan {
    let mut plan = Plan::default();
    for event in events {
        match event {
            DomainEvent::TransferCompleted { .. } => plan.refresh_ledger = true,
            DomainEvent::SyncCompleted { pocket_delta, .. } if *pocket_delta != 0 => {
                plan.refresh_ledger = true
            }
            DomainEvent::LedgerChanged { changed, .. } if changed.contains(&Resource::AccountBalance) => {
                plan.refresh_ledger = true
            }
            DomainEvent::LedgerHalted { reason } => plan.halted = Some(reason.clone()),
            DomainEvent::LedgerResumed => plan.halted = None,
            _ => {}
        }
    }
    // A halted ledger rejects the reconciliation a refresh would trigger.
    if plan.halted.is_some() {
        plan.refresh_ledger = false;
    }
    plan
}
