//! Domain event types.

use serde::{Deserialize, Serialize};

use crate::changes::Resource;

/// Facts about committed changes to the ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// Pockets were created, deleted or had their metadata changed.
    LedgerChanged {
        pocket_ids: Vec<String>,
        changed: Vec<Resource>,
    },

    /// Money moved between two accounts.
    TransferCompleted {
        from_id: String,
        to_id: String,
        amount: i64,
    },

    /// Bills were created, deleted, funded or reconciled.
    BillsChanged { bill_ids: Vec<String> },

    /// A credit account finished a sync run.
    SyncCompleted {
        sync_account_id: String,
        /// Net amount moved into (positive) or out of (negative) the pocket.
        pocket_delta: i64,
        reconciled: usize,
    },

    /// A credit account sync failed; nothing was retried.
    SyncFailed {
        sync_account_id: String,
        message: String,
    },

    /// The safe-to-spend invariant was violated and mutations are blocked.
    LedgerHalted { reason: String },

    /// A previously halted ledger verified clean again.
    LedgerResumed,
}

impl DomainEvent {
    pub fn ledger_changed(pocket_ids: Vec<String>, changed: impl IntoIterator<Item = Resource>) -> Self {
        Self::LedgerChanged {
            pocket_ids,
            changed: changed.into_iter().collect(),
        }
    }

    pub fn transfer_completed(from_id: impl Into<String>, to_id: impl Into<String>, amount: i64) -> Self {
        Self::TransferCompleted {
            from_id: from_id.into(),
            to_id: to_id.into(),
            amount,
        }
    }

    pub fn bills_changed(bill_ids: Vec<String>) -> Self {
        Self::BillsChanged { bill_ids }
    }

    pub fn sync_completed(sync_account_id: impl Into<String>, pocket_delta: i64, reconciled: usize) -> Self {
        Self::SyncCompleted {
            sync_account_id: sync_account_id.into(),
            pocket_delta,
            reconciled,
        }
    }

    pub fn sync_failed(sync_account_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SyncFailed {
            sync_account_id: sync_account_id.into(),
            message: message.into(),
        }
    }

    pub fn ledger_halted(reason: impl Into<String>) -> Self {
        Self::LedgerHalted {
            reason: reason.into(),
        }
    }

    /// Short name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::LedgerChanged { .. } => "ledger_changed",
            DomainEvent::TransferCompleted { .. } => "transfer_completed",
            DomainEvent::BillsChanged { .. } => "bills_changed",
            DomainEvent::SyncCompleted { .. } => "sync_completed",
            DomainEvent::SyncFailed { .. } => "sync_failed",
            DomainEvent::LedgerHalted { .. } => "ledger_halted",
            DomainEvent::LedgerResumed => "ledger_resumed",
        }
    }
}
