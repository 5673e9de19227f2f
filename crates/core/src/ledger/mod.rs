//! Ledger module - pockets, safe-to-spend and the invariant between them.

mod ledger_model;
mod ledger_service;
mod ledger_traits;
mod locks;


pub use ledger_model::{LedgerSnapshot, NewPocket, Pocket, PocketMeta};
pub use ledger_service::LedgerService;
pub use ledger_traits::{LedgerServiceTrait, PocketMetaRepositoryTrait};
pub use locks::{LockRegistry, LockSet};
