//! Bills module - recurring bills, their reservation pockets and the
//! funding schedule that fills them.

mod bills_model;
mod bills_service;
mod bills_traits;
mod funding_schedule;
mod matching;

#[cfg(test)]
mod bills_service_tests;

pub use bills_model::*;
pub use bills_service::BillService;
pub use bills_traits::{bill_scope, BillServiceTrait, ReconciliationRepositoryTrait};
pub use funding_schedule::{
    anchor_date, current_cycle, progress_percent, prorated_reservation, target_reservation, Cycle,
};
pub use matching::MatchRule;
