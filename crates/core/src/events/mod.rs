//! Domain events emitted after committed ledger mutations.
//!
//! Services report what changed through a [`DomainEventSink`]; the server
//! decides what to do with it (log it, push it to clients, etc.).

mod domain_event;
mod sink;

pub use domain_event::*;
pub use sink::*;
