//! Domain events runtime bridge for the web server.
//!
//! Receives domain events via `DomainEventSink`, debounces them, and after
//! any money movement runs a ledger refresh so the day's balance point is
//! recorded and new bank transactions are matched against bills.

mod planner;
mod queue_worker;
mod sink;

pub use sink::WebDomainEventSink;
