//! Pocketbook Core - the ledger and synchronization engine.
//!
//! This crate holds the pocket ledger, bill reservations, transfers and the
//! credit-account sync scheduler. It is database-agnostic: persistence and
//! remote services are reached through traits implemented by the
//! `storage-sqlite` and `connect` crates.

pub mod bills;
pub mod cache;
pub mod cards;
pub mod changes;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod ledger;
pub mod reports;
pub mod sync;
pub mod testing;
pub mod transfers;
pub mod utils;

pub use changes::{Mutation, Resource};
pub use engine::{Engine, EngineConfig, EngineDeps};

// Re-export error types
pub use errors::Error;
pub use errors::Result;
