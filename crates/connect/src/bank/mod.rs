//! Bank gateway over GraphQL.

mod client;
mod queries;
mod wire;

pub use client::{BankGatewayConfig, GraphQlBankGateway};
pub use wire::{bill_pocket_note, BILL_POCKET_NOTE_PREFIX};

#[cfg(test)]
mod client_tests;
