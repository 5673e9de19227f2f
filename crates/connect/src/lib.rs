//! Remote clients for Pocketbook.
//!
//! - [`GraphQlBankGateway`]: the checking account, its pockets and bills.
//! - [`SimpleFinProvider`] and [`LunchFlowProvider`]: credit-card balances
//!   and transactions for the sync scheduler.
//!
//! Every failure is reported as a `GatewayError` carrying its retry class;
//! nothing here retries on its own.

pub mod bank;
mod http;
pub mod lunchflow;
pub mod simplefin;

pub use bank::{BankGatewayConfig, GraphQlBankGateway};
pub use http::DEFAULT_TIMEOUT_SECS;
pub use lunchflow::{LunchFlowProvider, DEFAULT_LUNCHFLOW_API_URL};
pub use simplefin::SimpleFinProvider;
