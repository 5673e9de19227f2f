//! External bank gateway: the narrow request/response contract to the real
//! checking account, plus an in-memory implementation.

mod gateway_model;
mod gateway_traits;
mod memory_gateway;

pub use gateway_model::*;
pub use gateway_traits::{BankGateway, GatewayResult};
pub use memory_gateway::InMemoryBank;
