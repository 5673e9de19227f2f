//! Cards module - debit cards and the pocket each holder spends from.

mod cards_model;
mod cards_service;
mod cards_traits;

#[cfg(test)]
mod cards_service_tests;

pub use cards_model::{Card, SpendPocketChange};
pub use cards_service::CardService;
pub use cards_traits::CardServiceTrait;
