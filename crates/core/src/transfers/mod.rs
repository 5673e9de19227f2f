//! Transfers module - validated money movement between the primary account
//! and pockets.

mod transfers_model;
mod transfers_service;
mod transfers_traits;


pub use transfers_model::{TransferReceipt, TransferRequest};
pub use transfers_service::TransferService;
pub use transfers_traits::TransferServiceTrait;
