//! Reports module - transaction search, monthly trends and balance history.

mod reports_model;
mod reports_service;
mod reports_traits;


pub use reports_model::{BalanceHistoryPoint, MonthlyTrends, TransactionFilter};
pub use reports_service::ReportService;
pub use reports_traits::{BalanceHistoryRepositoryTrait, ReportServiceTrait};
