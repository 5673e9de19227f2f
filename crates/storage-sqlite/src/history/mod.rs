mod repository;

pub use repository::BalanceHistoryRepository;
