mod model;
mod repository;

pub use model::SyncAccountDB;
pub use repository::SyncAccountRepository;
