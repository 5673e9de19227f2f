mod repository;

pub use repository::ReconciliationRepository;
