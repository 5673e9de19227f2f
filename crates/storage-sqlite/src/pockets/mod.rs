mod model;
mod repository;

pub use model::PocketMetaDB;
pub use repository::PocketMetaRepository;
