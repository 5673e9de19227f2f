//! Read-through caching for gateway responses.

mod cached_gateway;
mod ttl_cache;

pub use cached_gateway::{CacheConfig, CacheKey, CachedGateway};
pub use ttl_cache::{Fetched, TtlCache};
