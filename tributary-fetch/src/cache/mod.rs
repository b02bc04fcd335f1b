//! Resilient cache layer.
//!
//! ```text
//! ResilientCache                 <- fail-open facade, counters, key prefix
//!   └── dyn CacheBackend
//!         ├── RedisCacheBackend       <- lazy multiplexed connection
//!         ├── MemoryCacheBackend      <- in-process, lazy TTL
//!         └── UnreachableCacheBackend <- always errors
//! ```
//!
//! Caching is an optimisation: nothing above this module needs the cache
//! to be up.

mod backend;
mod key;
mod redis_backend;
mod resilient;

pub use backend::{CacheBackend, MemoryCacheBackend, UnreachableCacheBackend};
pub use key::{CacheTtl, canonical_json, keyed};
pub use redis_backend::RedisCacheBackend;
pub use resilient::{CacheStats, ResilientCache};
