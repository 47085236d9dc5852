//! Tag-versioned caching on top of Redis and Memcached.
//!
//! Cached results carry the freshness stamp of the tags they were computed
//! from. A tag's current stamp lives in the store under the tag's own key;
//! re-stamping the tag invalidates every entry computed against the old stamp
//! without touching those entries. Comparing the two stamps is left to the
//! caller.
//!
//! # Features
//!
//! - `redis` - Enable Redis cache support (enabled by default)
//! - `memcached` - Enable Memcached cache support (requires explicit opt-in)
//! - **Namespacing** - every key is stored as `key:namespace`
//! - **In-memory store** - [`MemoryConnector`] runs either adapter without a server
//!
//! # Examples
//!
//! ## Stamping and caching
//!
//! ```no_run
//! use tagstamp_cache::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), CacheError> {
//!     let cache = RedisCache::new(CacheConfig::redis("localhost", 6379).with_namespace("A"));
//!
//!     cache.init_tags(&[TagRecord::invalidate("orders", 1, 50)]).await?;
//!
//!     let tags = cache.get_tags_data(&["orders"]).await?;
//!     let entry = CacheEntry::new("rows").stamped_by(&tags["orders"]);
//!     cache.set("report1", &entry, None).await?;
//!
//!     // Later: the entry is stale once the tag was stamped after it.
//!     let cached = cache.get("report1").await?;
//!     let current = cache.get_tags_data(&["orders"]).await?;
//!     let stale = current["orders"].time > cached.time;
//!     # let _ = stale;
//!     Ok(())
//! }
//! ```
//!
//! ## Without a server
//!
//! ```
//! use tagstamp_cache::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), CacheError> {
//! let cache = MemcachedCache::with_connector(
//!     CacheConfig::memcached("localhost", 11211),
//!     MemoryConnector::default(),
//! );
//!
//! let tags = ensure_tags(&cache, &["orders"]).await?;
//! cache.set("report1", &CacheEntry::new("42").stamped_by(&tags["orders"]), None).await?;
//!
//! assert_eq!(cache.get("report1").await?.id_tag, "orders");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod helpers;
pub mod manager;
pub mod memcached_cache;
pub mod memory;
pub mod redis_cache;
mod session;
pub mod tag;
pub mod traits;

pub use config::{CacheBackend, CacheConfig, Endpoint};
pub use entry::{ArrayView, CacheEntry, Payload};
pub use error::{CacheError, CacheResult};
pub use helpers::*;
pub use manager::{open, open_from_env};
pub use memcached_cache::MemcachedCache;
pub use memory::{MemoryConnection, MemoryConnector, MemoryStore};
pub use redis_cache::RedisCache;
pub use tag::TagRecord;
pub use traits::{Connector, StoreConnection, TagCache, namespaced_key};

#[cfg(feature = "redis")]
pub use redis_cache::{RedisConnection, RedisConnector};

#[cfg(feature = "memcached")]
pub use memcached_cache::{MemcachedConnection, MemcachedConnector};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{CacheBackend, CacheConfig};
    pub use crate::entry::{ArrayView, CacheEntry, Payload};
    pub use crate::error::{CacheError, CacheResult};
    pub use crate::helpers::{ensure_tags, set_stamped};
    pub use crate::manager::open;
    pub use crate::memcached_cache::MemcachedCache;
    pub use crate::memory::MemoryConnector;
    pub use crate::redis_cache::RedisCache;
    pub use crate::tag::TagRecord;
    pub use crate::traits::{StoreConnection, TagCache};
}
