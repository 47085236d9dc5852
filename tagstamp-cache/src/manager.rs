//! Driver selection.

use crate::config::{CacheBackend, CacheConfig};
use crate::error::CacheResult;
use crate::traits::TagCache;
use tracing::debug;

/// Build the adapter for the configured backend.
///
/// No connection is made; the adapter connects on first use.
///
/// Fails with [`CacheError::DriverNotSupported`] when the backend's client
/// was not compiled in.
///
/// [`CacheError::DriverNotSupported`]: crate::CacheError::DriverNotSupported
///
/// # Examples
///
/// ```
/// use tagstamp_cache::{CacheConfig, open};
///
/// let cache = open(CacheConfig::redis("localhost", 6379).with_namespace("prod")).unwrap();
/// assert_eq!(cache.namespace(), Some("prod"));
/// ```
pub fn open(config: CacheConfig) -> CacheResult<Box<dyn TagCache>> {
    debug!(backend = %config.backend, "Selecting cache driver");

    match config.backend {
        CacheBackend::Redis => open_redis(config),
        CacheBackend::Memcached => open_memcached(config),
    }
}

/// Build the adapter described by the `CACHE_*` environment variables.
pub fn open_from_env() -> CacheResult<Box<dyn TagCache>> {
    open(CacheConfig::from_env()?)
}

#[cfg(feature = "redis")]
fn open_redis(config: CacheConfig) -> CacheResult<Box<dyn TagCache>> {
    Ok(Box::new(crate::redis_cache::RedisCache::new(config)))
}

#[cfg(not(feature = "redis"))]
fn open_redis(config: CacheConfig) -> CacheResult<Box<dyn TagCache>> {
    Err(crate::error::CacheError::DriverNotSupported(format!(
        "{} (enable the `redis` feature)",
        config.backend
    )))
}

#[cfg(feature = "memcached")]
fn open_memcached(config: CacheConfig) -> CacheResult<Box<dyn TagCache>> {
    Ok(Box::new(crate::memcached_cache::MemcachedCache::new(config)))
}

#[cfg(not(feature = "memcached"))]
fn open_memcached(config: CacheConfig) -> CacheResult<Box<dyn TagCache>> {
    Err(crate::error::CacheError::DriverNotSupported(format!(
        "{} (enable the `memcached` feature)",
        config.backend
    )))
}
