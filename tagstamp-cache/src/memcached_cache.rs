//! Memcached tag cache.
//!
//! Memcached has no multi-set, so tag records are written one at a time and
//! a failure part way through leaves the earlier tags written. Deleting a
//! missing key is not an error.

use crate::config::CacheConfig;
use crate::entry::CacheEntry;
use crate::error::CacheResult;
use crate::session::Session;
use crate::tag::TagRecord;
use crate::traits::{Connector, StoreConnection, TagCache};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

#[cfg(feature = "memcached")]
pub use self::client::{MemcachedConnection, MemcachedConnector};

/// Memcached-backed [`TagCache`].
pub struct MemcachedCache<C: Connector> {
    session: Session<C>,
}

#[cfg(feature = "memcached")]
impl MemcachedCache<MemcachedConnector> {
    /// Create a Memcached cache for `config`. No connection is made yet.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tagstamp_cache::*;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), CacheError> {
    ///     let config = CacheConfig::memcached("localhost", 11211);
    ///     let cache = MemcachedCache::new(config);
    ///     cache.connect().await?;
    ///     Ok(())
    /// }
    /// ```
    pub fn new(config: CacheConfig) -> Self {
        Self::with_connector(config, MemcachedConnector)
    }
}

impl<C: Connector> MemcachedCache<C> {
    /// Create a Memcached cache that opens its connection through `connector`.
    pub fn with_connector(config: CacheConfig, connector: C) -> Self {
        Self {
            session: Session::new(config, connector),
        }
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        self.session.config()
    }

    /// Get the connector.
    pub fn connector(&self) -> &C {
        self.session.connector()
    }

    /// Whether a connection has been established.
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }
}

#[async_trait]
impl<C: Connector + 'static> TagCache for MemcachedCache<C> {
    async fn connect(&self) -> CacheResult<&dyn StoreConnection> {
        let connection: &dyn StoreConnection = self.session.connection().await?;
        Ok(connection)
    }

    fn select_namespace(&mut self, namespace: Option<&str>) {
        self.session.select_namespace(namespace);
    }

    fn namespace(&self) -> Option<&str> {
        self.session.namespace()
    }

    async fn get(&self, key: &str) -> CacheResult<CacheEntry> {
        self.session.get(key).await
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.session.exists(key).await
    }

    async fn set(&self, key: &str, entry: &CacheEntry, ttl: Option<Duration>) -> CacheResult<()> {
        self.session.set(key, entry, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.session.delete(key).await?;
        Ok(())
    }

    async fn init_tags(&self, tags: &[TagRecord]) -> CacheResult<()> {
        let payloads = self.session.tag_payloads(tags)?;
        if payloads.is_empty() {
            return Ok(());
        }

        let count = payloads.len();
        let connection = self.session.connection().await?;
        for (written, (key, payload)) in payloads.into_iter().enumerate() {
            if let Err(e) = connection.set(&key, payload, None).await {
                warn!(key = %key, written, "Tag write failed, earlier tags stay written");
                return Err(e.during("init_tags"));
            }
        }

        debug!(written = count, "Wrote tag records");
        Ok(())
    }

    async fn get_tags_data(&self, tags: &[&str]) -> CacheResult<HashMap<String, TagRecord>> {
        self.session.get_tags_data(tags).await
    }
}

#[cfg(feature = "memcached")]
mod client {
    use crate::config::CacheConfig;
    use crate::error::{CacheError, CacheResult};
    use crate::traits::{Connector, StoreConnection, text_value};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Mutex;

    /// Longest relative expiration Memcached accepts; larger values are read
    /// as absolute unix times.
    const MAX_RELATIVE_EXPIRATION: u64 = 60 * 60 * 24 * 30;

    /// Opens connections to a Memcached server.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct MemcachedConnector;

    #[async_trait]
    impl Connector for MemcachedConnector {
        type Connection = MemcachedConnection;

        async fn connect(&self, config: &CacheConfig) -> CacheResult<MemcachedConnection> {
            let url = config.connection_url()?;
            let target = url.clone();

            // The memcache client is blocking, so connect off the runtime.
            let client = tokio::task::spawn_blocking(move || {
                let client = memcache::connect(target.as_str())?;
                client.version()?;
                Ok::<_, memcache::MemcacheError>(client)
            })
            .await
            .map_err(|e| CacheError::Connection(format!("Failed to spawn task: {}", e)))?
            .map_err(|e| CacheError::Connection(format!("Could not connect to {}: {}", url, e)))?;

            Ok(MemcachedConnection {
                client: Arc::new(Mutex::new(client)),
            })
        }
    }

    /// Live Memcached connection.
    ///
    /// The `memcache` crate has no async support, so every call runs under
    /// `spawn_blocking` with the client behind a tokio mutex.
    #[derive(Clone)]
    pub struct MemcachedConnection {
        client: Arc<Mutex<memcache::Client>>,
    }

    impl MemcachedConnection {
        async fn run<T, F>(&self, op: F) -> CacheResult<T>
        where
            T: Send + 'static,
            F: FnOnce(&memcache::Client) -> Result<T, memcache::MemcacheError> + Send + 'static,
        {
            let client = self.client.clone();
            tokio::task::spawn_blocking(move || {
                let client = client.blocking_lock();
                op(&client)
            })
            .await
            .map_err(|e| CacheError::Backend(format!("Task join error: {}", e)))?
            .map_err(CacheError::from)
        }
    }

    /// Convert a TTL to a Memcached expiration (0 = never).
    pub(super) fn expiration(ttl: Option<Duration>) -> u32 {
        let Some(ttl) = ttl else {
            return 0;
        };

        let secs = ttl.as_secs().max(1);
        let secs = if secs > MAX_RELATIVE_EXPIRATION {
            let now = chrono::Utc::now().timestamp().max(0) as u64;
            now.saturating_add(secs)
        } else {
            secs
        };
        u32::try_from(secs).unwrap_or(u32::MAX)
    }

    #[async_trait]
    impl StoreConnection for MemcachedConnection {
        async fn get(&self, key: &str) -> CacheResult<Option<String>> {
            let key = key.to_string();
            let value = self.run(move |client| client.get::<Vec<u8>>(&key)).await?;
            Ok(text_value(value))
        }

        async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()> {
            let key = key.to_string();
            let expiration = expiration(ttl);
            self.run(move |client| client.set(&key, value.as_str(), expiration))
                .await
        }

        async fn delete(&self, key: &str) -> CacheResult<u64> {
            let key = key.to_string();
            let removed = self.run(move |client| client.delete(&key)).await?;
            Ok(u64::from(removed))
        }

        async fn exists(&self, key: &str) -> CacheResult<bool> {
            Ok(self.get(key).await?.is_some())
        }

        async fn flush(&self) -> CacheResult<()> {
            self.run(|client| client.flush()).await
        }

        async fn ping(&self) -> CacheResult<()> {
            self.run(|client| client.version().map(|_| ())).await
        }

        /// Single multi-key `gets`.
        async fn get_many(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>> {
            if keys.is_empty() {
                return Ok(Vec::new());
            }

            let owned = keys.to_vec();
            let mut found: HashMap<String, Vec<u8>> = self
                .run(move |client| {
                    let refs: Vec<&str> = owned.iter().map(String::as_str).collect();
                    client.gets::<Vec<u8>>(&refs)
                })
                .await?;

            Ok(keys.iter().map(|key| text_value(found.remove(key))).collect())
        }
    }
}
