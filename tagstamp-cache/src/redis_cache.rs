//! Redis tag cache.
//!
//! Tag records are written with a single `MSET`, so a tag set is published
//! either completely or not at all. Deleting a key that is not there is
//! reported as a failed `delete`.

use crate::config::CacheConfig;
use crate::entry::CacheEntry;
use crate::error::{CacheError, CacheResult};
use crate::session::Session;
use crate::tag::TagRecord;
use crate::traits::{Connector, StoreConnection, TagCache};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

#[cfg(feature = "redis")]
pub use self::client::{RedisConnection, RedisConnector};

/// Redis-backed [`TagCache`].
///
/// The connection is opened on first use. Any [`Connector`] can stand in for
/// the real client, which is how the adapter runs against
/// [`MemoryConnector`](crate::MemoryConnector) in tests.
pub struct RedisCache<C: Connector> {
    session: Session<C>,
}

#[cfg(feature = "redis")]
impl RedisCache<RedisConnector> {
    /// Create a Redis cache for `config`. No connection is made yet.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tagstamp_cache::*;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), CacheError> {
    ///     let config = CacheConfig::redis("localhost", 6379).with_namespace("prod");
    ///     let cache = RedisCache::new(config);
    ///     cache.connect().await?;
    ///     Ok(())
    /// }
    /// ```
    pub fn new(config: CacheConfig) -> Self {
        Self::with_connector(config, RedisConnector)
    }
}

impl<C: Connector> RedisCache<C> {
    /// Create a Redis cache that opens its connection through `connector`.
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
impl<C: Connector + 'static> TagCache for RedisCache<C> {
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
        match self.session.delete(key).await? {
            0 => Err(CacheError::operation(
                "delete",
                format!("no key removed for {}", self.session.key(key)),
            )),
            _ => Ok(()),
        }
    }

    async fn init_tags(&self, tags: &[TagRecord]) -> CacheResult<()> {
        let payloads = self.session.tag_payloads(tags)?;
        if payloads.is_empty() {
            debug!(requested = tags.len(), "No tag records to write");
            return Ok(());
        }

        self.session
            .connection()
            .await?
            .set_many(&payloads)
            .await
            .map_err(|e| e.during("init_tags"))?;

        debug!(written = payloads.len(), "Wrote tag records");
        Ok(())
    }

    async fn get_tags_data(&self, tags: &[&str]) -> CacheResult<HashMap<String, TagRecord>> {
        self.session.get_tags_data(tags).await
    }
}

#[cfg(feature = "redis")]
mod client {
    use crate::config::CacheConfig;
    use crate::error::{CacheError, CacheResult};
    use crate::traits::{Connector, StoreConnection, text_value};
    use async_trait::async_trait;
    use redis::aio::{ConnectionManager, MultiplexedConnection};
    use redis::{Client, Cmd, RedisResult};
    use std::time::Duration;

    /// Opens connections to a Redis server.
    ///
    /// Persistent configurations get a reconnecting [`ConnectionManager`];
    /// transient ones a plain multiplexed connection.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct RedisConnector;

    #[async_trait]
    impl Connector for RedisConnector {
        type Connection = RedisConnection;

        async fn connect(&self, config: &CacheConfig) -> CacheResult<RedisConnection> {
            let url = config.connection_url()?;
            let client =
                Client::open(url.as_str()).map_err(|e| CacheError::Connection(e.to_string()))?;

            let persistent = config.persistent;
            let connecting = async move {
                if persistent {
                    ConnectionManager::new(client).await.map(Handle::Managed)
                } else {
                    client
                        .get_multiplexed_async_connection()
                        .await
                        .map(Handle::Direct)
                }
            };

            let result = match config.timeout {
                Some(timeout) => tokio::time::timeout(timeout, connecting)
                    .await
                    .map_err(|_| {
                        CacheError::Connection(format!(
                            "Timed out after {:?} connecting to {}",
                            timeout, url
                        ))
                    })?,
                None => connecting.await,
            };

            let handle = result.map_err(|e| {
                CacheError::Connection(format!("Could not connect to {}: {}", url, e))
            })?;

            Ok(RedisConnection { handle })
        }
    }

    #[derive(Clone)]
    enum Handle {
        Managed(ConnectionManager),
        Direct(MultiplexedConnection),
    }

    /// Live Redis connection.
    #[derive(Clone)]
    pub struct RedisConnection {
        handle: Handle,
    }

    impl RedisConnection {
        /// Whether the connection reconnects on its own.
        pub fn is_persistent(&self) -> bool {
            matches!(self.handle, Handle::Managed(_))
        }

        async fn query<T: redis::FromRedisValue>(&self, cmd: &Cmd) -> RedisResult<T> {
            match &self.handle {
                Handle::Managed(conn) => cmd.query_async(&mut conn.clone()).await,
                Handle::Direct(conn) => cmd.query_async(&mut conn.clone()).await,
            }
        }
    }

    #[async_trait]
    impl StoreConnection for RedisConnection {
        async fn get(&self, key: &str) -> CacheResult<Option<String>> {
            let mut cmd = redis::cmd("GET");
            cmd.arg(key);
            let value: Option<Vec<u8>> = self.query(&cmd).await?;
            Ok(text_value(value))
        }

        async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()> {
            let mut cmd = redis::cmd("SET");
            cmd.arg(key).arg(value);
            if let Some(ttl) = ttl {
                // EX rejects 0, so sub-second TTLs round up.
                cmd.arg("EX").arg(ttl.as_secs().max(1));
            }
            let _: () = self.query(&cmd).await?;
            Ok(())
        }

        async fn delete(&self, key: &str) -> CacheResult<u64> {
            let mut cmd = redis::cmd("DEL");
            cmd.arg(key);
            let removed: u64 = self.query(&cmd).await?;
            Ok(removed)
        }

        async fn exists(&self, key: &str) -> CacheResult<bool> {
            let mut cmd = redis::cmd("EXISTS");
            cmd.arg(key);
            let exists: bool = self.query(&cmd).await?;
            Ok(exists)
        }

        async fn flush(&self) -> CacheResult<()> {
            let _: () = self.query(&redis::cmd("FLUSHDB")).await?;
            Ok(())
        }

        async fn ping(&self) -> CacheResult<()> {
            let _: String = self.query(&redis::cmd("PING")).await?;
            Ok(())
        }

        async fn get_many(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>> {
            if keys.is_empty() {
                return Ok(Vec::new());
            }

            let mut cmd = redis::cmd("MGET");
            for key in keys {
                cmd.arg(key);
            }
            let values: Vec<Option<Vec<u8>>> = self.query(&cmd).await?;
            Ok(values.into_iter().map(text_value).collect())
        }

        /// Single atomic `MSET`.
        async fn set_many(&self, items: &[(String, String)]) -> CacheResult<()> {
            if items.is_empty() {
                return Ok(());
            }

            let mut cmd = redis::cmd("MSET");
            for (key, value) in items {
                cmd.arg(key).arg(value);
            }
            let _: () = self.query(&cmd).await?;
            Ok(())
        }
    }
}
