//! Store primitives and the tag-cache contract.

use crate::config::CacheConfig;
use crate::entry::CacheEntry;
use crate::error::CacheResult;
use crate::tag::TagRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Raw key/value primitives offered by a live backend connection.
///
/// Keys passed here are already namespaced. Implementations report failures
/// through [`CacheResult`]; the adapters decide which outcomes are errors.
#[async_trait]
pub trait StoreConnection: Send + Sync {
    /// Get the raw value stored under `key`.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store `value` under `key`, expiring after `ttl` when given.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()>;

    /// Delete `key`, returning how many keys were removed.
    async fn delete(&self, key: &str) -> CacheResult<u64>;

    /// Check if a key exists.
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Remove every key in the store.
    ///
    /// **Warning:** this affects all namespaces sharing the store.
    async fn flush(&self) -> CacheResult<()>;

    /// Connectivity probe.
    async fn ping(&self) -> CacheResult<()>;

    /// Get multiple keys, in input order.
    ///
    /// The default issues the gets concurrently; backends with a native
    /// multi-get override it.
    async fn get_many(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>> {
        use futures::future::try_join_all;

        let futures = keys.iter().map(|key| self.get(key));
        try_join_all(futures).await
    }

    /// Store multiple key-value pairs without expiry.
    ///
    /// The default issues the sets concurrently; backends with a native
    /// atomic multi-set override it.
    async fn set_many(&self, items: &[(String, String)]) -> CacheResult<()> {
        use futures::future::try_join_all;

        let futures = items
            .iter()
            .map(|(key, value)| self.set(key, value.clone(), None));

        try_join_all(futures).await?;
        Ok(())
    }
}

/// Opens connections for an adapter.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connection type produced by this connector.
    type Connection: StoreConnection + 'static;

    /// Open a connection described by `config`.
    ///
    /// Fails with [`CacheError::Connection`](crate::CacheError::Connection)
    /// when parameters are missing or the store refuses the connection.
    async fn connect(&self, config: &CacheConfig) -> CacheResult<Self::Connection>;
}

/// Tag-versioned cache contract shared by the Redis and Memcached adapters.
#[async_trait]
pub trait TagCache: Send + Sync {
    /// Return the live connection, establishing it on first use.
    ///
    /// Repeated calls return the same connection. A failed attempt leaves the
    /// adapter unconnected so a later call may try again.
    async fn connect(&self) -> CacheResult<&dyn StoreConnection>;

    /// Select the namespace postfix used for all subsequent keys.
    fn select_namespace(&mut self, namespace: Option<&str>);

    /// Currently selected namespace postfix.
    fn namespace(&self) -> Option<&str>;

    /// Fetch the entry stored under `key`.
    ///
    /// Missing or undecodable values yield [`CacheEntry::default`].
    async fn get(&self, key: &str) -> CacheResult<CacheEntry>;

    /// Check if an entry is stored under `key`.
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Serialize and store `entry` under `key`.
    ///
    /// `ttl` falls back to the configured default; without either the entry
    /// does not expire.
    async fn set(&self, key: &str, entry: &CacheEntry, ttl: Option<Duration>) -> CacheResult<()>;

    /// Delete the entry stored under `key`.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Write the given tag records. Malformed records are skipped.
    async fn init_tags(&self, tags: &[TagRecord]) -> CacheResult<()>;

    /// Read the current records of the named tags.
    ///
    /// Tags without a stored stamp are absent from the result.
    async fn get_tags_data(&self, tags: &[&str]) -> CacheResult<HashMap<String, TagRecord>>;
}

/// Build the store key for `key` in `namespace`.
///
/// The separator is always present, even without a namespace.
///
/// # Examples
///
/// ```
/// use tagstamp_cache::namespaced_key;
///
/// assert_eq!(namespaced_key("orders", Some("prod")), "orders:prod");
/// assert_eq!(namespaced_key("orders", None), "orders:");
/// ```
pub fn namespaced_key(key: &str, namespace: Option<&str>) -> String {
    format!("{}:{}", key, namespace.unwrap_or_default())
}

/// Stored bytes as text; a value that is not UTF-8 reads as absent.
#[cfg_attr(not(any(feature = "redis", feature = "memcached")), allow(dead_code))]
pub(crate) fn text_value(bytes: Option<Vec<u8>>) -> Option<String> {
    bytes.and_then(|bytes| String::from_utf8(bytes).ok())
}

/// Decode the results of a tag multi-get.
///
/// `names` and `values` are parallel; tags without a usable stamp are
/// skipped.
pub(crate) fn decode_tags(names: &[&str], values: Vec<Option<String>>) -> HashMap<String, TagRecord> {
    names
        .iter()
        .zip(values)
        .filter_map(|(name, value)| {
            let value = value?;
            TagRecord::from_json(*name, &value).map(|record| (name.to_string(), record))
        })
        .collect()
}
