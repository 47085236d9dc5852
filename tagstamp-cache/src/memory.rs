//! In-process store for tests and local development.
//!
//! A [`MemoryStore`] is shared by every connection a [`MemoryConnector`]
//! hands out, so several adapters can observe each other's writes the same
//! way they would on a real server.

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::traits::{Connector, StoreConnection};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|exp| exp > now)
    }
}

#[derive(Default)]
struct Inner {
    data: RwLock<HashMap<String, StoredValue>>,
    rejected: RwLock<HashSet<String>>,
}

/// Shared in-memory key/value store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every subsequent write to `key`, as a full or read-only server
    /// would.
    pub async fn fail_writes_to(&self, key: impl Into<String>) {
        self.inner.rejected.write().await.insert(key.into());
    }

    /// Accept writes to every key again.
    pub async fn accept_all_writes(&self) {
        self.inner.rejected.write().await.clear();
    }

    /// Raw value stored under a fully namespaced key.
    pub async fn raw(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.inner
            .data
            .read()
            .await
            .get(key)
            .filter(|stored| stored.is_live(now))
            .map(|stored| stored.value.clone())
    }

    /// Store a raw value under a fully namespaced key.
    pub async fn put_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        let stored = StoredValue {
            value: value.into(),
            expires_at: None,
        };
        self.inner.data.write().await.insert(key.into(), stored);
    }

    /// Live keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .inner
            .data
            .read()
            .await
            .iter()
            .filter(|(_, stored)| stored.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    async fn check_writable(&self, key: &str) -> CacheResult<()> {
        if self.inner.rejected.read().await.contains(key) {
            return Err(CacheError::Backend(format!("write rejected for key {}", key)));
        }
        Ok(())
    }
}

/// Connector handing out connections to one shared [`MemoryStore`].
#[derive(Clone)]
pub struct MemoryConnector {
    store: MemoryStore,
    available: bool,
    connects: Arc<AtomicUsize>,
}

impl MemoryConnector {
    /// Create a connector for `store`.
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            available: true,
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a connector whose store refuses every connection.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(MemoryStore::new())
        }
    }

    /// The shared store.
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Number of connections opened so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new(MemoryStore::new())
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Connection = MemoryConnection;

    async fn connect(&self, _config: &CacheConfig) -> CacheResult<MemoryConnection> {
        if !self.available {
            return Err(CacheError::Connection(
                "in-memory store refused the connection".to_string(),
            ));
        }

        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryConnection {
            store: self.store.clone(),
        })
    }
}

/// Connection to a [`MemoryStore`].
pub struct MemoryConnection {
    store: MemoryStore,
}

#[async_trait]
impl StoreConnection for MemoryConnection {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.store.raw(key).await)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()> {
        self.store.check_writable(key).await?;

        let stored = StoredValue {
            value,
            // Beyond the clock's range means never.
            expires_at: ttl.and_then(|d| Instant::now().checked_add(d)),
        };
        self.store
            .inner
            .data
            .write()
            .await
            .insert(key.to_string(), stored);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<u64> {
        let now = Instant::now();
        let removed = self.store.inner.data.write().await.remove(key);
        Ok(match removed {
            Some(stored) if stored.is_live(now) => 1,
            _ => 0,
        })
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.store.raw(key).await.is_some())
    }

    async fn flush(&self) -> CacheResult<()> {
        self.store.inner.data.write().await.clear();
        Ok(())
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }

    /// All-or-nothing: a single rejected key fails the whole write.
    async fn set_many(&self, items: &[(String, String)]) -> CacheResult<()> {
        for (key, _) in items {
            self.store.check_writable(key).await?;
        }

        let mut data = self.store.inner.data.write().await;
        for (key, value) in items {
            data.insert(
                key.clone(),
                StoredValue {
                    value: value.clone(),
                    expires_at: None,
                },
            );
        }
        Ok(())
    }
}
