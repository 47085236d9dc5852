//! Connection state and key handling shared by the adapters.

use crate::config::CacheConfig;
use crate::entry::CacheEntry;
use crate::error::CacheResult;
use crate::tag::TagRecord;
use crate::traits::{Connector, StoreConnection, decode_tags, namespaced_key};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// One lazily opened connection plus the namespace it writes under.
pub(crate) struct Session<C: Connector> {
    connector: C,
    connection: OnceCell<C::Connection>,
    config: CacheConfig,
    namespace: Option<String>,
}

impl<C: Connector> Session<C> {
    pub(crate) fn new(config: CacheConfig, connector: C) -> Self {
        Self {
            connector,
            connection: OnceCell::new(),
            namespace: config.namespace.clone(),
            config,
        }
    }

    pub(crate) fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub(crate) fn connector(&self) -> &C {
        &self.connector
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connection.initialized()
    }

    pub(crate) fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub(crate) fn select_namespace(&mut self, namespace: Option<&str>) {
        debug!(namespace = ?namespace, "Selecting cache namespace");
        self.namespace = namespace.map(str::to_string);
    }

    pub(crate) fn key(&self, key: &str) -> String {
        namespaced_key(key, self.namespace())
    }

    /// Connect on first use; later calls reuse the connection.
    pub(crate) async fn connection(&self) -> CacheResult<&C::Connection> {
        self.connection.get_or_try_init(|| self.open()).await
    }

    async fn open(&self) -> CacheResult<C::Connection> {
        let connection = self.connector.connect(&self.config).await?;
        info!(
            backend = %self.config.backend,
            host = ?self.config.host_or_socket,
            persistent = self.config.persistent,
            "Cache connection established"
        );
        Ok(connection)
    }

    pub(crate) async fn get(&self, key: &str) -> CacheResult<CacheEntry> {
        let key = self.key(key);
        let value = self
            .connection()
            .await?
            .get(&key)
            .await
            .map_err(|e| e.during("get"))?;

        debug!(key = %key, hit = value.is_some(), "Cache get");
        Ok(value.map(|json| CacheEntry::from_json(&json)).unwrap_or_default())
    }

    pub(crate) async fn exists(&self, key: &str) -> CacheResult<bool> {
        let key = self.key(key);
        self.connection()
            .await?
            .exists(&key)
            .await
            .map_err(|e| e.during("exists"))
    }

    pub(crate) async fn set(
        &self,
        key: &str,
        entry: &CacheEntry,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let json = entry.to_json()?;
        let key = self.key(key);
        let ttl = self.config.effective_ttl(ttl);

        self.connection()
            .await?
            .set(&key, json, ttl)
            .await
            .map_err(|e| e.during("set"))?;

        debug!(key = %key, ttl = ?ttl, "Cache set");
        Ok(())
    }

    /// Delete `key`, returning how many keys the store removed.
    pub(crate) async fn delete(&self, key: &str) -> CacheResult<u64> {
        let key = self.key(key);
        let removed = self
            .connection()
            .await?
            .delete(&key)
            .await
            .map_err(|e| e.during("delete"))?;

        debug!(key = %key, removed, "Cache delete");
        Ok(removed)
    }

    /// Namespaced key and payload for every well-formed record.
    pub(crate) fn tag_payloads(&self, tags: &[TagRecord]) -> CacheResult<Vec<(String, String)>> {
        let mut payloads = Vec::with_capacity(tags.len());
        for tag in tags {
            if !tag.is_well_formed() {
                warn!(tag = %tag.name, "Skipping malformed tag record");
                continue;
            }
            payloads.push((self.key(&tag.name), tag.to_json()?));
        }
        Ok(payloads)
    }

    pub(crate) async fn get_tags_data(
        &self,
        tags: &[&str],
    ) -> CacheResult<HashMap<String, TagRecord>> {
        if tags.is_empty() {
            return Ok(HashMap::new());
        }

        let keys: Vec<String> = tags.iter().map(|tag| self.key(tag)).collect();
        let values = self
            .connection()
            .await?
            .get_many(&keys)
            .await
            .map_err(|e| e.during("get_tags_data"))?;

        let records = decode_tags(tags, values);
        debug!(requested = tags.len(), found = records.len(), "Read tag stamps");
        Ok(records)
    }
}
