//! Integration tests for tagstamp-cache

use serde_json::{Value, json};
use std::sync::Arc;
use tagstamp_cache::*;

fn redis_cache(namespace: &str) -> RedisCache<MemoryConnector> {
    RedisCache::with_connector(
        CacheConfig::redis("localhost", 6379).with_namespace(namespace),
        MemoryConnector::default(),
    )
}

fn memcached_cache(namespace: &str) -> MemcachedCache<MemoryConnector> {
    MemcachedCache::with_connector(
        CacheConfig::memcached("localhost", 11211).with_namespace(namespace),
        MemoryConnector::default(),
    )
}

#[derive(Debug)]
struct OrderRows(Vec<(i64, &'static str)>);

impl ArrayView for OrderRows {
    fn to_array(&self) -> CacheResult<Value> {
        Ok(self
            .0
            .iter()
            .map(|(id, status)| json!({"id": id, "status": status}))
            .collect())
    }
}

/// Stamp a tag, cache against it, re-stamp, and observe the stale entry.
async fn run_invalidation_scenario(cache: &dyn TagCache) {
    let first = TagRecord::new("orders").with_time(100).with_range(1, 50);
    cache.init_tags(&[first]).await.unwrap();

    let tags = cache.get_tags_data(&["orders"]).await.unwrap();
    let stamp = &tags["orders"];
    assert_eq!((stamp.time, stamp.min_id, stamp.max_id), (100, 1, 50));

    let rows = OrderRows(vec![(1, "open"), (2, "shipped")]);
    let entry = CacheEntry::new(Payload::view(rows)).stamped_by(stamp);
    cache.set("report1", &entry, None).await.unwrap();

    let second = TagRecord::new("orders").with_time(200).with_range(1, 80);
    cache.init_tags(&[second]).await.unwrap();

    let cached = cache.get("report1").await.unwrap();
    let current = cache.get_tags_data(&["orders"]).await.unwrap();

    assert_eq!(cached.time, 100);
    assert_eq!(cached.id_tag, "orders");
    assert_eq!(
        cached.data,
        Some(Payload::structured(json!([
            {"id": 1, "status": "open"},
            {"id": 2, "status": "shipped"}
        ])))
    );
    assert_eq!(current["orders"].time, 200);
    assert_eq!(current["orders"].max_id, 80);
    assert!(current["orders"].time > cached.time);
}

#[tokio::test]
async fn test_invalidation_scenario_redis() {
    run_invalidation_scenario(&redis_cache("A")).await;
}

#[tokio::test]
async fn test_invalidation_scenario_memcached() {
    run_invalidation_scenario(&memcached_cache("A")).await;
}

#[tokio::test]
async fn test_unwritten_key_returns_default_entry() {
    let cache = redis_cache("A");
    let entry = cache.get("never-written").await.unwrap();

    assert!(entry.is_empty());
    assert_eq!(entry, CacheEntry::default());
    assert!(!cache.exists("never-written").await.unwrap());
}

#[tokio::test]
async fn test_namespaces_do_not_collide() {
    let connector = MemoryConnector::default();
    let config = CacheConfig::redis("localhost", 6379);
    let mut cache = RedisCache::with_connector(config, connector.clone());

    cache.select_namespace(Some("A"));
    cache.set("report1", &CacheEntry::new("from A"), None).await.unwrap();

    cache.select_namespace(Some("B"));
    cache.set("report1", &CacheEntry::new("from B"), None).await.unwrap();

    assert_eq!(
        cache.get("report1").await.unwrap().data,
        Some(Payload::from("from B"))
    );

    cache.select_namespace(Some("A"));
    assert_eq!(
        cache.get("report1").await.unwrap().data,
        Some(Payload::from("from A"))
    );

    assert_eq!(connector.store().keys().await, vec!["report1:A", "report1:B"]);
}

#[tokio::test]
async fn test_adapters_share_a_store() {
    let connector = MemoryConnector::default();
    let redis = RedisCache::with_connector(
        CacheConfig::redis("localhost", 6379),
        connector.clone(),
    );
    let memcached = MemcachedCache::with_connector(
        CacheConfig::memcached("localhost", 11211),
        connector.clone(),
    );

    redis
        .init_tags(&[TagRecord::new("users").with_time(42)])
        .await
        .unwrap();

    let tags = memcached.get_tags_data(&["users"]).await.unwrap();
    assert_eq!(tags["users"].time, 42);
    assert_eq!(
        connector.store().raw("users:").await.unwrap(),
        r#"{"max_id":0,"min_id":0,"time":42}"#
    );
}

#[tokio::test]
async fn test_delete_asymmetry() {
    let redis = redis_cache("A");
    let memcached = memcached_cache("A");

    let err = redis.delete("missing").await.unwrap_err();
    assert!(err.is_operation_error());
    assert_eq!(err.failed_operation(), Some("delete"));

    memcached.delete("missing").await.unwrap();
}

#[tokio::test]
async fn test_get_tags_data_skips_unusable_values() {
    let cache = redis_cache("A");
    let store = cache.connector().store().clone();
    store.put_raw("garbage:A", "not json").await;
    store.put_raw("empty:A", "{}").await;
    store.put_raw("null:A", "null").await;
    store.put_raw("orders:A", r#"{"time":7}"#).await;

    let tags = cache
        .get_tags_data(&["garbage", "empty", "null", "orders", "missing"])
        .await
        .unwrap();

    assert_eq!(tags.len(), 1);
    assert_eq!(tags["orders"].name, "orders");
    assert_eq!(tags["orders"].time, 7);
    assert_eq!(tags["orders"].max_id, 0);
}

#[tokio::test]
async fn test_unserializable_entry_writes_nothing() {
    let cache = redis_cache("A");
    let entry = CacheEntry::new(Payload::structured(json!(12)));

    let err = cache.set("bad", &entry, None).await.unwrap_err();
    assert!(matches!(err, CacheError::Serialization(_)));
    assert!(cache.connector().store().keys().await.is_empty());
}

#[tokio::test]
async fn test_connect_is_idempotent() {
    let cache = memcached_cache("A");

    for _ in 0..3 {
        cache.connect().await.unwrap().ping().await.unwrap();
    }
    cache.get("report1").await.unwrap();

    assert_eq!(cache.connector().connect_count(), 1);
}

#[tokio::test]
async fn test_missing_host_is_a_connection_error() {
    let config = CacheConfig::new(CacheBackend::Redis);
    assert!(config.connection_url().unwrap_err().is_connection_error());

    let cache = RedisCache::with_connector(config, MemoryConnector::unavailable());
    let err = cache.init_tags(&[TagRecord::new("orders")]).await.unwrap_err();
    assert!(err.is_connection_error());
}

#[tokio::test]
async fn test_concurrent_reads_share_one_connection() {
    let cache = Arc::new(redis_cache("A"));
    cache
        .set("report1", &CacheEntry::new("x"), None)
        .await
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get("report1").await.unwrap() })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().data, Some(Payload::from("x")));
    }
    assert_eq!(cache.connector().connect_count(), 1);
}

#[cfg(feature = "redis")]
#[tokio::test]
async fn test_open_uses_env_style_config() {
    let config = CacheConfig::from_vars(|name| match name {
        "CACHE_DRIVER" => Some("redis".to_string()),
        "CACHE_HOST_OR_SOCKET" => Some("/var/run/redis.sock".to_string()),
        "CACHE_DATABASE" => Some("7".to_string()),
        _ => None,
    })
    .unwrap();

    assert_eq!(
        config.endpoint().unwrap(),
        Endpoint::Socket("/var/run/redis.sock".into())
    );

    let cache = open(config).unwrap();
    assert_eq!(cache.namespace(), Some("7"));
}

// Note: These tests would require Redis/Memcached running
// They are disabled by default but can be run with: cargo test -- --ignored

#[cfg(feature = "redis")]
#[tokio::test]
#[ignore]
async fn test_redis_live_round_trip() {
    let config = CacheConfig::redis("localhost", 6379).with_namespace("tagstamp-test");
    let cache = RedisCache::new(config);

    run_invalidation_scenario(&cache).await;
    cache.delete("report1").await.unwrap();
    assert!(cache.delete("report1").await.is_err());
}

#[cfg(feature = "redis")]
#[tokio::test]
#[ignore]
async fn test_redis_live_refused() {
    let cache = RedisCache::new(CacheConfig::redis("localhost", 1));
    let err = cache.connect().await.err().unwrap();
    assert!(err.is_connection_error());
}

#[cfg(feature = "memcached")]
#[tokio::test]
#[ignore]
async fn test_memcached_live_round_trip() {
    let cache = MemcachedCache::new(
        CacheConfig::memcached("localhost", 11211).with_namespace("tagstamp-test"),
    );

    run_invalidation_scenario(&cache).await;
    cache.delete("report1").await.unwrap();
    cache.delete("report1").await.unwrap();
}
