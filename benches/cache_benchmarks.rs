//! Cache benchmarks for tagstamp

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::json;
use std::hint::black_box;
use tagstamp::{CacheConfig, CacheEntry, MemoryConnector, Payload, RedisCache, TagCache, TagRecord};

fn sample_rows(count: usize) -> serde_json::Value {
    (0..count)
        .map(|id| json!({"id": id, "status": "shipped", "total": id * 3}))
        .collect()
}

fn entry_serialization_benchmark(c: &mut Criterion) {
    let tag = TagRecord::new("orders").with_time(100).with_range(1, 50);
    let mut group = c.benchmark_group("entry_serialization");

    for rows in [1, 100, 1000] {
        let entry = CacheEntry::new(Payload::structured(sample_rows(rows))).stamped_by(&tag);
        let json = entry.to_json().unwrap();

        group.throughput(Throughput::Bytes(json.len() as u64));
        group.bench_with_input(BenchmarkId::new("to_json", rows), &entry, |b, entry| {
            b.iter(|| black_box(entry.to_json().unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("from_json", rows), &json, |b, json| {
            b.iter(|| black_box(CacheEntry::from_json(json)));
        });
    }

    group.finish();
}

fn memory_adapter_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let cache = RedisCache::with_connector(
        CacheConfig::redis("localhost", 6379).with_namespace("bench"),
        MemoryConnector::default(),
    );
    let entry = CacheEntry::new(Payload::structured(sample_rows(10))).with_tags(["orders"]);

    rt.block_on(async {
        cache.set("existing_key", &entry, None).await.unwrap();
    });

    let mut group = c.benchmark_group("memory_adapter");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set", |b| {
        b.to_async(&rt).iter(|| async {
            cache.set("benchmark_key", &entry, None).await.unwrap();
        });
    });

    group.bench_function("get_hit", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(cache.get("existing_key").await.unwrap()) });
    });

    group.bench_function("get_miss", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(cache.get("nonexistent_key").await.unwrap()) });
    });

    group.finish();
}

fn tag_registry_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let cache = RedisCache::with_connector(
        CacheConfig::redis("localhost", 6379),
        MemoryConnector::default(),
    );

    let mut group = c.benchmark_group("tag_registry");

    for count in [1, 10, 100] {
        let names: Vec<String> = (0..count).map(|i| format!("tag{}", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let records: Vec<TagRecord> = names
            .iter()
            .map(|name| TagRecord::invalidate(name.as_str(), 1, 100))
            .collect();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("init_tags", count), &records, |b, records| {
            b.to_async(&rt)
                .iter(|| async { cache.init_tags(records).await.unwrap() });
        });
        group.bench_with_input(BenchmarkId::new("get_tags_data", count), &refs, |b, refs| {
            b.to_async(&rt)
                .iter(|| async { black_box(cache.get_tags_data(refs).await.unwrap()) });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    entry_serialization_benchmark,
    memory_adapter_benchmark,
    tag_registry_benchmark
);
criterion_main!(benches);
