//! Prefetch Engine Performance Benchmarks
//!
//! Cache hot paths and chunk processing throughput over synthetic records.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use memo_prefetch::{BoundedCache, Key, MemorySource, PrefetchEngine, RelationSpec};
use serde_json::{json, Value};
use std::sync::Arc;

fn generate_parents(count: i64) -> Vec<Value> {
    (1..=count)
        .map(|i| json!({"id": i, "name": format!("parent {}", i)}))
        .collect()
}

fn generate_chunk(size: i64, distinct_parents: i64) -> Vec<Value> {
    (0..size)
        .map(|i| json!({"id": 1000 + i, "parent_id": (i % distinct_parents) + 1}))
        .collect()
}

fn bench_cache_put_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("bounded_cache");

    group.bench_function("put_get_churn", |b| {
        b.iter(|| {
            let mut cache: BoundedCache<i64> = BoundedCache::new(1_000);
            for i in 0..10_000i64 {
                cache.put(Key::Integer(i % 2_000), i);
                black_box(cache.get(&Key::Integer((i / 2) % 2_000)));
            }
            black_box(cache.len())
        })
    });

    group.finish();
}

fn bench_process_chunk(c: &mut Criterion) {
    let mut group = c.benchmark_group("process_chunk");

    for &chunk_size in &[100i64, 1_000] {
        group.bench_with_input(
            BenchmarkId::new("single_valued", chunk_size),
            &chunk_size,
            |b, &chunk_size| {
                let parents = Arc::new(MemorySource::new(generate_parents(100)));
                let spec = RelationSpec::builder("parent", parents)
                    .with_path("parent")
                    .build()
                    .expect("valid spec");
                let mut engine = PrefetchEngine::new(vec![spec]).expect("valid engine");
                let chunk = generate_chunk(chunk_size, 100);

                b.iter(|| {
                    let mut records = chunk.clone();
                    engine.process_chunk(&mut records).expect("chunk processed");
                    black_box(records.len())
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_cache_put_get, bench_process_chunk);
criterion_main!(benches);
