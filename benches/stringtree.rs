extern crate dexopt;

use std::{collections::BTreeMap, hint::black_box};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dexopt::utils::stringtree::{encode, lookup};

/// Class names shaped like a real table: a few packages with many siblings each.
fn table(size: usize) -> BTreeMap<String, i16> {
    (0..size)
        .map(|i| {
            let name = format!("com.example.feature{}.impl.Handler{}", i % 7, i);
            (name, i as i16 + 1)
        })
        .collect()
}

/// Benchmark building the encoded table for growing key counts
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("stringtree_encode");
    for size in [8, 64, 512] {
        let map = table(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &map, |b, map| {
            b.iter(|| black_box(encode(black_box(map)).unwrap()));
        });
    }
    group.finish();
}

/// Benchmark resolving every key, plus one miss, against an encoded table
fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("stringtree_lookup");
    for size in [8, 64, 512] {
        let map = table(size);
        let encoded = encode(&map).unwrap();
        group.throughput(Throughput::Elements(size as u64 + 1));
        group.bench_with_input(BenchmarkId::from_parameter(size), &encoded, |b, encoded| {
            b.iter(|| {
                for key in map.keys() {
                    black_box(lookup(black_box(encoded), key, 0));
                }
                black_box(lookup(black_box(encoded), "com.example.Missing", 0))
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_lookup);
criterion_main!(benches);
