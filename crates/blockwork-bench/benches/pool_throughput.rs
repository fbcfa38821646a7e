//! Criterion benchmarks for the worker pool and full-domain loads.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use blockwork_bench::{identity_profile, smoothing_profile};
use blockwork_test_utils::script_pool;

/// Benchmark: round-trip 1000 trivial jobs through a four-worker pool.
fn bench_submit_wait_1k(c: &mut Criterion) {
    let pool = script_pool(4);

    c.bench_function("submit_wait_1k", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..1000).map(|i| pool.submit(move |_| Ok(i))).collect();
            for handle in handles {
                black_box(handle.wait().unwrap());
            }
        });
    });
}

/// Benchmark: compute all 64 cells of the crop-only profile, uncached.
fn bench_identity_profile(c: &mut Criterion) {
    let loader = identity_profile(script_pool(4)).unwrap();

    c.bench_function("identity_profile_64_cells", |b| {
        b.iter(|| {
            for index in 0..64 {
                black_box(loader.load(index).unwrap());
            }
        });
    });
}

/// Benchmark: compute the box-filter profile through the cache from four
/// caller threads at once.
fn bench_smoothing_concurrent(c: &mut Criterion) {
    let pool = script_pool(4);

    c.bench_function("smoothing_profile_4_callers", |b| {
        b.iter(|| {
            let array = smoothing_profile(pool.clone())
                .unwrap()
                .into_array(64)
                .unwrap();
            std::thread::scope(|s| {
                for t in 0..4u64 {
                    let array = &array;
                    s.spawn(move || {
                        for step in 0..64u64 {
                            black_box(array.cell((step + t * 16) % 64).unwrap());
                        }
                    });
                }
            });
        });
    });
}

criterion_group!(
    benches,
    bench_submit_wait_1k,
    bench_identity_profile,
    bench_smoothing_concurrent
);
criterion_main!(benches);
