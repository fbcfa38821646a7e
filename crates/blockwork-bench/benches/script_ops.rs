//! Criterion micro-benchmarks for the kernel-script interpreter.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use blockwork_core::{Engine, ExecutionContext};
use blockwork_script::ScriptEngine;

/// Benchmark: parse and run a short scalar program (program cache warm).
fn bench_scalar_program(c: &mut Criterion) {
    let mut ctx = ScriptEngine::new().create_context().unwrap();
    let code = "a = 3\nb = a * 2 + 1\nc = b / a - 0.5";

    c.bench_function("scalar_program", |b| {
        b.iter(|| ctx.exec(black_box(code)).unwrap());
    });
}

/// Benchmark: elementwise arithmetic and a reduction over a 64x64 array.
fn bench_array_arithmetic_64x64(c: &mut Criterion) {
    let mut ctx = ScriptEngine::new().create_context().unwrap();
    ctx.exec("x = zeros([64, 64]) + 1.5").unwrap();

    c.bench_function("array_arithmetic_64x64", |b| {
        b.iter(|| ctx.exec("y = sum(x * 2 - x / 3, axis=0)").unwrap());
    });
}

criterion_group!(benches, bench_scalar_program, bench_array_arithmetic_64x64);
criterion_main!(benches);
