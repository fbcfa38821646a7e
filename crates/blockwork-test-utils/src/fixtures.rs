//! Reusable sources, generators, and pools.
//!
//! - [`coordinate_sum_source`]: element at `p` is `p[0] + p[1] + ...`,
//!   bounded to a domain.
//! - [`CountingGenerator`]: wraps a generator and counts its calls.
//! - [`script_pool`]: a kernel-script pool with a fixed worker count.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use blockwork_cache::FnSource;
use blockwork_core::{DataError, ElementKind, Interval, Scalar};
use blockwork_engine::{DataView, InputGenerator, PoolConfig, WorkerPool};

/// Sum of the coordinates of `position`.
pub fn coordinate_sum(position: &[i64]) -> i64 {
    position.iter().sum()
}

/// A source over `[0, dims)` whose element at `p` is [`coordinate_sum`]`(p)`.
/// Reads outside the domain fail.
pub fn coordinate_sum_source(dims: &[usize], kind: ElementKind) -> FnSource {
    let domain = Interval::zero_based(dims).expect("fixture dims must be non-empty and non-zero");
    FnSource::new(dims.len(), kind, |p: &[i64]| Ok(Scalar::Int(coordinate_sum(p))))
        .with_domain(domain)
        .expect("domain rank matches")
}

/// Expected contents of `interval` copied from a coordinate-sum source,
/// dimension 0 fastest.
pub fn coordinate_sums(interval: &Interval) -> Vec<f64> {
    interval
        .positions()
        .map(|p| coordinate_sum(&p) as f64)
        .collect()
}

/// Counts how often the wrapped generator is asked for data.
pub struct CountingGenerator<G> {
    inner: G,
    calls: Arc<AtomicUsize>,
}

impl<G: InputGenerator> CountingGenerator<G> {
    pub fn new(inner: G) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

impl<G: InputGenerator> InputGenerator for CountingGenerator<G> {
    fn generate(&self, interval: &Interval) -> Result<DataView, DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.generate(interval)
    }
}

/// A kernel-script pool with `workers` workers and default settings.
pub fn script_pool(workers: usize) -> Arc<WorkerPool> {
    Arc::new(
        WorkerPool::script(PoolConfig::with_workers(workers)).expect("kernel-script pool starts"),
    )
}
