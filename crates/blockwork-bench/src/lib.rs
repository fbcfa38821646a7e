//! Benchmark profiles for Blockwork.
//!
//! - [`smoothing_profile`]: 256x256 domain, 32x32 cells, one-element halo,
//!   box-filter kernel over a coordinate-sum input
//! - [`identity_profile`]: the same grid with a kernel that only crops its
//!   input, isolating copy and scheduling overhead from script cost

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::Arc;

use blockwork_cache::{Extended, FnSource, OutOfBounds};
use blockwork_core::{CellGrid, ConfigError, ElementKind, Halo, Scalar};
use blockwork_engine::{CacheLoader, CopyInput, WorkerPool};

/// Domain extents used by every profile.
pub const DOMAIN: [usize; 2] = [256, 256];

/// Cell extents used by every profile.
pub const CELL: [usize; 2] = [32, 32];

/// Three-by-three box filter written against the halo-extended input.
pub const BOX_FILTER: &str = "\
x = block.inputs[0]
h = block.halo
acc = x[h]
acc = acc + x[0:-2, 1:-1] + x[2:, 1:-1] + x[1:-1, 0:-2] + x[1:-1, 2:]
block.data[...] = acc / 5";

/// Crop the halo and copy the rest through.
pub const IDENTITY: &str = "block.data[...] = block.inputs[0][block.halo]";

fn input() -> Result<CopyInput, ConfigError> {
    let source = FnSource::new(2, ElementKind::F32, |p: &[i64]| {
        Ok(Scalar::Float((p[0] * 3 + p[1]) as f64))
    });
    let domain = blockwork_core::Interval::zero_based(&DOMAIN)?;
    let bounded = source.with_domain(domain)?;
    Ok(CopyInput::new(Extended::new(bounded, OutOfBounds::Border)?))
}

fn profile(pool: Arc<WorkerPool>, code: &str) -> Result<CacheLoader, ConfigError> {
    CacheLoader::builder(CellGrid::new(&DOMAIN, &CELL)?, pool, code)
        .element_kind(ElementKind::F32)
        .halo(Halo::symmetric(&[1, 1]))
        .input(input()?)
        .build()
}

/// Box-filter loader over the benchmark domain.
pub fn smoothing_profile(pool: Arc<WorkerPool>) -> Result<CacheLoader, ConfigError> {
    profile(pool, BOX_FILTER)
}

/// Crop-only loader over the benchmark domain.
pub fn identity_profile(pool: Arc<WorkerPool>) -> Result<CacheLoader, ConfigError> {
    profile(pool, IDENTITY)
}
