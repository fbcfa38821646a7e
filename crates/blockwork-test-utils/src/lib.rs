//! Test utilities and fixtures for Blockwork development.
//!
//! Provides coordinate-sum sources with known contents, a counting input
//! generator for at-most-once checks, a kernel-script pool constructor, and
//! a logging hook for tests that want to see `tracing` output.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{
    coordinate_sum, coordinate_sum_source, coordinate_sums, script_pool, CountingGenerator,
};

/// Install a `tracing` subscriber that writes through the test harness.
///
/// Honours `RUST_LOG`; defaults to `warn`. Safe to call from every test.
pub fn init_test_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    // A subscriber may already be installed by another test.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
