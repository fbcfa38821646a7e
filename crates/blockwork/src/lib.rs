//! Blockwork: compute an n-dimensional array cell by cell on a worker pool.
//!
//! The domain is split into a grid of fixed-shape cells. Each cell is
//! computed on demand by running a short kernel-script fragment on one of
//! the pool's workers, with the cell's output buffer and one input view per
//! generator (extended by an optional halo) bound as `block`. Computed cells
//! live in a bounded cache and can themselves feed downstream loaders
//! without copying.
//!
//! This is the facade crate that re-exports the public API of every
//! sub-crate.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use blockwork::prelude::*;
//!
//! let pool = Arc::new(WorkerPool::script(PoolConfig::with_workers(2))?);
//! let grid = CellGrid::new(&[8], &[4])?;
//! let ones = ConstantSource::new(1, ElementKind::F64, 1.0);
//!
//! // Each cell sums its four elements plus one halo element on each side.
//! let array = CacheLoader::builder(grid, pool, "block.data[...] = sum(block.inputs[0])")
//!     .halo(Halo::symmetric(&[1]))
//!     .input(CopyInput::new(ones))
//!     .build()?
//!     .into_array(2)?;
//! assert_eq!(array.to_f64_vec()?, vec![6.0; 8]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `blockwork-core` | Intervals, grids, halos, element kinds, buffers, errors, the engine seam |
//! | [`cache`] | `blockwork-cache` | Cells, the bounded cell cache, random-access sources, extension policies |
//! | [`script`] | `blockwork-script` | The kernel-script interpreter and its engine |
//! | [`engine`] | `blockwork-engine` | Worker pool, block assembly, input generators, the cache loader |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Geometry, element kinds, shared buffers, and errors (`blockwork-core`).
///
/// Also holds the [`types::Engine`] and [`types::ExecutionContext`] traits
/// for plugging in an execution engine other than kernel script.
pub use blockwork_core as types;

/// Cells, caching, and random-access sources (`blockwork-cache`).
pub use blockwork_cache as cache;

/// The kernel-script language (`blockwork-script`).
pub use blockwork_script as script;

/// Worker pool and cache loader (`blockwork-engine`).
///
/// [`engine::CacheLoader`] is the entry point; [`engine::WorkerPool`] runs
/// the work.
pub use blockwork_engine as engine;

/// Common imports for typical Blockwork usage.
///
/// ```rust
/// use blockwork::prelude::*;
/// ```
pub mod prelude {
    // Geometry and storage
    pub use blockwork_core::{CellGrid, ElementKind, Halo, Interval, Primitive, Scalar};

    // Errors
    pub use blockwork_core::{ConfigError, DataError, EngineError, LoadError, TaskError};

    // Sources and cells
    pub use blockwork_cache::{
        CachedCellArray, Cell, ConstantSource, DenseArray, Extended, FnSource, OutOfBounds,
        RandomAccess,
    };

    // Engine
    pub use blockwork_engine::{
        CacheLoader, CellInput, CopyInput, DataView, FailurePolicy, InputGenerator, PoolConfig,
        PoolError, WorkerPool,
    };
}
