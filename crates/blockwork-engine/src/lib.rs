//! Worker pool, block assembly, and the cache loader.
//!
//! A [`CacheLoader`] turns one grid cell into a [`Block`]: the cell's
//! geometry, a fresh output buffer, and one input view per
//! [`InputGenerator`] over the halo-extended interval. The block is run on a
//! [`WorkerPool`] whose workers each own a persistent execution context,
//! and the output comes back as a [`Cell`](blockwork_cache::Cell).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod block;
pub mod config;
pub mod error;
pub mod input;
pub mod loader;
pub mod pool;
pub mod task;

pub use block::{Block, BLOCK_NAMES};
pub use config::{FailurePolicy, PoolConfig};
pub use error::PoolError;
pub use input::{copy_interval, CellInput, CopyInput, DataView, InputGenerator, Strategy};
pub use loader::{CacheLoader, CacheLoaderBuilder};
pub use pool::{ShutdownReport, WorkerPool, WorkerState};
pub use task::TaskHandle;
