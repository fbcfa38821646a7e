//! Cells, the bounded cell cache, and random-access sources.
//!
//! A [`CachedCellArray`] is a grid-partitioned array whose cells are
//! produced on demand by a [`CellLoader`] and kept in a bounded
//! [`CellCache`]. Any [`RandomAccess`] source (dense arrays, constants,
//! closures, cached cell arrays, and their out-of-bounds
//! [`Extended`] wrappers) can feed a loader's inputs.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod array;
pub mod cache;
pub mod cell;
pub mod extend;
pub mod source;

pub use array::{CachedCellArray, CellLoader};
pub use cache::{CacheStats, CellCache};
pub use cell::Cell;
pub use extend::{Extended, OutOfBounds};
pub use source::{ConstantSource, DenseArray, FnSource, RandomAccess};
