//! Core types and traits for the Blockwork cell loader.
//!
//! This is the leaf crate with no internal dependencies. It defines the
//! geometry every other crate speaks (intervals, cell grids, halos), the
//! element kinds cells are stored as, the shared byte storage that cells
//! and input views hand to workers, the execution-context seam between the
//! worker pool and an execution engine, and the error taxonomy.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod buffer;
pub mod context;
pub mod error;
pub mod grid;
pub mod halo;
pub mod interval;
pub mod kind;
pub mod scalar;

pub use buffer::SharedBuffer;
pub use context::{ArrayBinding, Binding, Engine, ExecutionContext};
pub use error::{ConfigError, DataError, EngineError, LoadError, TaskError};
pub use grid::CellGrid;
pub use halo::{CropSlice, Halo};
pub use interval::{Coords, Interval, Positions, Shape};
pub use kind::{ElementKind, Fraction, Primitive};
pub use scalar::Scalar;
