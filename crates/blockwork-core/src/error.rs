//! Error types for Blockwork, organized by subsystem.
//!
//! - [`ConfigError`]: synchronous, raised while building grids, halos,
//!   loaders, and pools. Never raised at fetch time.
//! - [`DataError`]: a source could not supply an element or region.
//! - [`EngineError`]: raised by an execution context.
//! - [`TaskError`]: the outcome of one task submitted to a worker pool.
//! - [`LoadError`]: returned by cell loading when a failure is propagated
//!   to the caller.

use std::time::Duration;

use thiserror::Error;

use crate::kind::{ElementKind, Primitive};

/// Invalid construction-time configuration.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Grid dimensions or cell shape are empty, zero, or of different rank.
    #[error("invalid grid: {reason}")]
    InvalidGrid {
        /// Description of the violated constraint.
        reason: String,
    },
    /// Interval bounds are empty, inverted, or of different rank.
    #[error("invalid interval: {reason}")]
    InvalidInterval {
        /// Description of the violated constraint.
        reason: String,
    },
    /// Two pieces of geometry disagree on dimensionality.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensionality required by the receiver.
        expected: usize,
        /// Dimensionality that was supplied.
        actual: usize,
    },
    /// An element kind name that maps to no supported kind.
    #[error("unsupported element kind '{name}'")]
    UnsupportedElementKind {
        /// The rejected name.
        name: String,
    },
    /// A storage primitive that cannot hold the element kind.
    #[error("element kind {kind} cannot be stored as {storage}")]
    StorageMismatch {
        /// The requested element kind.
        kind: ElementKind,
        /// The storage primitive that was paired with it.
        storage: Primitive,
    },
    /// The execution engine cannot bind buffers of this element kind.
    #[error("engine '{engine}' cannot bind {kind} buffers")]
    UnbindableKind {
        /// The element kind.
        kind: ElementKind,
        /// Name of the engine.
        engine: String,
    },
    /// An explicit worker count of zero.
    #[error("worker pool needs at least one worker")]
    ZeroWorkers,
    /// A zero idle poll interval.
    #[error("poll interval must be non-zero")]
    InvalidPollInterval,
    /// Cache capacity of zero cells.
    #[error("cache capacity must be at least one cell")]
    ZeroCacheCapacity,
    /// A worker thread could not be spawned.
    #[error("failed to spawn thread: {reason}")]
    ThreadSpawnFailed {
        /// Description from the OS.
        reason: String,
    },
}

/// A source could not supply data.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DataError {
    /// A position outside the source's domain, under a policy that fails.
    #[error("position {position:?} is out of bounds")]
    OutOfBounds {
        /// The requested position.
        position: Vec<i64>,
    },
    /// The source could not produce data for another reason.
    #[error("data unavailable: {reason}")]
    Unavailable {
        /// Description of the failure.
        reason: String,
    },
    /// A position or interval of the wrong rank.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Rank of the source.
        expected: usize,
        /// Rank of the request.
        actual: usize,
    },
    /// A cell index past the end of the grid.
    #[error("cell index {index} out of range for grid with {count} cells")]
    CellIndexOutOfRange {
        /// The requested index.
        index: u64,
        /// Number of cells in the grid.
        count: u64,
    },
}

/// Failure raised by an execution context.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The code fragment did not parse.
    #[error("line {line}, col {col}: {message}")]
    Parse {
        /// 1-based line.
        line: usize,
        /// 1-based column.
        col: usize,
        /// Description of the syntax error.
        message: String,
    },
    /// The code fragment raised during evaluation.
    #[error("{kind}: {message}")]
    Runtime {
        /// Short error class, e.g. `ZeroDivisionError` or `NameError`.
        kind: String,
        /// Human-readable detail.
        message: String,
    },
    /// A host value could not be bound into the context.
    #[error("cannot bind '{name}': {reason}")]
    Bind {
        /// Name the value was to be bound to.
        name: String,
        /// Description of the failure.
        reason: String,
    },
    /// The engine could not create a fresh context.
    #[error("context creation failed: {reason}")]
    Context {
        /// Description of the failure.
        reason: String,
    },
}

impl EngineError {
    /// Shorthand for a [`EngineError::Runtime`] error.
    pub fn runtime(kind: &str, message: impl Into<String>) -> Self {
        Self::Runtime {
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    /// The error class of a runtime error, if this is one.
    pub fn runtime_kind(&self) -> Option<&str> {
        match self {
            Self::Runtime { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

/// Outcome of a task that did not complete successfully.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The execution context raised while running the task.
    #[error("execution failed: {0}")]
    Execution(#[from] EngineError),
    /// An input source could not supply the task's data.
    #[error(transparent)]
    DataUnavailable(#[from] DataError),
    /// The pool shut down before the task ran.
    #[error("worker pool is shut down")]
    PoolShutDown,
    /// The caller stopped waiting; the task itself keeps running.
    #[error("no result after {after:?}")]
    Timeout {
        /// How long the caller waited.
        after: Duration,
    },
    /// The task panicked inside the worker.
    #[error("task panicked: {message}")]
    Panicked {
        /// Panic payload, if it was a string.
        message: String,
    },
    /// The worker dropped the task without reporting an outcome.
    #[error("task was dropped without a result")]
    Disconnected,
}

/// Cell loading failed and the failure was handed to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The request itself was invalid (e.g. an index past the grid).
    #[error(transparent)]
    Data(#[from] DataError),
    /// The task computing the cell failed.
    #[error("cell {index} failed: {source}")]
    Task {
        /// Cell index.
        index: u64,
        /// The task's failure.
        #[source]
        source: TaskError,
    },
}
