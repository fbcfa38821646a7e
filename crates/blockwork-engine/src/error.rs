//! Worker pool construction errors.

use thiserror::Error;

use blockwork_core::{ConfigError, EngineError};

/// The pool could not be brought up. No worker is left running.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PoolError {
    /// A worker failed to create its context or run the prelude or init
    /// script.
    #[error("worker {worker} failed to initialize: {source}")]
    InitFailed {
        /// Index of the first worker to report failure.
        worker: usize,
        /// The engine's error.
        #[source]
        source: EngineError,
    },
    /// The configuration was rejected before any thread started.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
