//! The cache loader: Grid → Block → Task → WorkerPool → Cell.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use blockwork_cache::{CachedCellArray, Cell, CellLoader};
use blockwork_core::{
    CellGrid, ConfigError, ElementKind, Halo, LoadError, Primitive, SharedBuffer, TaskError,
};

use crate::block::Block;
use crate::config::FailurePolicy;
use crate::input::InputGenerator;
use crate::pool::WorkerPool;

// ── CacheLoaderBuilder ─────────────────────────────────────────────

/// Builder for [`CacheLoader`]. All validation happens in
/// [`build`](Self::build).
pub struct CacheLoaderBuilder {
    grid: CellGrid,
    pool: Arc<WorkerPool>,
    code: String,
    kind: Result<ElementKind, ConfigError>,
    storage: Option<Primitive>,
    halo: Option<Halo>,
    inputs: Vec<Arc<dyn InputGenerator>>,
    policy: FailurePolicy,
}

impl CacheLoaderBuilder {
    /// Output element kind. Default: `f64`.
    pub fn element_kind(mut self, kind: ElementKind) -> Self {
        self.kind = Ok(kind);
        self
    }

    /// Output element kind by name (`"float32"`, `"int"`, `"bit"`, ...).
    /// Unknown names fail at [`build`](Self::build).
    pub fn element_kind_name(mut self, name: &str) -> Self {
        self.kind = name.parse();
        self
    }

    /// Require the output to be stored as `storage`.
    pub fn storage(mut self, storage: Primitive) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Halo applied to every input request. Default: empty.
    pub fn halo(mut self, halo: Halo) -> Self {
        self.halo = Some(halo);
        self
    }

    /// Append an input generator. Inputs are bound in the order added.
    pub fn input(mut self, generator: impl InputGenerator + 'static) -> Self {
        self.inputs.push(Arc::new(generator));
        self
    }

    /// Append an already shared input generator.
    pub fn shared_input(mut self, generator: Arc<dyn InputGenerator>) -> Self {
        self.inputs.push(generator);
        self
    }

    /// What to do when a cell's task fails. Default: [`FailurePolicy::MarkInvalid`].
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<CacheLoader, ConfigError> {
        let kind = self.kind?;
        if let Some(storage) = self.storage {
            kind.check_storage(storage)?;
        }
        let halo = self
            .halo
            .unwrap_or_else(|| Halo::empty(self.grid.num_dims()));
        if halo.num_dims() != self.grid.num_dims() {
            return Err(ConfigError::DimensionMismatch {
                expected: self.grid.num_dims(),
                actual: halo.num_dims(),
            });
        }
        let engine = self.pool.engine();
        if !engine.supports(kind) {
            return Err(ConfigError::UnbindableKind {
                kind,
                engine: engine.name().to_string(),
            });
        }
        Ok(CacheLoader {
            grid: self.grid,
            pool: self.pool,
            code: self.code,
            kind,
            halo,
            inputs: self.inputs,
            policy: self.policy,
        })
    }
}

// ── CacheLoader ────────────────────────────────────────────────────

/// Computes grid cells by running a code fragment on a [`WorkerPool`].
///
/// Each [`load`](Self::load) assembles the cell's [`Block`], submits it,
/// and blocks until the worker finishes. Loads are safe to call from many
/// threads at once; deduplicating concurrent loads of one cell is the
/// cache's job (see [`into_array`](Self::into_array)).
///
/// ```no_run
/// use std::sync::Arc;
/// use blockwork_core::{CellGrid, ElementKind};
/// use blockwork_engine::{CacheLoader, PoolConfig, WorkerPool};
///
/// let pool = Arc::new(WorkerPool::script(PoolConfig::default())?);
/// let grid = CellGrid::new(&[100, 100], &[10, 10])?;
/// let loader = CacheLoader::builder(grid, pool, "block.data[...] = block.index")
///     .element_kind(ElementKind::I32)
///     .build()?;
/// let cell = loader.load(7)?;
/// assert!(cell.is_valid());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct CacheLoader {
    grid: CellGrid,
    pool: Arc<WorkerPool>,
    code: String,
    kind: ElementKind,
    halo: Halo,
    inputs: Vec<Arc<dyn InputGenerator>>,
    policy: FailurePolicy,
}

impl CacheLoader {
    /// Start building a loader that runs `code` for every cell of `grid`.
    pub fn builder(grid: CellGrid, pool: Arc<WorkerPool>, code: impl Into<String>) -> CacheLoaderBuilder {
        CacheLoaderBuilder {
            grid,
            pool,
            code: code.into(),
            kind: Ok(ElementKind::F64),
            storage: None,
            halo: None,
            inputs: Vec::new(),
            policy: FailurePolicy::default(),
        }
    }

    /// The pool cells are computed on.
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// The code fragment run per cell.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Halo applied to input requests.
    pub fn halo(&self) -> &Halo {
        &self.halo
    }

    /// Configured failure policy.
    pub fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Compute cell `index`, waiting as long as it takes.
    pub fn load(&self, index: u64) -> Result<Cell, LoadError> {
        self.load_with(index, None)
    }

    /// Compute cell `index`, waiting at most `timeout`. A timeout is always
    /// returned as an error; the computation itself carries on.
    pub fn load_timeout(&self, index: u64, timeout: Duration) -> Result<Cell, LoadError> {
        self.load_with(index, Some(timeout))
    }

    fn load_with(&self, index: u64, timeout: Option<Duration>) -> Result<Cell, LoadError> {
        let interval = self.grid.cell_interval(index)?;
        let (output, outcome) =
            match Block::assemble(&self.grid, index, self.kind, &self.halo, &self.inputs) {
                Ok(block) => {
                    let output = block.output().clone();
                    let handle = self.pool.submit_block(block, self.code.as_str());
                    let outcome = match timeout {
                        Some(t) => handle.wait_timeout(t),
                        None => handle.wait(),
                    };
                    (output, outcome)
                }
                Err(e) => (
                    SharedBuffer::zeroed(self.kind.buffer_len(interval.num_elements())),
                    Err(TaskError::DataUnavailable(e)),
                ),
            };

        match outcome {
            Ok(()) => Ok(Cell::new(index, interval, self.kind, output, true)),
            Err(source @ TaskError::Timeout { .. }) => Err(LoadError::Task { index, source }),
            Err(source) => match self.policy {
                FailurePolicy::MarkInvalid => {
                    tracing::warn!(cell = index, error = %source, "cell computation failed; marking invalid");
                    Ok(Cell::new(index, interval, self.kind, output, false))
                }
                FailurePolicy::Propagate => Err(LoadError::Task { index, source }),
            },
        }
    }

    /// Wrap the loader in a [`CachedCellArray`] holding at most `max_cells`
    /// cells.
    pub fn into_array(self, max_cells: usize) -> Result<CachedCellArray, ConfigError> {
        CachedCellArray::new(Arc::new(self), max_cells)
    }
}

impl CellLoader for CacheLoader {
    fn grid(&self) -> &CellGrid {
        &self.grid
    }

    fn element_kind(&self) -> ElementKind {
        self.kind
    }

    fn load(&self, index: u64) -> Result<Cell, LoadError> {
        CacheLoader::load(self, index)
    }
}

impl fmt::Debug for CacheLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheLoader")
            .field("grid", &self.grid)
            .field("kind", &self.kind)
            .field("halo", &self.halo)
            .field("inputs", &self.inputs.len())
            .field("policy", &self.policy)
            .field("code", &self.code)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;

    fn pool() -> Arc<WorkerPool> {
        Arc::new(WorkerPool::script(PoolConfig::with_workers(1)).unwrap())
    }

    fn grid() -> CellGrid {
        CellGrid::new(&[4, 4], &[2, 2]).unwrap()
    }

    #[test]
    fn build_validates_configuration() {
        let p = pool();
        let err = CacheLoader::builder(grid(), Arc::clone(&p), "")
            .halo(Halo::symmetric(&[1]))
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::DimensionMismatch { expected: 2, actual: 1 });

        let err = CacheLoader::builder(grid(), Arc::clone(&p), "")
            .element_kind_name("quaternion")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedElementKind { .. }));

        let err = CacheLoader::builder(grid(), Arc::clone(&p), "")
            .element_kind(ElementKind::Bit)
            .storage(Primitive::U8)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::StorageMismatch { .. }));

        let loader = CacheLoader::builder(grid(), p, "")
            .element_kind_name("float32")
            .storage(Primitive::F32)
            .build()
            .unwrap();
        assert_eq!(CellLoader::element_kind(&loader), ElementKind::F32);
    }

    #[test]
    fn index_past_the_grid_is_a_data_error() {
        let loader = CacheLoader::builder(grid(), pool(), "").build().unwrap();
        assert!(matches!(loader.load(4), Err(LoadError::Data(_))));
    }

    #[test]
    fn cells_carry_their_geometry() {
        let loader = CacheLoader::builder(grid(), pool(), "block.data[...] = block.index")
            .element_kind(ElementKind::U16)
            .build()
            .unwrap();
        let cell = loader.load(3).unwrap();
        assert!(cell.is_valid());
        assert_eq!(cell.min(), &[2, 2]);
        assert_eq!(cell.dims(), &[2, 2]);
        assert_eq!(cell.to_f64_vec(), vec![3.0; 4]);
    }
}
