//! Input generators: where a block's input views come from.
//!
//! A generator turns a halo-extended interval into a [`DataView`]. Two
//! strategies exist:
//!
//! - **Generic copy**: allocate a fresh buffer and copy the interval one
//!   element at a time out of any [`RandomAccess`] source, dimension 0
//!   fastest. Always correct.
//! - **Direct borrow**: when the source is a [`CachedCellArray`] and the
//!   interval is exactly one of its cells, hand out that cell's own
//!   storage. No allocation, no copy. Writes through the view land in the
//!   upstream cell.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use blockwork_cache::{CachedCellArray, Cell, Extended, OutOfBounds, RandomAccess};
use blockwork_core::{
    ArrayBinding, ConfigError, DataError, ElementKind, Interval, LoadError, Scalar, Shape,
    SharedBuffer,
};

// ── DataView ───────────────────────────────────────────────────────

/// One input array handed to a block.
///
/// `shape` is in host order (dimension 0 first); workers see it reversed.
#[derive(Clone, Debug)]
pub enum DataView {
    /// A buffer allocated for this view alone.
    Owned {
        /// Element kind.
        kind: ElementKind,
        /// Extents, dimension 0 first.
        shape: Shape,
        /// Element storage, dimension 0 fastest.
        buffer: SharedBuffer,
    },
    /// The storage of a cached cell. Holding the cell keeps the storage
    /// alive even if the cache evicts it.
    Borrowed {
        /// Element kind.
        kind: ElementKind,
        /// Extents, dimension 0 first.
        shape: Shape,
        /// The borrowed cell.
        cell: Arc<Cell>,
    },
}

impl DataView {
    /// An owned view over `buffer`, which must hold `shape` elements of
    /// `kind`.
    pub fn owned(kind: ElementKind, shape: &[usize], buffer: SharedBuffer) -> Result<Self, DataError> {
        let count = shape.iter().product();
        let needed = kind.buffer_len(count);
        if buffer.len() < needed {
            return Err(DataError::Unavailable {
                reason: format!(
                    "buffer of {} bytes is too small for {count} {kind} elements",
                    buffer.len()
                ),
            });
        }
        Ok(Self::Owned {
            kind,
            shape: shape.iter().copied().collect(),
            buffer,
        })
    }

    /// An owned view filled from `values`, dimension 0 fastest.
    pub fn from_values(kind: ElementKind, shape: &[usize], values: &[f64]) -> Result<Self, DataError> {
        let count: usize = shape.iter().product();
        if values.len() != count {
            return Err(DataError::Unavailable {
                reason: format!("{} values for a shape of {count} elements", values.len()),
            });
        }
        let buffer = SharedBuffer::zeroed(kind.buffer_len(count));
        buffer.write(|bytes| {
            for (i, &v) in values.iter().enumerate() {
                kind.write(bytes, i, v.into());
            }
        });
        Self::owned(kind, shape, buffer)
    }

    /// A view borrowing `cell`'s storage.
    pub fn borrowed(cell: Arc<Cell>) -> Self {
        Self::Borrowed {
            kind: cell.kind(),
            shape: cell.dims().iter().copied().collect(),
            cell,
        }
    }

    /// Element kind.
    pub fn kind(&self) -> ElementKind {
        match self {
            Self::Owned { kind, .. } | Self::Borrowed { kind, .. } => *kind,
        }
    }

    /// Extents, dimension 0 first.
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Owned { shape, .. } | Self::Borrowed { shape, .. } => shape,
        }
    }

    /// The underlying storage.
    pub fn buffer(&self) -> &SharedBuffer {
        match self {
            Self::Owned { buffer, .. } => buffer,
            Self::Borrowed { cell, .. } => cell.data(),
        }
    }

    /// Whether the view aliases a cached cell.
    pub fn is_borrowed(&self) -> bool {
        matches!(self, Self::Borrowed { .. })
    }

    /// Every element as `f64`, dimension 0 fastest.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        let count = self.shape().iter().product();
        self.buffer().to_f64_vec(self.kind(), count)
    }

    /// The binding a worker sees: axes reversed so the last axis is the
    /// contiguous one. Packed kinds are exposed as a flat array of storage
    /// entities.
    pub fn to_binding(&self) -> ArrayBinding {
        ArrayBinding {
            buffer: self.buffer().clone(),
            primitive: self.kind().storage(),
            shape: worker_shape(self.kind(), self.shape()),
        }
    }
}

/// `shape` as a worker sees a buffer of `kind`.
pub(crate) fn worker_shape(kind: ElementKind, shape: &[usize]) -> Shape {
    if kind.is_packed() {
        let count = shape.iter().product();
        Shape::from_slice(&[kind.entity_count(count)])
    } else {
        shape.iter().rev().copied().collect()
    }
}

// ── InputGenerator ─────────────────────────────────────────────────

/// Supplies a block's input for a halo-extended interval.
///
/// Any `Fn(&Interval) -> Result<DataView, DataError>` closure is a
/// generator. A generator may return a view whose shape differs from the
/// interval; it is bound with its own shape.
pub trait InputGenerator: Send + Sync {
    /// The view covering `interval`.
    fn generate(&self, interval: &Interval) -> Result<DataView, DataError>;
}

impl<F> InputGenerator for F
where
    F: Fn(&Interval) -> Result<DataView, DataError> + Send + Sync,
{
    fn generate(&self, interval: &Interval) -> Result<DataView, DataError> {
        self(interval)
    }
}

/// Copy `interval` out of `source` into a fresh buffer, dimension 0 fastest.
pub fn copy_interval(source: &dyn RandomAccess, interval: &Interval) -> Result<DataView, DataError> {
    if source.num_dims() != interval.num_dims() {
        return Err(DataError::DimensionMismatch {
            expected: source.num_dims(),
            actual: interval.num_dims(),
        });
    }
    let kind = source.element_kind();
    let buffer = SharedBuffer::zeroed(kind.buffer_len(interval.num_elements()));
    buffer.write(|bytes| {
        for (i, position) in interval.positions().enumerate() {
            kind.write(bytes, i, source.read(&position)?);
        }
        Ok::<_, DataError>(())
    })?;
    Ok(DataView::Owned {
        kind,
        shape: interval.dims(),
        buffer,
    })
}

// ── CopyInput ──────────────────────────────────────────────────────

/// Generic-copy generator over any [`RandomAccess`] source.
///
/// Wrap bounded sources in [`Extended`] when halos reach past their domain.
#[derive(Clone)]
pub struct CopyInput {
    source: Arc<dyn RandomAccess>,
}

impl CopyInput {
    /// Copy from `source`.
    pub fn new(source: impl RandomAccess + 'static) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    /// Copy from an already shared source.
    pub fn shared(source: Arc<dyn RandomAccess>) -> Self {
        Self { source }
    }
}

impl fmt::Debug for CopyInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CopyInput")
            .field("num_dims", &self.source.num_dims())
            .field("kind", &self.source.element_kind())
            .finish()
    }
}

impl InputGenerator for CopyInput {
    fn generate(&self, interval: &Interval) -> Result<DataView, DataError> {
        copy_interval(self.source.as_ref(), interval)
    }
}

// ── CellInput ──────────────────────────────────────────────────────

/// How a [`CellInput`] serves one interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Copy element by element.
    GenericCopy,
    /// Borrow the storage of the cell with this index.
    DirectBorrow(u64),
}

/// Generator over a [`CachedCellArray`] that borrows whole cells when it
/// can and copies otherwise.
#[derive(Clone, Debug)]
pub struct CellInput {
    array: Arc<CachedCellArray>,
    policy: OutOfBounds,
}

impl CellInput {
    /// Reads outside the array's domain fail.
    pub fn new(array: Arc<CachedCellArray>) -> Result<Self, ConfigError> {
        Self::with_policy(array, OutOfBounds::Fail)
    }

    /// Copies apply `policy` outside the array's domain.
    pub fn with_policy(array: Arc<CachedCellArray>, policy: OutOfBounds) -> Result<Self, ConfigError> {
        Extended::new(Arc::clone(&array), policy)?;
        Ok(Self { array, policy })
    }

    /// The upstream array.
    pub fn array(&self) -> &Arc<CachedCellArray> {
        &self.array
    }

    /// The strategy [`generate`](InputGenerator::generate) uses for
    /// `interval`.
    pub fn strategy_for(&self, interval: &Interval) -> Strategy {
        match self.array.cell_for_interval(interval) {
            Some(index) => Strategy::DirectBorrow(index),
            None => Strategy::GenericCopy,
        }
    }
}

impl InputGenerator for CellInput {
    fn generate(&self, interval: &Interval) -> Result<DataView, DataError> {
        let strategy = self.strategy_for(interval);
        tracing::trace!(?strategy, min = ?interval.min(), "resolving cell input");
        match strategy {
            Strategy::DirectBorrow(index) => {
                let cell = self.array.cell(index).map_err(upstream_error)?;
                Ok(DataView::borrowed(cell))
            }
            Strategy::GenericCopy => {
                let cursor = Extended::new(CellCursor::new(&self.array), self.policy)
                    .map_err(|e| DataError::Unavailable {
                        reason: e.to_string(),
                    })?;
                copy_interval(&cursor, interval)
            }
        }
    }
}

/// Reads from a cached array, holding on to the last cell it resolved so
/// runs of positions inside one cell skip the cache.
struct CellCursor<'a> {
    array: &'a CachedCellArray,
    current: Mutex<Option<Arc<Cell>>>,
}

impl<'a> CellCursor<'a> {
    fn new(array: &'a CachedCellArray) -> Self {
        Self {
            array,
            current: Mutex::new(None),
        }
    }
}

impl RandomAccess for CellCursor<'_> {
    fn num_dims(&self) -> usize {
        self.array.num_dims()
    }

    fn element_kind(&self) -> ElementKind {
        self.array.element_kind()
    }

    fn read(&self, position: &[i64]) -> Result<Scalar, DataError> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cell) = current.as_ref().filter(|c| c.interval().contains(position)) {
            return cell.read(position);
        }
        if position.len() != self.array.num_dims() {
            return self.array.read(position);
        }
        let cell = self.array.cell_at(position).map_err(upstream_error)?;
        let value = cell.read(position);
        *current = Some(cell);
        value
    }

    fn domain(&self) -> Option<Interval> {
        self.array.domain()
    }
}

fn upstream_error(e: LoadError) -> DataError {
    match e {
        LoadError::Data(e) => e,
        LoadError::Task { index, source } => DataError::Unavailable {
            reason: format!("upstream cell {index} failed: {source}"),
        },
    }
}
