//! A materialized cell: one grid cell's storage plus its validity.

use blockwork_core::{DataError, ElementKind, Interval, Scalar, Shape, SharedBuffer};

/// The result of loading one grid cell.
///
/// `data` holds `dims.iter().product()` elements of `kind`, dimension 0
/// fastest. A cell whose computation failed is still returned, with
/// `valid == false`; its contents are unspecified.
#[derive(Clone, Debug)]
pub struct Cell {
    index: u64,
    interval: Interval,
    dims: Shape,
    kind: ElementKind,
    data: SharedBuffer,
    valid: bool,
}

impl Cell {
    /// Assemble a cell from its parts.
    pub fn new(
        index: u64,
        interval: Interval,
        kind: ElementKind,
        data: SharedBuffer,
        valid: bool,
    ) -> Self {
        Self {
            index,
            dims: interval.dims(),
            interval,
            kind,
            data,
            valid,
        }
    }

    /// Linear grid index.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Minimum corner in domain coordinates.
    pub fn min(&self) -> &[i64] {
        self.interval.min()
    }

    /// Extents.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Number of elements.
    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }

    /// Element kind of the storage.
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// The cell's storage. Clones share it.
    pub fn data(&self) -> &SharedBuffer {
        &self.data
    }

    /// Whether the computation that produced the cell succeeded.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The cell's extent as an interval.
    pub fn interval(&self) -> &Interval {
        &self.interval
    }

    /// Read the element at domain `position`.
    pub fn read(&self, position: &[i64]) -> Result<Scalar, DataError> {
        if position.len() != self.interval.num_dims() {
            return Err(DataError::DimensionMismatch {
                expected: self.interval.num_dims(),
                actual: position.len(),
            });
        }
        let offset = self
            .interval
            .linear_offset(position)
            .ok_or_else(|| DataError::OutOfBounds {
                position: position.to_vec(),
            })?;
        Ok(self.data.get(self.kind, offset))
    }

    /// Every element as `f64`, dimension 0 fastest.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.data.to_f64_vec(self.kind, self.num_elements())
    }
}
