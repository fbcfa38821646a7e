//! Partition of an N-dimensional domain into fixed-size cells.

use crate::error::{ConfigError, DataError};
use crate::interval::{Coords, Interval, Shape};

/// An immutable partition of `[0, dimensions)` into cells of `cell_shape`.
///
/// Cells are numbered by a dimension-0-fastest linearization of their grid
/// position. Cells on the upper boundary of a dimension are truncated to
/// the domain, so `cell_bounds` never reports positions outside it.
///
/// # Examples
///
/// ```
/// use blockwork_core::CellGrid;
///
/// let grid = CellGrid::new(&[5, 2], &[3, 1]).unwrap();
/// assert_eq!(grid.cell_count(), 4);
/// let (min, dims) = grid.cell_bounds(1).unwrap();
/// assert_eq!(min.as_slice(), &[3, 0]);
/// assert_eq!(dims.as_slice(), &[2, 1]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellGrid {
    dimensions: Shape,
    cell_shape: Shape,
    grid_dims: Shape,
}

impl CellGrid {
    /// Create a grid over `dimensions` with cells of `cell_shape`.
    ///
    /// Every extent must be positive and both shapes must have the same,
    /// non-zero rank.
    pub fn new(dimensions: &[usize], cell_shape: &[usize]) -> Result<Self, ConfigError> {
        if dimensions.is_empty() {
            return Err(ConfigError::InvalidGrid {
                reason: "zero dimensions".into(),
            });
        }
        if dimensions.len() != cell_shape.len() {
            return Err(ConfigError::DimensionMismatch {
                expected: dimensions.len(),
                actual: cell_shape.len(),
            });
        }
        if let Some(d) = dimensions.iter().position(|&n| n == 0) {
            return Err(ConfigError::InvalidGrid {
                reason: format!("domain extent is zero in dimension {d}"),
            });
        }
        if let Some(d) = cell_shape.iter().position(|&n| n == 0) {
            return Err(ConfigError::InvalidGrid {
                reason: format!("cell extent is zero in dimension {d}"),
            });
        }
        let grid_dims: Shape = dimensions
            .iter()
            .zip(cell_shape)
            .map(|(&n, &c)| n.div_ceil(c))
            .collect();
        if grid_dims
            .iter()
            .try_fold(1u64, |acc, &g| acc.checked_mul(g as u64))
            .is_none()
        {
            return Err(ConfigError::InvalidGrid {
                reason: "cell count overflows u64".into(),
            });
        }
        Ok(Self {
            dimensions: dimensions.into(),
            cell_shape: cell_shape.into(),
            grid_dims,
        })
    }

    /// Number of dimensions.
    pub fn num_dims(&self) -> usize {
        self.dimensions.len()
    }

    /// Domain extents.
    pub fn dimensions(&self) -> &[usize] {
        &self.dimensions
    }

    /// Nominal cell extents.
    pub fn cell_shape(&self) -> &[usize] {
        &self.cell_shape
    }

    /// Number of cells along each dimension.
    pub fn grid_dims(&self) -> &[usize] {
        &self.grid_dims
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> u64 {
        self.grid_dims.iter().map(|&g| g as u64).product()
    }

    /// The whole domain as an interval.
    pub fn interval(&self) -> Interval {
        let min: Coords = self.dimensions.iter().map(|_| 0).collect();
        let max: Coords = self.dimensions.iter().map(|&n| n as i64 - 1).collect();
        Interval::from_parts(min, max)
    }

    /// Grid position of the cell with linear `index`.
    pub fn cell_position(&self, index: u64) -> Result<Coords, DataError> {
        let count = self.cell_count();
        if index >= count {
            return Err(DataError::CellIndexOutOfRange { index, count });
        }
        let mut rest = index;
        let mut position = Coords::with_capacity(self.num_dims());
        for &g in &self.grid_dims {
            position.push((rest % g as u64) as i64);
            rest /= g as u64;
        }
        Ok(position)
    }

    /// Linear index of the cell at grid `position`, if it exists.
    pub fn cell_index(&self, position: &[i64]) -> Option<u64> {
        if position.len() != self.num_dims() {
            return None;
        }
        let mut index = 0u64;
        let mut stride = 1u64;
        for (&p, &g) in position.iter().zip(&self.grid_dims) {
            if p < 0 || p as usize >= g {
                return None;
            }
            index += p as u64 * stride;
            stride *= g as u64;
        }
        Some(index)
    }

    /// Linear index of the cell containing the domain `point`.
    pub fn cell_index_of(&self, point: &[i64]) -> Option<u64> {
        if point.len() != self.num_dims() {
            return None;
        }
        let position: Coords = point
            .iter()
            .zip(&self.cell_shape)
            .map(|(&p, &c)| p.div_euclid(c as i64))
            .collect();
        self.cell_index(&position)
    }

    /// Minimum corner and extents of cell `index`, truncated to the domain.
    pub fn cell_bounds(&self, index: u64) -> Result<(Coords, Shape), DataError> {
        let position = self.cell_position(index)?;
        let mut min = Coords::with_capacity(self.num_dims());
        let mut dims = Shape::with_capacity(self.num_dims());
        for d in 0..self.num_dims() {
            let lo = position[d] as usize * self.cell_shape[d];
            min.push(lo as i64);
            dims.push(self.cell_shape[d].min(self.dimensions[d] - lo));
        }
        Ok((min, dims))
    }

    /// Cell `index` as an interval.
    pub fn cell_interval(&self, index: u64) -> Result<Interval, DataError> {
        let (min, dims) = self.cell_bounds(index)?;
        let max: Coords = min
            .iter()
            .zip(&dims)
            .map(|(&lo, &n)| lo + n as i64 - 1)
            .collect();
        Ok(Interval::from_parts(min, max))
    }

    /// Whether `interval` is exactly the extent of one cell: its minimum is
    /// aligned to a cell boundary and each extent equals that cell's
    /// extent, truncated to the domain.
    pub fn is_cell_aligned(&self, interval: &Interval) -> bool {
        if interval.num_dims() != self.num_dims() || !self.interval().contains_interval(interval) {
            return false;
        }
        let dims = interval.dims();
        (0..self.num_dims()).all(|d| {
            let lo = interval.min()[d] as usize;
            lo % self.cell_shape[d] == 0
                && dims[d] == self.cell_shape[d].min(self.dimensions[d] - lo)
        })
    }
}
