//! A grid-partitioned array whose cells are loaded on demand.

use std::fmt;
use std::sync::Arc;

use blockwork_core::{CellGrid, ConfigError, DataError, ElementKind, Interval, LoadError, Scalar};

use crate::cache::{CacheStats, CellCache};
use crate::cell::Cell;
use crate::source::{check_rank, RandomAccess};

/// Produces the contents of one grid cell.
pub trait CellLoader: Send + Sync {
    /// The grid the loader partitions its domain into.
    fn grid(&self) -> &CellGrid;

    /// Kind of the cells it produces.
    fn element_kind(&self) -> ElementKind;

    /// Compute cell `index`.
    fn load(&self, index: u64) -> Result<Cell, LoadError>;
}

/// A lazily materialized array: a [`CellGrid`], a [`CellLoader`], and a
/// bounded [`CellCache`].
///
/// Element reads go through the cache, so reading any position of a cell
/// loads the whole cell at most once while it stays resident.
pub struct CachedCellArray {
    grid: CellGrid,
    kind: ElementKind,
    cache: CellCache,
    loader: Arc<dyn CellLoader>,
}

impl CachedCellArray {
    /// Array backed by `loader`, caching at most `max_cells` cells.
    pub fn new(loader: Arc<dyn CellLoader>, max_cells: usize) -> Result<Self, ConfigError> {
        Ok(Self {
            grid: loader.grid().clone(),
            kind: loader.element_kind(),
            cache: CellCache::new(max_cells)?,
            loader,
        })
    }

    /// The cell partition.
    pub fn grid(&self) -> &CellGrid {
        &self.grid
    }

    /// The cache in front of the loader.
    pub fn cache(&self) -> &CellCache {
        &self.cache
    }

    /// Cache counters.
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Cell `index`, loading it if it is not resident.
    pub fn cell(&self, index: u64) -> Result<Arc<Cell>, LoadError> {
        let count = self.grid.cell_count();
        if index >= count {
            return Err(DataError::CellIndexOutOfRange { index, count }.into());
        }
        self.cache.get_or_load(index, || self.loader.load(index))
    }

    /// The cell containing domain `point`.
    pub fn cell_at(&self, point: &[i64]) -> Result<Arc<Cell>, LoadError> {
        let index = self
            .grid
            .cell_index_of(point)
            .ok_or_else(|| DataError::OutOfBounds {
                position: point.to_vec(),
            })?;
        self.cell(index)
    }

    /// The cell whose extent is exactly `interval`, if there is one.
    pub fn cell_for_interval(&self, interval: &Interval) -> Option<u64> {
        if self.grid.is_cell_aligned(interval) {
            self.grid.cell_index_of(interval.min())
        } else {
            None
        }
    }

    /// Every element as `f64`, dimension 0 fastest over the whole domain.
    pub fn to_f64_vec(&self) -> Result<Vec<f64>, LoadError> {
        let domain = self.grid.interval();
        let mut out = vec![0.0; domain.num_elements()];
        for index in 0..self.grid.cell_count() {
            let cell = self.cell(index)?;
            for (i, p) in cell.interval().positions().enumerate() {
                if let Some(offset) = domain.linear_offset(&p) {
                    out[offset] = cell.data().get(self.kind, i).to_f64();
                }
            }
        }
        Ok(out)
    }
}

impl fmt::Debug for CachedCellArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedCellArray")
            .field("grid", &self.grid)
            .field("kind", &self.kind)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl RandomAccess for CachedCellArray {
    fn num_dims(&self) -> usize {
        self.grid.num_dims()
    }

    fn element_kind(&self) -> ElementKind {
        self.kind
    }

    fn read(&self, position: &[i64]) -> Result<Scalar, DataError> {
        check_rank(self.grid.num_dims(), position)?;
        let cell = self.cell_at(position).map_err(|e| match e {
            LoadError::Data(d) => d,
            other => DataError::Unavailable {
                reason: other.to_string(),
            },
        })?;
        cell.read(position)
    }

    fn domain(&self) -> Option<Interval> {
        Some(self.grid.interval())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockwork_core::{SharedBuffer, TaskError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Cells filled with `index * 100 + offset`, counting loads.
    struct Counting {
        grid: CellGrid,
        loads: AtomicUsize,
        fail: Option<u64>,
    }

    impl CellLoader for Counting {
        fn grid(&self) -> &CellGrid {
            &self.grid
        }

        fn element_kind(&self) -> ElementKind {
            ElementKind::F64
        }

        fn load(&self, index: u64) -> Result<Cell, LoadError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail == Some(index) {
                return Err(LoadError::Task {
                    index,
                    source: TaskError::PoolShutDown,
                });
            }
            let interval = self.grid.cell_interval(index)?;
            let n = interval.num_elements();
            let data = SharedBuffer::zeroed(ElementKind::F64.buffer_len(n));
            for i in 0..n {
                data.set(ElementKind::F64, i, Scalar::Float((index * 100 + i as u64) as f64));
            }
            Ok(Cell::new(index, interval, ElementKind::F64, data, true))
        }
    }

    fn array(fail: Option<u64>, max_cells: usize) -> (Arc<Counting>, CachedCellArray) {
        let loader = Arc::new(Counting {
            grid: CellGrid::new(&[5], &[2]).unwrap(),
            loads: AtomicUsize::new(0),
            fail,
        });
        let array = CachedCellArray::new(loader.clone(), max_cells).unwrap();
        (loader, array)
    }

    #[test]
    fn reads_go_through_the_cache() {
        let (loader, a) = array(None, 8);
        assert_eq!(a.read(&[0]).unwrap(), Scalar::Float(0.0));
        assert_eq!(a.read(&[1]).unwrap(), Scalar::Float(1.0));
        assert_eq!(a.read(&[4]).unwrap(), Scalar::Float(200.0));
        assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
        assert_eq!(
            a.to_f64_vec().unwrap(),
            vec![0.0, 1.0, 100.0, 101.0, 200.0]
        );
    }

    #[test]
    fn out_of_domain_reads_fail() {
        let (_, a) = array(None, 8);
        assert!(matches!(a.read(&[5]), Err(DataError::OutOfBounds { .. })));
        assert!(matches!(
            a.cell(3),
            Err(LoadError::Data(DataError::CellIndexOutOfRange { index: 3, count: 3 }))
        ));
    }

    #[test]
    fn loader_failures_surface_as_unavailable() {
        let (_, a) = array(Some(1), 8);
        assert!(matches!(a.read(&[2]), Err(DataError::Unavailable { .. })));
        assert!(a.read(&[0]).is_ok());
    }

    #[test]
    fn aligned_intervals_map_to_cells() {
        let (_, a) = array(None, 8);
        assert_eq!(a.cell_for_interval(&Interval::new(&[2], &[3]).unwrap()), Some(1));
        assert_eq!(a.cell_for_interval(&Interval::new(&[4], &[4]).unwrap()), Some(2));
        assert_eq!(a.cell_for_interval(&Interval::new(&[1], &[2]).unwrap()), None);
        // Cells 1 and 2 together reach the end of the domain but are two cells.
        assert_eq!(a.cell_for_interval(&Interval::new(&[2], &[4]).unwrap()), None);
        assert_eq!(a.cell_for_interval(&Interval::new(&[0], &[4]).unwrap()), None);
    }

    #[test]
    fn zero_capacity_is_a_config_error() {
        let loader = Arc::new(Counting {
            grid: CellGrid::new(&[5], &[2]).unwrap(),
            loads: AtomicUsize::new(0),
            fail: None,
        });
        assert_eq!(
            CachedCellArray::new(loader, 0).unwrap_err(),
            ConfigError::ZeroCacheCapacity
        );
    }
}
