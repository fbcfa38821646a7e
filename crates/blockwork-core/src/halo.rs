//! Asymmetric per-dimension margins around a cell.

use crate::error::ConfigError;
use crate::interval::{Coords, Interval, Shape};

/// Extra context a computation needs around its cell.
///
/// `lower[d]` positions are added below the cell's minimum and `upper[d]`
/// above its maximum. Extending an interval and cropping it back with
/// [`crop_slices`](Halo::crop_slices) is the identity.
///
/// # Examples
///
/// ```
/// use blockwork_core::{Halo, Interval};
///
/// let halo = Halo::new(&[2], &[3]).unwrap();
/// let cell = Interval::new(&[0], &[2]).unwrap();
/// let ext = halo.extend(&cell).unwrap();
/// assert_eq!((ext.min()[0], ext.max()[0]), (-2, 5));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Halo {
    lower: Shape,
    upper: Shape,
}

/// The part of a halo-extended axis that belongs to the cell itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CropSlice {
    /// Index of the first cell position along the extended axis.
    pub offset: usize,
    /// Number of cell positions.
    pub len: usize,
}

impl CropSlice {
    /// Exclusive end index.
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

impl Halo {
    /// Halo with independent lower and upper margins.
    pub fn new(lower: &[usize], upper: &[usize]) -> Result<Self, ConfigError> {
        if lower.len() != upper.len() {
            return Err(ConfigError::DimensionMismatch {
                expected: lower.len(),
                actual: upper.len(),
            });
        }
        Ok(Self {
            lower: lower.into(),
            upper: upper.into(),
        })
    }

    /// Halo with `lower == upper == margins`.
    pub fn symmetric(margins: &[usize]) -> Self {
        Self {
            lower: margins.into(),
            upper: margins.into(),
        }
    }

    /// Zero halo of rank `num_dims`; extending with it is the identity.
    pub fn empty(num_dims: usize) -> Self {
        Self {
            lower: Shape::from_elem(0, num_dims),
            upper: Shape::from_elem(0, num_dims),
        }
    }

    /// Number of dimensions.
    pub fn num_dims(&self) -> usize {
        self.lower.len()
    }

    /// Margins below the cell minimum.
    pub fn lower(&self) -> &[usize] {
        &self.lower
    }

    /// Margins above the cell maximum.
    pub fn upper(&self) -> &[usize] {
        &self.upper
    }

    /// Whether every margin is zero.
    pub fn is_empty(&self) -> bool {
        self.lower.iter().chain(&self.upper).all(|&m| m == 0)
    }

    fn check_rank(&self, actual: usize) -> Result<(), ConfigError> {
        if actual == self.num_dims() {
            Ok(())
        } else {
            Err(ConfigError::DimensionMismatch {
                expected: self.num_dims(),
                actual,
            })
        }
    }

    /// `[min - lower, max + upper]` in every dimension.
    pub fn extend(&self, interval: &Interval) -> Result<Interval, ConfigError> {
        self.check_rank(interval.num_dims())?;
        let min: Coords = interval
            .min()
            .iter()
            .zip(&self.lower)
            .map(|(&m, &l)| m - l as i64)
            .collect();
        let max: Coords = interval
            .max()
            .iter()
            .zip(&self.upper)
            .map(|(&m, &u)| m + u as i64)
            .collect();
        Ok(Interval::from_parts(min, max))
    }

    /// `dims[d] + lower[d] + upper[d]` in every dimension.
    pub fn adjusted_shape(&self, dims: &[usize]) -> Result<Shape, ConfigError> {
        self.check_rank(dims.len())?;
        Ok(dims
            .iter()
            .enumerate()
            .map(|(d, &n)| n + self.lower[d] + self.upper[d])
            .collect())
    }

    /// Per-dimension slices that crop a halo-extended array of a cell with
    /// extents `dims` back to the cell. Correct when an upper margin is zero.
    pub fn crop_slices(&self, dims: &[usize]) -> Result<Vec<CropSlice>, ConfigError> {
        self.check_rank(dims.len())?;
        Ok(dims
            .iter()
            .zip(&self.lower)
            .map(|(&len, &offset)| CropSlice { offset, len })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_halo_is_identity() {
        let iv = Interval::new(&[3, -1], &[5, 4]).unwrap();
        let halo = Halo::empty(2);
        assert!(halo.is_empty());
        assert_eq!(halo.extend(&iv).unwrap(), iv);
        assert_eq!(halo.adjusted_shape(&iv.dims()).unwrap(), iv.dims());
    }

    #[test]
    fn zero_upper_margin_crops_to_the_end() {
        let halo = Halo::new(&[2], &[0]).unwrap();
        let slices = halo.crop_slices(&[3]).unwrap();
        assert_eq!(slices, vec![CropSlice { offset: 2, len: 3 }]);
        assert_eq!(slices[0].end(), halo.adjusted_shape(&[3]).unwrap()[0]);
    }

    #[test]
    fn rank_mismatch_is_reported() {
        let halo = Halo::symmetric(&[1, 1]);
        let iv = Interval::new(&[0], &[3]).unwrap();
        assert_eq!(
            halo.extend(&iv),
            Err(ConfigError::DimensionMismatch { expected: 2, actual: 1 })
        );
        assert!(Halo::new(&[1], &[1, 2]).is_err());
    }

    proptest! {
        #[test]
        fn extend_then_crop_recovers_the_cell(
            axes in prop::collection::vec((-20i64..20, 1usize..9, 0usize..5, 0usize..5), 1..4),
        ) {
            let min: Vec<i64> = axes.iter().map(|s| s.0).collect();
            let dims: Vec<usize> = axes.iter().map(|s| s.1).collect();
            let lower: Vec<usize> = axes.iter().map(|s| s.2).collect();
            let upper: Vec<usize> = axes.iter().map(|s| s.3).collect();
            let cell = Interval::from_min_dims(&min, &dims).unwrap();
            let halo = Halo::new(&lower, &upper).unwrap();

            let ext = halo.extend(&cell).unwrap();
            prop_assert_eq!(ext.dims(), halo.adjusted_shape(&dims).unwrap());
            let slices = halo.crop_slices(&dims).unwrap();
            for d in 0..dims.len() {
                prop_assert_eq!(slices[d].len, dims[d]);
                prop_assert_eq!(ext.min()[d] + slices[d].offset as i64, cell.min()[d]);
                prop_assert_eq!(ext.min()[d] + slices[d].end() as i64 - 1, cell.max()[d]);
            }
        }

        #[test]
        fn zero_halo_extension_is_identity(
            min in prop::collection::vec(-50i64..50, 1..5),
            extent in 1usize..8,
        ) {
            let dims = vec![extent; min.len()];
            let cell = Interval::from_min_dims(&min, &dims).unwrap();
            let halo = Halo::empty(min.len());
            prop_assert_eq!(halo.extend(&cell).unwrap(), cell);
            let slices = halo.crop_slices(&dims).unwrap();
            prop_assert!(slices.iter().all(|s| s.offset == 0 && s.len == extent));
        }
    }
}
