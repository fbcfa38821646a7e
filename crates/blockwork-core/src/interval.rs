//! Inclusive N-dimensional integer intervals.

use smallvec::SmallVec;

use crate::error::ConfigError;

/// Per-dimension integer coordinates. Inline for up to 4 dimensions.
pub type Coords = SmallVec<[i64; 4]>;

/// Per-dimension extents. Inline for up to 4 dimensions.
pub type Shape = SmallVec<[usize; 4]>;

/// An axis-aligned box of integer positions, `min` and `max` inclusive.
///
/// Coordinates may be negative: halo-extended intervals routinely reach
/// past the domain origin.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Interval {
    min: Coords,
    max: Coords,
}

impl Interval {
    /// Create an interval from inclusive bounds.
    ///
    /// Fails if the rank is zero, the bounds disagree on rank, or any
    /// `max[d] < min[d]`.
    pub fn new(min: &[i64], max: &[i64]) -> Result<Self, ConfigError> {
        if min.is_empty() {
            return Err(ConfigError::InvalidInterval {
                reason: "zero dimensions".into(),
            });
        }
        if min.len() != max.len() {
            return Err(ConfigError::DimensionMismatch {
                expected: min.len(),
                actual: max.len(),
            });
        }
        if let Some(d) = (0..min.len()).find(|&d| max[d] < min[d]) {
            return Err(ConfigError::InvalidInterval {
                reason: format!("max {} < min {} in dimension {d}", max[d], min[d]),
            });
        }
        Ok(Self {
            min: min.into(),
            max: max.into(),
        })
    }

    /// Create an interval from its minimum corner and extents.
    pub fn from_min_dims(min: &[i64], dims: &[usize]) -> Result<Self, ConfigError> {
        if min.len() != dims.len() {
            return Err(ConfigError::DimensionMismatch {
                expected: min.len(),
                actual: dims.len(),
            });
        }
        if let Some(d) = dims.iter().position(|&n| n == 0) {
            return Err(ConfigError::InvalidInterval {
                reason: format!("zero extent in dimension {d}"),
            });
        }
        let max: Coords = min
            .iter()
            .zip(dims)
            .map(|(&lo, &n)| lo + n as i64 - 1)
            .collect();
        Self::new(min, &max)
    }

    /// Interval `[0, dims[d] - 1]` in every dimension.
    pub fn zero_based(dims: &[usize]) -> Result<Self, ConfigError> {
        let min: Coords = dims.iter().map(|_| 0).collect();
        Self::from_min_dims(&min, dims)
    }

    /// Build without validation. Callers guarantee `max >= min` and equal rank.
    pub(crate) fn from_parts(min: Coords, max: Coords) -> Self {
        debug_assert_eq!(min.len(), max.len());
        Self { min, max }
    }

    /// Number of dimensions.
    pub fn num_dims(&self) -> usize {
        self.min.len()
    }

    /// Inclusive minimum corner.
    pub fn min(&self) -> &[i64] {
        &self.min
    }

    /// Inclusive maximum corner.
    pub fn max(&self) -> &[i64] {
        &self.max
    }

    /// Extent in every dimension.
    pub fn dims(&self) -> Shape {
        self.min
            .iter()
            .zip(&self.max)
            .map(|(&lo, &hi)| (hi - lo + 1) as usize)
            .collect()
    }

    /// Total number of positions.
    pub fn num_elements(&self) -> usize {
        self.dims().iter().product()
    }

    /// Whether `position` lies inside the interval.
    pub fn contains(&self, position: &[i64]) -> bool {
        position.len() == self.num_dims()
            && position
                .iter()
                .zip(self.min.iter().zip(&self.max))
                .all(|(&p, (&lo, &hi))| lo <= p && p <= hi)
    }

    /// Whether `other` lies entirely inside the interval.
    pub fn contains_interval(&self, other: &Interval) -> bool {
        other.num_dims() == self.num_dims() && self.contains(&other.min) && self.contains(&other.max)
    }

    /// Offset of `position` in a dimension-0-fastest linearization of the
    /// interval, or `None` if it lies outside.
    pub fn linear_offset(&self, position: &[i64]) -> Option<usize> {
        if !self.contains(position) {
            return None;
        }
        let mut offset = 0usize;
        let mut stride = 1usize;
        for d in 0..self.num_dims() {
            offset += (position[d] - self.min[d]) as usize * stride;
            stride *= (self.max[d] - self.min[d] + 1) as usize;
        }
        Some(offset)
    }

    /// Iterate over every position, dimension 0 fastest.
    pub fn positions(&self) -> Positions {
        Positions {
            interval: self.clone(),
            next: Some(self.min.clone()),
        }
    }
}

/// Iterator over the positions of an [`Interval`], dimension 0 fastest.
#[derive(Clone, Debug)]
pub struct Positions {
    interval: Interval,
    next: Option<Coords>,
}

impl Iterator for Positions {
    type Item = Coords;

    fn next(&mut self) -> Option<Coords> {
        let current = self.next.take()?;
        let mut following = current.clone();
        for d in 0..following.len() {
            if following[d] < self.interval.max[d] {
                following[d] += 1;
                self.next = Some(following);
                return Some(current);
            }
            following[d] = self.interval.min[d];
        }
        Some(current)
    }
}
