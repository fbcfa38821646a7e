//! Out-of-bounds extension of bounded sources.

use smallvec::SmallVec;

use blockwork_core::{ConfigError, DataError, ElementKind, Interval, Scalar};

use crate::source::{check_rank, RandomAccess};

/// What a read outside the domain of an [`Extended`] source returns.
///
/// ```
/// use blockwork_cache::{DenseArray, Extended, OutOfBounds, RandomAccess};
/// use blockwork_core::{ElementKind, Scalar};
///
/// let a = DenseArray::from_values(&[3], ElementKind::F64, &[1.0, 2.0, 3.0]).unwrap();
/// let wrap = Extended::new(a.clone(), OutOfBounds::Wrap).unwrap();
/// assert_eq!(wrap.read(&[-1]).unwrap(), Scalar::Float(3.0));
/// let border = Extended::new(a, OutOfBounds::Border).unwrap();
/// assert_eq!(border.read(&[7]).unwrap(), Scalar::Float(3.0));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OutOfBounds {
    /// Zero of the source's element kind.
    Zero,
    /// A fixed value.
    Constant(Scalar),
    /// The nearest in-bounds element (coordinates clamped).
    Border,
    /// Periodic continuation of the domain.
    Wrap,
    /// Fail with [`DataError::OutOfBounds`].
    Fail,
}

/// A bounded source made total by an [`OutOfBounds`] policy.
#[derive(Clone, Debug)]
pub struct Extended<S> {
    inner: S,
    domain: Interval,
    policy: OutOfBounds,
}

impl<S: RandomAccess> Extended<S> {
    /// Extend `inner`, which must report a domain.
    pub fn new(inner: S, policy: OutOfBounds) -> Result<Self, ConfigError> {
        let domain = inner.domain().ok_or_else(|| ConfigError::InvalidInterval {
            reason: "only bounded sources can be extended".into(),
        })?;
        Ok(Self {
            inner,
            domain,
            policy,
        })
    }

    /// Shorthand for [`OutOfBounds::Zero`].
    pub fn zero(inner: S) -> Result<Self, ConfigError> {
        Self::new(inner, OutOfBounds::Zero)
    }

    /// The wrapped source.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// The extension policy.
    pub fn policy(&self) -> OutOfBounds {
        self.policy
    }

    fn remap(&self, position: &[i64], wrap: bool) -> SmallVec<[i64; 4]> {
        position
            .iter()
            .enumerate()
            .map(|(d, &p)| {
                let lo = self.domain.min()[d];
                let hi = self.domain.max()[d];
                if wrap {
                    lo + (p - lo).rem_euclid(hi - lo + 1)
                } else {
                    p.clamp(lo, hi)
                }
            })
            .collect()
    }
}

impl<S: RandomAccess> RandomAccess for Extended<S> {
    fn num_dims(&self) -> usize {
        self.domain.num_dims()
    }

    fn element_kind(&self) -> ElementKind {
        self.inner.element_kind()
    }

    fn read(&self, position: &[i64]) -> Result<Scalar, DataError> {
        check_rank(self.num_dims(), position)?;
        if self.domain.contains(position) {
            return self.inner.read(position);
        }
        match self.policy {
            OutOfBounds::Zero => Ok(Scalar::Int(0)),
            OutOfBounds::Constant(v) => Ok(v),
            OutOfBounds::Border => self.inner.read(&self.remap(position, false)),
            OutOfBounds::Wrap => self.inner.read(&self.remap(position, true)),
            OutOfBounds::Fail => Err(DataError::OutOfBounds {
                position: position.to_vec(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ConstantSource, DenseArray};

    fn ramp() -> DenseArray {
        DenseArray::from_values(&[4], ElementKind::I32, &[1.0, 2.0, 3.0, 4.0]).unwrap()
    }

    #[test]
    fn unbounded_sources_cannot_be_extended() {
        let c = ConstantSource::new(1, ElementKind::F64, 1.0);
        assert!(Extended::zero(c).is_err());
    }

    #[test]
    fn policies() {
        let read = |policy: OutOfBounds, p: i64| Extended::new(ramp(), policy).unwrap().read(&[p]);
        assert_eq!(read(OutOfBounds::Zero, -2).unwrap().to_f64(), 0.0);
        assert_eq!(read(OutOfBounds::Constant(Scalar::Float(9.5)), 4).unwrap().to_f64(), 9.5);
        assert_eq!(read(OutOfBounds::Border, -2).unwrap().to_f64(), 1.0);
        assert_eq!(read(OutOfBounds::Border, 9).unwrap().to_f64(), 4.0);
        assert_eq!(read(OutOfBounds::Wrap, -1).unwrap().to_f64(), 4.0);
        assert_eq!(read(OutOfBounds::Wrap, 5).unwrap().to_f64(), 2.0);
        assert!(matches!(read(OutOfBounds::Fail, 4), Err(DataError::OutOfBounds { .. })));
        assert_eq!(read(OutOfBounds::Fail, 2).unwrap().to_f64(), 3.0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn grid_source(w: usize, h: usize) -> DenseArray {
            DenseArray::from_fn(&[w, h], ElementKind::I64, |p| Scalar::Int(p[0] * 100 + p[1])).unwrap()
        }

        proptest! {
            #[test]
            fn wrap_is_periodic(w in 1usize..6, h in 1usize..6, x in -20i64..20, y in -20i64..20) {
                let wrapped = Extended::new(grid_source(w, h), OutOfBounds::Wrap).unwrap();
                let expected = x.rem_euclid(w as i64) * 100 + y.rem_euclid(h as i64);
                prop_assert_eq!(wrapped.read(&[x, y]).unwrap(), Scalar::Int(expected));
            }

            #[test]
            fn border_clamps(w in 1usize..6, h in 1usize..6, x in -20i64..20, y in -20i64..20) {
                let bordered = Extended::new(grid_source(w, h), OutOfBounds::Border).unwrap();
                let expected = x.clamp(0, w as i64 - 1) * 100 + y.clamp(0, h as i64 - 1);
                prop_assert_eq!(bordered.read(&[x, y]).unwrap(), Scalar::Int(expected));
            }
        }
    }
}
