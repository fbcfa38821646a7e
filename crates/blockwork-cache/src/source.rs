//! Random-access element sources.

use std::fmt;
use std::sync::Arc;

use blockwork_core::{ConfigError, DataError, ElementKind, Interval, Scalar, SharedBuffer};

/// Anything that can produce an element at an integer position.
///
/// Bounded sources report their [`domain`](RandomAccess::domain); reads
/// outside it fail with [`DataError::OutOfBounds`] unless the source is
/// wrapped in an [`Extended`](crate::Extended) policy.
pub trait RandomAccess: Send + Sync {
    /// Number of dimensions.
    fn num_dims(&self) -> usize;

    /// Kind of the elements this source produces.
    fn element_kind(&self) -> ElementKind;

    /// The element at `position`.
    fn read(&self, position: &[i64]) -> Result<Scalar, DataError>;

    /// The interval the source is defined on, or `None` if unbounded.
    fn domain(&self) -> Option<Interval> {
        None
    }
}

impl<T: RandomAccess + ?Sized> RandomAccess for Arc<T> {
    fn num_dims(&self) -> usize {
        (**self).num_dims()
    }

    fn element_kind(&self) -> ElementKind {
        (**self).element_kind()
    }

    fn read(&self, position: &[i64]) -> Result<Scalar, DataError> {
        (**self).read(position)
    }

    fn domain(&self) -> Option<Interval> {
        (**self).domain()
    }
}

pub(crate) fn check_rank(expected: usize, position: &[i64]) -> Result<(), DataError> {
    if position.len() == expected {
        Ok(())
    } else {
        Err(DataError::DimensionMismatch {
            expected,
            actual: position.len(),
        })
    }
}

// ── DenseArray ─────────────────────────────────────────────────────

/// An in-memory array over an interval, dimension 0 fastest.
#[derive(Clone, Debug)]
pub struct DenseArray {
    interval: Interval,
    kind: ElementKind,
    data: SharedBuffer,
}

impl DenseArray {
    /// Zero-filled array over `[0, dims)`.
    pub fn zeros(dims: &[usize], kind: ElementKind) -> Result<Self, ConfigError> {
        Self::zeros_over(Interval::zero_based(dims)?, kind)
    }

    /// Zero-filled array over `interval`.
    pub fn zeros_over(interval: Interval, kind: ElementKind) -> Result<Self, ConfigError> {
        let data = SharedBuffer::zeroed(kind.buffer_len(interval.num_elements()));
        Ok(Self {
            interval,
            kind,
            data,
        })
    }

    /// Array over `[0, dims)` whose element at `p` is `f(p)`.
    pub fn from_fn(
        dims: &[usize],
        kind: ElementKind,
        f: impl Fn(&[i64]) -> Scalar,
    ) -> Result<Self, ConfigError> {
        let array = Self::zeros(dims, kind)?;
        array.data.write(|bytes| {
            for (i, p) in array.interval.positions().enumerate() {
                kind.write(bytes, i, f(&p));
            }
        });
        Ok(array)
    }

    /// Array over `[0, dims)` from values listed dimension 0 fastest.
    pub fn from_values(dims: &[usize], kind: ElementKind, values: &[f64]) -> Result<Self, ConfigError> {
        let interval = Interval::zero_based(dims)?;
        if values.len() != interval.num_elements() {
            return Err(ConfigError::InvalidInterval {
                reason: format!(
                    "{} values for an interval of {} elements",
                    values.len(),
                    interval.num_elements()
                ),
            });
        }
        let array = Self::zeros_over(interval, kind)?;
        array.data.write(|bytes| {
            for (i, &v) in values.iter().enumerate() {
                kind.write(bytes, i, Scalar::Float(v));
            }
        });
        Ok(array)
    }

    /// The array's storage. Clones share it.
    pub fn data(&self) -> &SharedBuffer {
        &self.data
    }

    /// The interval the array covers.
    pub fn interval(&self) -> &Interval {
        &self.interval
    }

    /// Write the element at `position`.
    pub fn write(&self, position: &[i64], value: Scalar) -> Result<(), DataError> {
        let offset = self.offset(position)?;
        self.data.set(self.kind, offset, value);
        Ok(())
    }

    /// Every element as `f64`, dimension 0 fastest.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.data.to_f64_vec(self.kind, self.interval.num_elements())
    }

    fn offset(&self, position: &[i64]) -> Result<usize, DataError> {
        check_rank(self.interval.num_dims(), position)?;
        self.interval
            .linear_offset(position)
            .ok_or_else(|| DataError::OutOfBounds {
                position: position.to_vec(),
            })
    }
}

impl RandomAccess for DenseArray {
    fn num_dims(&self) -> usize {
        self.interval.num_dims()
    }

    fn element_kind(&self) -> ElementKind {
        self.kind
    }

    fn read(&self, position: &[i64]) -> Result<Scalar, DataError> {
        let offset = self.offset(position)?;
        Ok(self.data.get(self.kind, offset))
    }

    fn domain(&self) -> Option<Interval> {
        Some(self.interval.clone())
    }
}

// ── ConstantSource ─────────────────────────────────────────────────

/// The same value at every position. Unbounded.
#[derive(Clone, Debug)]
pub struct ConstantSource {
    num_dims: usize,
    kind: ElementKind,
    value: Scalar,
}

impl ConstantSource {
    /// Constant `value` of `kind` in `num_dims` dimensions.
    pub fn new(num_dims: usize, kind: ElementKind, value: impl Into<Scalar>) -> Self {
        Self {
            num_dims,
            kind,
            value: value.into(),
        }
    }
}

impl RandomAccess for ConstantSource {
    fn num_dims(&self) -> usize {
        self.num_dims
    }

    fn element_kind(&self) -> ElementKind {
        self.kind
    }

    fn read(&self, position: &[i64]) -> Result<Scalar, DataError> {
        check_rank(self.num_dims, position)?;
        Ok(self.value)
    }
}

// ── FnSource ───────────────────────────────────────────────────────

type ElementFn = dyn Fn(&[i64]) -> Result<Scalar, DataError> + Send + Sync;

/// Elements computed by a closure. Unbounded unless a domain is attached.
#[derive(Clone)]
pub struct FnSource {
    num_dims: usize,
    kind: ElementKind,
    domain: Option<Interval>,
    f: Arc<ElementFn>,
}

impl FnSource {
    /// Source whose element at `p` is `f(p)`.
    pub fn new<F>(num_dims: usize, kind: ElementKind, f: F) -> Self
    where
        F: Fn(&[i64]) -> Result<Scalar, DataError> + Send + Sync + 'static,
    {
        Self {
            num_dims,
            kind,
            domain: None,
            f: Arc::new(f),
        }
    }

    /// Restrict the source to `domain`; reads outside it fail.
    pub fn with_domain(mut self, domain: Interval) -> Result<Self, ConfigError> {
        if domain.num_dims() != self.num_dims {
            return Err(ConfigError::DimensionMismatch {
                expected: self.num_dims,
                actual: domain.num_dims(),
            });
        }
        self.domain = Some(domain);
        Ok(self)
    }
}

impl fmt::Debug for FnSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSource")
            .field("num_dims", &self.num_dims)
            .field("kind", &self.kind)
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

impl RandomAccess for FnSource {
    fn num_dims(&self) -> usize {
        self.num_dims
    }

    fn element_kind(&self) -> ElementKind {
        self.kind
    }

    fn read(&self, position: &[i64]) -> Result<Scalar, DataError> {
        check_rank(self.num_dims, position)?;
        if let Some(domain) = &self.domain {
            if !domain.contains(position) {
                return Err(DataError::OutOfBounds {
                    position: position.to_vec(),
                });
            }
        }
        (self.f)(position)
    }

    fn domain(&self) -> Option<Interval> {
        self.domain.clone()
    }
}
