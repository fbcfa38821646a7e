//! A single element value, independent of its storage kind.

/// One element read from or written to a buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scalar {
    /// Signed integer (also used for `Bool` when written by callers).
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point.
    Float(f64),
}

impl Scalar {
    /// The value as an `f64`.
    pub fn to_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::UInt(v) => v as f64,
            Self::Float(v) => v,
        }
    }

    /// Whether the value is zero.
    pub fn is_zero(self) -> bool {
        match self {
            Self::Int(v) => v == 0,
            Self::UInt(v) => v == 0,
            Self::Float(v) => v == 0.0,
        }
    }

    /// Integer values as `i64` (unsigned values wrap); floats are returned
    /// unchanged in `Err` so the caller can cast them to its target width.
    pub fn cast_i64(self) -> Result<i64, f64> {
        match self {
            Self::Int(v) => Ok(v),
            Self::UInt(v) => Ok(v as i64),
            Self::Float(v) => Err(v),
        }
    }

    /// The value as a `u64` with `as`-cast semantics.
    pub fn cast_u64(self) -> u64 {
        match self {
            Self::Int(v) => v as u64,
            Self::UInt(v) => v,
            Self::Float(v) => v as u64,
        }
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for Scalar {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}
