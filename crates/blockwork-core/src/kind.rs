//! Element kinds, their storage primitives, and buffer sizing.
//!
//! An [`ElementKind`] is the logical type of one array element. It is
//! stored as a run of [`Primitive`] entities: most kinds use exactly one
//! entity per element, `Bit` packs 64 elements into one `u64` word, and
//! the complex kinds use two float entities per element.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::scalar::Scalar;

/// Machine storage type of one buffer entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// One byte, zero or one.
    Bool,
    /// Signed 8-bit integer.
    I8,
    /// Unsigned 8-bit integer.
    U8,
    /// Signed 16-bit integer.
    I16,
    /// Unsigned 16-bit integer.
    U16,
    /// Signed 32-bit integer.
    I32,
    /// Unsigned 32-bit integer.
    U32,
    /// Signed 64-bit integer.
    I64,
    /// Unsigned 64-bit integer.
    U64,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
}

impl Primitive {
    /// Bytes per entity.
    pub fn byte_width(self) -> usize {
        match self {
            Self::Bool | Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    /// Whether the primitive is a float type.
    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Lower-case name, as accepted by [`ElementKind::from_str`].
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "int8",
            Self::U8 => "uint8",
            Self::I16 => "int16",
            Self::U16 => "uint16",
            Self::I32 => "int32",
            Self::U32 => "uint32",
            Self::I64 => "int64",
            Self::U64 => "uint64",
            Self::F32 => "float32",
            Self::F64 => "float64",
        }
    }

    /// Decode entity `i` of `bytes` (little-endian).
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than `(i + 1) * byte_width()`.
    pub fn read(self, bytes: &[u8], i: usize) -> Scalar {
        let w = self.byte_width();
        let b = &bytes[i * w..(i + 1) * w];
        match self {
            Self::Bool => Scalar::UInt(u64::from(b[0] != 0)),
            Self::I8 => Scalar::Int(i64::from(b[0] as i8)),
            Self::U8 => Scalar::UInt(u64::from(b[0])),
            Self::I16 => Scalar::Int(i64::from(i16::from_le_bytes([b[0], b[1]]))),
            Self::U16 => Scalar::UInt(u64::from(u16::from_le_bytes([b[0], b[1]]))),
            Self::I32 => Scalar::Int(i64::from(i32::from_le_bytes(word4(b)))),
            Self::U32 => Scalar::UInt(u64::from(u32::from_le_bytes(word4(b)))),
            Self::I64 => Scalar::Int(i64::from_le_bytes(word8(b))),
            Self::U64 => Scalar::UInt(u64::from_le_bytes(word8(b))),
            Self::F32 => Scalar::Float(f64::from(f32::from_le_bytes(word4(b)))),
            Self::F64 => Scalar::Float(f64::from_le_bytes(word8(b))),
        }
    }

    /// Encode `value` into entity `i` of `bytes` (little-endian), converting
    /// with `as`-cast semantics: floats truncate toward zero and saturate
    /// when stored into integers, `Bool` stores `value != 0`.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than `(i + 1) * byte_width()`.
    pub fn write(self, bytes: &mut [u8], i: usize, value: Scalar) {
        let w = self.byte_width();
        let b = &mut bytes[i * w..(i + 1) * w];
        match self {
            Self::Bool => b[0] = u8::from(!value.is_zero()),
            Self::I8 => b.copy_from_slice(&value.cast_i64().map_or_else(|f| f as i8, |v| v as i8).to_le_bytes()),
            Self::U8 => b.copy_from_slice(&value.cast_i64().map_or_else(|f| f as u8, |v| v as u8).to_le_bytes()),
            Self::I16 => b.copy_from_slice(&value.cast_i64().map_or_else(|f| f as i16, |v| v as i16).to_le_bytes()),
            Self::U16 => b.copy_from_slice(&value.cast_i64().map_or_else(|f| f as u16, |v| v as u16).to_le_bytes()),
            Self::I32 => b.copy_from_slice(&value.cast_i64().map_or_else(|f| f as i32, |v| v as i32).to_le_bytes()),
            Self::U32 => b.copy_from_slice(&value.cast_i64().map_or_else(|f| f as u32, |v| v as u32).to_le_bytes()),
            Self::I64 => b.copy_from_slice(&value.cast_i64().map_or_else(|f| f as i64, |v| v).to_le_bytes()),
            Self::U64 => b.copy_from_slice(&value.cast_u64().to_le_bytes()),
            Self::F32 => b.copy_from_slice(&(value.to_f64() as f32).to_le_bytes()),
            Self::F64 => b.copy_from_slice(&value.to_f64().to_le_bytes()),
        }
    }
}

fn word4(b: &[u8]) -> [u8; 4] {
    [b[0], b[1], b[2], b[3]]
}

fn word8(b: &[u8]) -> [u8; 8] {
    [b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Storage entities per logical element, as an exact ratio.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Fraction {
    /// Numerator.
    pub numerator: u64,
    /// Denominator, never zero.
    pub denominator: u64,
}

impl Fraction {
    /// One entity per element.
    pub const ONE: Fraction = Fraction {
        numerator: 1,
        denominator: 1,
    };

    /// `ceil(count * self)`.
    pub fn mul_ceil(self, count: u64) -> u64 {
        let n = u128::from(count) * u128::from(self.numerator);
        n.div_ceil(u128::from(self.denominator)) as u64
    }

    /// The ratio as a float.
    pub fn ratio(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

/// Logical type of one array element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Boolean, one byte per element.
    Bool,
    /// Signed 8-bit integer.
    I8,
    /// Unsigned 8-bit integer.
    U8,
    /// Signed 16-bit integer.
    I16,
    /// Unsigned 16-bit integer.
    U16,
    /// Signed 32-bit integer.
    I32,
    /// Unsigned 32-bit integer.
    U32,
    /// Signed 64-bit integer.
    I64,
    /// Unsigned 64-bit integer.
    U64,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
    /// Single bit, packed 64 to a `u64` word.
    Bit,
    /// Complex number of two `f32` entities (real, imaginary).
    Complex32,
    /// Complex number of two `f64` entities (real, imaginary).
    Complex64,
}

impl ElementKind {
    /// Every supported kind.
    pub const ALL: [ElementKind; 14] = [
        Self::Bool,
        Self::I8,
        Self::U8,
        Self::I16,
        Self::U16,
        Self::I32,
        Self::U32,
        Self::I64,
        Self::U64,
        Self::F32,
        Self::F64,
        Self::Bit,
        Self::Complex32,
        Self::Complex64,
    ];

    /// Primitive the kind is stored as.
    pub fn storage(self) -> Primitive {
        match self {
            Self::Bool => Primitive::Bool,
            Self::I8 => Primitive::I8,
            Self::U8 => Primitive::U8,
            Self::I16 => Primitive::I16,
            Self::U16 => Primitive::U16,
            Self::I32 => Primitive::I32,
            Self::U32 => Primitive::U32,
            Self::I64 => Primitive::I64,
            Self::U64 | Self::Bit => Primitive::U64,
            Self::F32 | Self::Complex32 => Primitive::F32,
            Self::F64 | Self::Complex64 => Primitive::F64,
        }
    }

    /// Storage entities per element.
    pub fn entities_per_element(self) -> Fraction {
        match self {
            Self::Bit => Fraction {
                numerator: 1,
                denominator: 64,
            },
            Self::Complex32 | Self::Complex64 => Fraction {
                numerator: 2,
                denominator: 1,
            },
            _ => Fraction::ONE,
        }
    }

    /// Bytes per storage entity.
    pub fn byte_width(self) -> usize {
        self.storage().byte_width()
    }

    /// Whether elements and storage entities are not one-to-one.
    pub fn is_packed(self) -> bool {
        self.entities_per_element() != Fraction::ONE
    }

    /// Storage entities needed for `count` elements, rounded up.
    pub fn entity_count(self, count: usize) -> usize {
        self.entities_per_element().mul_ceil(count as u64) as usize
    }

    /// Bytes needed to store `count` elements.
    ///
    /// Equal to `ceil(count * byte_width * entities_per_element)` whenever
    /// `count * entities_per_element` is integral; `Bit` buffers round up to
    /// whole words.
    pub fn buffer_len(self, count: usize) -> usize {
        self.entity_count(count) * self.byte_width()
    }

    /// Check that `storage` is the primitive this kind is stored as.
    pub fn check_storage(self, storage: Primitive) -> Result<(), ConfigError> {
        if self.storage() == storage {
            Ok(())
        } else {
            Err(ConfigError::StorageMismatch {
                kind: self,
                storage,
            })
        }
    }

    /// Canonical lower-case name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bit => "bit",
            Self::Complex32 => "complex64",
            Self::Complex64 => "complex128",
            other => other.storage().name(),
        }
    }

    /// Read element `i` of `bytes`. Complex elements yield their real part.
    pub fn read(self, bytes: &[u8], i: usize) -> Scalar {
        match self {
            Self::Bit => {
                let word = match Primitive::U64.read(bytes, i / 64) {
                    Scalar::UInt(w) => w,
                    _ => 0,
                };
                Scalar::UInt((word >> (i % 64)) & 1)
            }
            Self::Complex32 | Self::Complex64 => self.storage().read(bytes, 2 * i),
            other => other.storage().read(bytes, i),
        }
    }

    /// Write element `i` of `bytes`. Complex elements store `value` as the
    /// real part and zero as the imaginary part.
    pub fn write(self, bytes: &mut [u8], i: usize, value: Scalar) {
        match self {
            Self::Bit => {
                let word = match Primitive::U64.read(bytes, i / 64) {
                    Scalar::UInt(w) => w,
                    _ => 0,
                };
                let mask = 1u64 << (i % 64);
                let word = if value.is_zero() { word & !mask } else { word | mask };
                Primitive::U64.write(bytes, i / 64, Scalar::UInt(word));
            }
            Self::Complex32 | Self::Complex64 => {
                self.storage().write(bytes, 2 * i, value);
                self.storage().write(bytes, 2 * i + 1, Scalar::Float(0.0));
            }
            other => other.storage().write(bytes, i, value),
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ElementKind {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, ConfigError> {
        let kind = match name.to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Self::Bool,
            "int8" | "i8" | "byte" => Self::I8,
            "uint8" | "u8" | "char" => Self::U8,
            "int16" | "i16" | "short" => Self::I16,
            "uint16" | "u16" => Self::U16,
            "int32" | "i32" | "int" => Self::I32,
            "uint32" | "u32" => Self::U32,
            "int64" | "i64" | "long" => Self::I64,
            "uint64" | "u64" => Self::U64,
            "float32" | "f32" | "float" => Self::F32,
            "float64" | "f64" | "double" => Self::F64,
            "bit" => Self::Bit,
            "complex64" | "c64" => Self::Complex32,
            "complex128" | "c128" => Self::Complex64,
            _ => {
                return Err(ConfigError::UnsupportedElementKind {
                    name: name.to_string(),
                })
            }
        };
        Ok(kind)
    }
}
