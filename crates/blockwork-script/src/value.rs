//! Runtime values and strided array views.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use blockwork_core::{ArrayBinding, CropSlice, Primitive, Scalar, SharedBuffer};

use crate::builtins::Builtin;
use crate::error::{index_error, ScriptError};

/// Backing store of an array.
#[derive(Clone, Debug)]
pub(crate) enum Storage {
    /// Script-allocated `f64` values.
    Local(Rc<RefCell<Vec<f64>>>),
    /// Host buffer, read and written through its lock.
    Shared {
        buffer: SharedBuffer,
        primitive: Primitive,
    },
}

/// A strided, row-major window onto a [`Storage`]. Clones alias.
#[derive(Clone, Debug)]
pub(crate) struct ArrayRef {
    storage: Storage,
    offset: usize,
    shape: Vec<usize>,
    strides: Vec<usize>,
}

/// One resolved subscript.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Sub {
    Ellipsis,
    Index(i64),
    Range(Option<i64>, Option<i64>),
}

fn to_scalar(v: f64) -> Scalar {
    if v.fract() == 0.0 && v.abs() < 9.0e18 {
        Scalar::Int(v as i64)
    } else {
        Scalar::Float(v)
    }
}

fn contiguous_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for d in (0..shape.len().saturating_sub(1)).rev() {
        strides[d] = strides[d + 1] * shape[d + 1];
    }
    strides
}

impl ArrayRef {
    pub(crate) fn local(shape: Vec<usize>, data: Vec<f64>) -> Self {
        debug_assert_eq!(shape.iter().product::<usize>(), data.len());
        Self {
            storage: Storage::Local(Rc::new(RefCell::new(data))),
            offset: 0,
            strides: contiguous_strides(&shape),
            shape,
        }
    }

    /// View a host buffer. Fails if the buffer is too short for the shape.
    pub(crate) fn shared(binding: ArrayBinding) -> Result<Self, String> {
        let needed = binding.len() * binding.primitive.byte_width();
        let available = binding.buffer.len();
        if available < needed {
            return Err(format!(
                "buffer of {available} bytes cannot hold shape {:?} of {}",
                binding.shape.as_slice(),
                binding.primitive
            ));
        }
        let shape: Vec<usize> = binding.shape.to_vec();
        Ok(Self {
            storage: Storage::Shared {
                buffer: binding.buffer,
                primitive: binding.primitive,
            },
            offset: 0,
            strides: contiguous_strides(&shape),
            shape,
        })
    }

    pub(crate) fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub(crate) fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.shape.iter().product()
    }

    /// The host binding this view covers exactly, if it is an unsliced
    /// view of a whole shared buffer.
    pub(crate) fn as_binding(&self) -> Option<ArrayBinding> {
        match &self.storage {
            Storage::Shared { buffer, primitive }
                if self.offset == 0
                    && self.strides == contiguous_strides(&self.shape)
                    && self.len() * primitive.byte_width() == buffer.len() =>
            {
                Some(ArrayBinding {
                    buffer: buffer.clone(),
                    primitive: *primitive,
                    shape: self.shape.iter().copied().collect(),
                })
            }
            _ => None,
        }
    }

    /// Storage offsets of every element, row-major.
    fn offsets(&self) -> Vec<usize> {
        let n = self.len();
        let mut out = Vec::with_capacity(n);
        if n == 0 {
            return out;
        }
        let ndim = self.ndim();
        let mut idx = vec![0usize; ndim];
        let mut off = self.offset;
        loop {
            out.push(off);
            let mut d = ndim;
            loop {
                if d == 0 {
                    return out;
                }
                d -= 1;
                idx[d] += 1;
                off += self.strides[d];
                if idx[d] < self.shape[d] {
                    break;
                }
                off -= self.strides[d] * self.shape[d];
                idx[d] = 0;
            }
        }
    }

    /// Copy every element out, row-major, under one lock acquisition.
    pub(crate) fn to_vec(&self) -> Vec<f64> {
        let offsets = self.offsets();
        match &self.storage {
            Storage::Local(data) => {
                let data = data.borrow();
                offsets.iter().map(|&o| data[o]).collect()
            }
            Storage::Shared { buffer, primitive } => buffer.read(|bytes| {
                offsets
                    .iter()
                    .map(|&o| primitive.read(bytes, o).to_f64())
                    .collect()
            }),
        }
    }

    /// Overwrite every element, row-major, under one lock acquisition.
    ///
    /// Integral values convert like integers (wrapping into narrower
    /// integer storage); fractional values truncate toward zero and
    /// saturate.
    pub(crate) fn assign(&self, values: &[f64]) {
        debug_assert_eq!(values.len(), self.len());
        let offsets = self.offsets();
        match &self.storage {
            Storage::Local(data) => {
                let mut data = data.borrow_mut();
                for (&o, &v) in offsets.iter().zip(values) {
                    data[o] = v;
                }
            }
            Storage::Shared { buffer, primitive } => buffer.write(|bytes| {
                for (&o, &v) in offsets.iter().zip(values) {
                    primitive.write(bytes, o, to_scalar(v));
                }
            }),
        }
    }

    /// Apply `subs` and return the resulting view.
    pub(crate) fn view(&self, subs: &[Sub]) -> Result<ArrayRef, ScriptError> {
        let ellipses = subs.iter().filter(|s| **s == Sub::Ellipsis).count();
        if ellipses > 1 {
            return Err(index_error("an index can only have a single ellipsis ('...')"));
        }
        let consuming = subs.len() - ellipses;
        if consuming > self.ndim() {
            return Err(index_error(format!(
                "too many indices: array is {}-dimensional, but {consuming} were indexed",
                self.ndim()
            )));
        }
        let fill = self.ndim() - consuming;
        let mut expanded: Vec<Sub> = Vec::with_capacity(self.ndim());
        for &s in subs {
            if s == Sub::Ellipsis {
                expanded.extend(std::iter::repeat(Sub::Range(None, None)).take(fill));
            } else {
                expanded.push(s);
            }
        }
        if ellipses == 0 {
            expanded.extend(std::iter::repeat(Sub::Range(None, None)).take(fill));
        }

        let mut offset = self.offset;
        let mut shape = Vec::new();
        let mut strides = Vec::new();
        for (d, sub) in expanded.into_iter().enumerate() {
            let n = self.shape[d] as i64;
            match sub {
                Sub::Index(i) => {
                    let i = if i < 0 { i + n } else { i };
                    if i < 0 || i >= n {
                        return Err(index_error(format!(
                            "index {i} is out of bounds for axis {d} with size {n}"
                        )));
                    }
                    offset += i as usize * self.strides[d];
                }
                Sub::Range(start, stop) => {
                    let clamp = |v: i64| (if v < 0 { v + n } else { v }).clamp(0, n);
                    let start = start.map_or(0, clamp);
                    let stop = stop.map_or(n, clamp);
                    let len = (stop - start).max(0) as usize;
                    if len > 0 {
                        offset += start as usize * self.strides[d];
                    }
                    shape.push(len);
                    strides.push(self.strides[d]);
                }
                Sub::Ellipsis => unreachable!("ellipsis expanded above"),
            }
        }
        Ok(ArrayRef {
            storage: self.storage.clone(),
            offset,
            shape,
            strides,
        })
    }
}

/// A record type declared with `record Name(fields)`.
#[derive(Debug)]
pub(crate) struct RecordType {
    pub name: String,
    pub fields: Vec<String>,
}

/// An instance of a [`RecordType`].
#[derive(Debug)]
pub(crate) struct Record {
    pub ty: Rc<RecordType>,
    pub values: Vec<Value>,
}

impl Record {
    pub(crate) fn field(&self, name: &str) -> Option<&Value> {
        let i = self.ty.fields.iter().position(|f| f == name)?;
        self.values.get(i)
    }
}

/// A kernel-script value.
#[derive(Clone, Debug)]
pub(crate) enum Value {
    None,
    Number(f64),
    Str(Rc<str>),
    List(Rc<Vec<Value>>),
    Slices(Rc<[CropSlice]>),
    Array(ArrayRef),
    Record(Rc<Record>),
    RecordType(Rc<RecordType>),
    Builtin(Builtin),
}

impl Value {
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Number(_) => "number",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Slices(_) => "slices",
            Self::Array(_) => "array",
            Self::Record(_) => "record",
            Self::RecordType(_) => "record type",
            Self::Builtin(_) => "builtin",
        }
    }
}

fn fmt_number(f: &mut fmt::Formatter<'_>, v: f64) -> fmt::Result {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        write!(f, "{}", v as i64)
    } else {
        write!(f, "{v}")
    }
}

fn fmt_nested(f: &mut fmt::Formatter<'_>, shape: &[usize], data: &[f64]) -> fmt::Result {
    match shape.split_first() {
        None => fmt_number(f, data.first().copied().unwrap_or(f64::NAN)),
        Some((&n, rest)) => {
            let chunk: usize = rest.iter().product();
            f.write_str("[")?;
            for i in 0..n {
                if i > 0 {
                    f.write_str(", ")?;
                }
                fmt_nested(f, rest, &data[i * chunk..(i + 1) * chunk])?;
            }
            f.write_str("]")
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Number(v) => fmt_number(f, *v),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Slices(slices) => {
                f.write_str("(")?;
                for (i, s) in slices.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}:{}", s.offset, s.end())?;
                }
                f.write_str(")")
            }
            Self::Array(a) => fmt_nested(f, a.shape(), &a.to_vec()),
            Self::Record(r) => {
                write!(f, "{}(", r.ty.name)?;
                for (i, (name, value)) in r.ty.fields.iter().zip(&r.values).enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}={value}")?;
                }
                f.write_str(")")
            }
            Self::RecordType(t) => write!(f, "<record {}>", t.name),
            Self::Builtin(b) => write!(f, "<builtin {}>", b.name()),
        }
    }
}
