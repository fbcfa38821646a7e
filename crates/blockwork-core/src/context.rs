//! The seam between a worker pool and an execution engine.
//!
//! An [`Engine`] is shared by every worker and creates one
//! [`ExecutionContext`] per worker, on that worker's thread. Contexts are
//! persistent and stateful: names bound or defined by one task remain
//! visible to later tasks on the same worker unless removed. Contexts need
//! not be `Send`.

use crate::buffer::SharedBuffer;
use crate::error::EngineError;
use crate::halo::CropSlice;
use crate::interval::Shape;
use crate::kind::{ElementKind, Primitive};

/// A host buffer exposed to a context as an N-dimensional array.
///
/// `shape` is in the worker's axis order, row-major: the last axis is
/// contiguous in memory.
#[derive(Clone, Debug)]
pub struct ArrayBinding {
    /// Backing storage, shared with the host.
    pub buffer: SharedBuffer,
    /// Storage primitive of each entity.
    pub primitive: Primitive,
    /// Row-major shape.
    pub shape: Shape,
}

impl ArrayBinding {
    /// Number of entities the shape addresses.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    /// Whether the shape addresses no entities.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A host value bound into, or read back out of, a context.
#[derive(Clone, Debug)]
pub enum Binding {
    /// One array.
    Array(ArrayBinding),
    /// An ordered sequence of arrays.
    Arrays(Vec<ArrayBinding>),
    /// An integer.
    Int(i64),
    /// A sequence of integers.
    Ints(Vec<i64>),
    /// A number.
    Float(f64),
    /// Crop slices, one per axis.
    Slices(Vec<CropSlice>),
}

impl Binding {
    /// Numeric value, if the binding is a scalar.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }
}

/// A persistent, stateful interpreter owned by exactly one worker.
pub trait ExecutionContext {
    /// Execute a code fragment. Its return value, if any, is discarded.
    fn exec(&mut self, code: &str) -> Result<(), EngineError>;

    /// Bind `value` to `name`, replacing any previous binding.
    fn bind(&mut self, name: &str, value: Binding) -> Result<(), EngineError>;

    /// Remove `name` if it is bound. Removing an unbound name is a no-op.
    fn unbind(&mut self, name: &str);

    /// Read `name` back as a host value, if it is bound and representable.
    fn lookup(&self, name: &str) -> Option<Binding>;

    /// Every bound name, sorted.
    fn names(&self) -> Vec<String>;
}

/// Factory for execution contexts, shared by all workers of a pool.
pub trait Engine: Send + Sync + 'static {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Create a fresh context. Called on the worker thread that will own it.
    fn create_context(&self) -> Result<Box<dyn ExecutionContext>, EngineError>;

    /// Code run in every fresh context before the user's init script. It
    /// must declare the `Block` record used by [`block_statement`](Engine::block_statement).
    fn prelude(&self) -> &str;

    /// Statement that assembles the `block` name from the `_buf`, `_inputs`,
    /// `_index`, `_min`, `_max`, `_dim`, and `_halo` bindings.
    fn block_statement(&self) -> &str;

    /// Whether buffers of `kind` can be bound into this engine's contexts.
    fn supports(&self, kind: ElementKind) -> bool {
        let _ = kind;
        true
    }
}
