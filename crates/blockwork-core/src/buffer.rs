//! Reference-counted byte storage shared between cells, views, and workers.

use std::sync::{Arc, PoisonError, RwLock};

use crate::kind::ElementKind;
use crate::scalar::Scalar;

/// Lock-protected bytes behind an `Arc`.
///
/// Cloning shares the storage. Every access takes the lock for the
/// duration of one closure, so a buffer aliased by a cell and by a
/// worker-side view is never read and written at the same time. Storage
/// lives as long as any clone does, regardless of cache eviction.
#[derive(Clone, Debug, Default)]
pub struct SharedBuffer {
    bytes: Arc<RwLock<Vec<u8>>>,
}

impl SharedBuffer {
    /// A zero-filled buffer of `len` bytes.
    pub fn zeroed(len: usize) -> Self {
        Self::from_vec(vec![0; len])
    }

    /// Take ownership of `bytes`.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(RwLock::new(bytes)),
        }
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.read(|b| b.len())
    }

    /// Whether the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` with shared access to the bytes.
    ///
    /// A writer that panicked mid-update leaves the bytes readable; the
    /// content is whatever it wrote before panicking.
    pub fn read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let guard = self.bytes.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Run `f` with exclusive access to the bytes.
    pub fn write<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut guard = self.bytes.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Whether both handles share the same storage.
    pub fn ptr_eq(&self, other: &SharedBuffer) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }

    /// Copy of the current bytes.
    pub fn to_vec(&self) -> Vec<u8> {
        self.read(<[u8]>::to_vec)
    }

    /// Read element `i` as `kind`.
    pub fn get(&self, kind: ElementKind, i: usize) -> Scalar {
        self.read(|b| kind.read(b, i))
    }

    /// Write element `i` as `kind`.
    pub fn set(&self, kind: ElementKind, i: usize, value: Scalar) {
        self.write(|b| kind.write(b, i, value));
    }

    /// Every element of a buffer holding `count` elements of `kind`, as `f64`.
    pub fn to_f64_vec(&self, kind: ElementKind, count: usize) -> Vec<f64> {
        self.read(|b| (0..count).map(|i| kind.read(b, i).to_f64()).collect())
    }
}
