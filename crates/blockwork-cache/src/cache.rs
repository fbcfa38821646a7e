//! Bounded cell cache with at-most-one concurrent computation per key.
//!
//! [`CellCache`] maps cell indices to loaded [`Cell`]s. Each key owns a
//! slot with its own lock: the first caller for a key runs the loader
//! while holding the slot lock, and concurrent callers for the same key
//! block on that lock and then observe the loaded cell. Callers for
//! different keys never contend beyond a short map lookup.
//!
//! Eviction is least-recently-used over idle slots. A slot whose load is
//! in flight is never evicted. Evicted cells stay alive for as long as a
//! caller (or a borrowed input view) still holds their `Arc`.
//!
//! Load failures are not cached: the slot is removed and the next request
//! for that key retries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use indexmap::IndexMap;

use blockwork_core::{ConfigError, LoadError};

use crate::cell::Cell;

type Slot = Arc<Mutex<Option<Arc<Cell>>>>;

/// Counters describing cache behavior since construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests served by an already-loaded cell.
    pub hits: u64,
    /// Requests that ran the loader.
    pub loads: u64,
    /// Cells dropped to respect the capacity.
    pub evictions: u64,
}

/// Bounded, thread-safe cell cache.
#[derive(Debug)]
pub struct CellCache {
    capacity: usize,
    slots: Mutex<IndexMap<u64, Slot>>,
    hits: AtomicU64,
    loads: AtomicU64,
    evictions: AtomicU64,
}

impl CellCache {
    /// Cache holding at most `capacity` loaded cells.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroCacheCapacity);
        }
        Ok(Self {
            capacity,
            slots: Mutex::new(IndexMap::new()),
            hits: AtomicU64::new(0),
            loads: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        })
    }

    /// Maximum number of resident cells.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of resident slots, including in-flight loads.
    pub fn len(&self) -> usize {
        self.lock_slots().len()
    }

    /// Whether no slots are resident.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The loaded cell for `index`, without loading or touching recency.
    pub fn peek(&self, index: u64) -> Option<Arc<Cell>> {
        let slot = self.lock_slots().get(&index).cloned()?;
        let loaded = slot.try_lock().ok()?.clone();
        loaded
    }

    /// The cell for `index`, running `load` if it is not resident.
    ///
    /// `load` runs at most once per resident key at a time; concurrent
    /// callers for the same key wait for it and share its result.
    pub fn get_or_load<F>(&self, index: u64, load: F) -> Result<Arc<Cell>, LoadError>
    where
        F: FnOnce() -> Result<Cell, LoadError>,
    {
        let slot = self.touch(index);
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cell) = guard.as_ref() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(cell));
        }

        self.loads.fetch_add(1, Ordering::Relaxed);
        match load() {
            Ok(cell) => {
                let cell = Arc::new(cell);
                *guard = Some(Arc::clone(&cell));
                drop(guard);
                self.evict_to_capacity();
                Ok(cell)
            }
            Err(e) => {
                drop(guard);
                let mut slots = self.lock_slots();
                if slots.get(&index).is_some_and(|s| Arc::ptr_eq(s, &slot)) {
                    slots.shift_remove(&index);
                }
                Err(e)
            }
        }
    }

    /// Drop the cell for `index`, if resident and not loading.
    pub fn invalidate(&self, index: u64) -> bool {
        let mut slots = self.lock_slots();
        let idle = slots.get(&index).is_some_and(|s| s.try_lock().is_ok());
        idle && slots.shift_remove(&index).is_some()
    }

    /// Drop every idle cell.
    pub fn clear(&self) {
        self.lock_slots().retain(|_, s| s.try_lock().is_err());
    }

    /// Counters since construction.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, IndexMap<u64, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Find or create the slot for `index` and mark it most recently used.
    fn touch(&self, index: u64) -> Slot {
        let mut slots = self.lock_slots();
        match slots.get_index_of(&index) {
            Some(i) => {
                let last = slots.len() - 1;
                slots.move_index(i, last);
                Arc::clone(&slots[last])
            }
            None => {
                let slot: Slot = Arc::new(Mutex::new(None));
                slots.insert(index, Arc::clone(&slot));
                slot
            }
        }
    }

    fn evict_to_capacity(&self) {
        let mut slots = self.lock_slots();
        let mut i = 0;
        while slots.len() > self.capacity && i < slots.len() {
            let evictable = match slots.get_index(i) {
                Some((_, s)) => s.try_lock().map(|c| c.is_some()).unwrap_or(false),
                None => false,
            };
            if evictable {
                if let Some((index, _)) = slots.shift_remove_index(i) {
                    tracing::trace!(index, "evicted cell");
                }
                self.evictions.fetch_add(1, Ordering::Relaxed);
            } else {
                i += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockwork_core::{DataError, ElementKind, Interval, SharedBuffer};
    use std::sync::atomic::AtomicUsize;

    fn cell(index: u64) -> Cell {
        let interval = Interval::from_min_dims(&[index as i64], &[1]).unwrap();
        Cell::new(index, interval, ElementKind::U8, SharedBuffer::zeroed(1), true)
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(CellCache::new(0).unwrap_err(), ConfigError::ZeroCacheCapacity);
    }

    #[test]
    fn second_request_is_a_hit() {
        let cache = CellCache::new(4).unwrap();
        let a = cache.get_or_load(1, || Ok(cell(1))).unwrap();
        let b = cache
            .get_or_load(1, || panic!("loader must not run twice"))
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                loads: 1,
                evictions: 0
            }
        );
    }

    #[test]
    fn least_recently_used_is_evicted() {
        let cache = CellCache::new(2).unwrap();
        cache.get_or_load(0, || Ok(cell(0))).unwrap();
        cache.get_or_load(1, || Ok(cell(1))).unwrap();
        cache.get_or_load(0, || Ok(cell(0))).unwrap();
        cache.get_or_load(2, || Ok(cell(2))).unwrap();
        assert!(cache.peek(0).is_some());
        assert!(cache.peek(1).is_none());
        assert!(cache.peek(2).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn hits_refresh_recency_across_a_full_cache() {
        let cache = CellCache::new(64).unwrap();
        for i in 0..64 {
            cache.get_or_load(i, || Ok(cell(i))).unwrap();
        }
        // Touch the older half in reverse, so 32..64 become the oldest.
        for i in (0..32).rev() {
            cache.get_or_load(i, || panic!("resident cell reloaded")).unwrap();
        }
        for i in 64..96 {
            cache.get_or_load(i, || Ok(cell(i))).unwrap();
        }
        assert_eq!(cache.len(), 64);
        assert!((0..32).all(|i| cache.peek(i).is_some()));
        assert!((32..64).all(|i| cache.peek(i).is_none()));
        assert!((64..96).all(|i| cache.peek(i).is_some()));
        assert_eq!(cache.stats().evictions, 32);

        // The most recent hit survives the next eviction; index 31 goes.
        cache.get_or_load(31, || panic!("resident cell reloaded")).unwrap();
        cache.get_or_load(96, || Ok(cell(96))).unwrap();
        assert!(cache.peek(31).is_some());
        assert!(cache.peek(30).is_none());
    }

    #[test]
    fn evicted_cells_stay_alive_while_held() {
        let cache = CellCache::new(1).unwrap();
        let held = cache.get_or_load(0, || Ok(cell(0))).unwrap();
        cache.get_or_load(1, || Ok(cell(1))).unwrap();
        assert!(cache.peek(0).is_none());
        held.data().set(ElementKind::U8, 0, 5u64.into());
        assert_eq!(held.to_f64_vec(), vec![5.0]);
    }

    #[test]
    fn failures_are_not_cached() {
        let cache = CellCache::new(2).unwrap();
        let err = cache
            .get_or_load(3, || {
                Err(LoadError::Data(DataError::Unavailable {
                    reason: "offline".into(),
                }))
            })
            .unwrap_err();
        assert!(matches!(err, LoadError::Data(_)));
        assert!(cache.is_empty());
        assert!(cache.get_or_load(3, || Ok(cell(3))).is_ok());
    }

    #[test]
    fn concurrent_requests_for_one_key_load_once() {
        let cache = Arc::new(CellCache::new(8).unwrap());
        let runs = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let runs = Arc::clone(&runs);
                std::thread::spawn(move || {
                    cache
                        .get_or_load(7, || {
                            runs.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(20));
                            Ok(cell(7))
                        })
                        .unwrap()
                })
            })
            .collect();
        let cells: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(cells.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn invalidate_and_clear() {
        let cache = CellCache::new(4).unwrap();
        cache.get_or_load(0, || Ok(cell(0))).unwrap();
        cache.get_or_load(1, || Ok(cell(1))).unwrap();
        assert!(cache.invalidate(0));
        assert!(!cache.invalidate(0));
        cache.clear();
        assert!(cache.is_empty());
    }
}
