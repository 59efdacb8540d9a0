//! Per-layer locks.
//!
//! The store keeps no in-memory index, but check-then-act sequences such
//! as "is this layer pinned? then remove it" must not interleave with a
//! concurrent child creation or reference acquisition. Every mutating
//! operation locks the IDs it touches through this table.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use strata_core::layer::LayerId;

/// Table of per-ID mutexes, created on first use.
#[derive(Debug, Default)]
pub struct LockTable {
    locks: DashMap<LayerId, Arc<Mutex<()>>>,
}

/// Guards for a set of layer IDs, released on drop.
pub struct LayerLocks {
    _guards: Vec<ArcMutexGuard<RawMutex, ()>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock every ID in `ids`.
    ///
    /// IDs are locked in sorted order with duplicates collapsed, so two
    /// callers locking overlapping sets cannot deadlock.
    pub fn lock(&self, ids: &[&LayerId]) -> LayerLocks {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();

        let guards = ids
            .into_iter()
            .map(|id| {
                let mutex = self.locks.entry(id.clone()).or_default().clone();
                mutex.lock_arc()
            })
            .collect();

        LayerLocks { _guards: guards }
    }

    /// Number of IDs that have ever been locked.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
