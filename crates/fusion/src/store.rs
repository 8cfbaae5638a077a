//! Shared snapshot store.
//!
//! One mutex guards the whole snapshot, so readers always see a
//! point-in-time copy and a partial update is applied atomically.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::trace;
use vigil_core::{Instant, SensorSnapshot, SensorUpdate};

/// Latest-value cache for every sensor channel.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    inner: Mutex<SensorSnapshot>,
}

impl SnapshotStore {
    /// Create a store holding the startup snapshot (all flags clear, no readings).
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the fields carried by `update` and timestamp the change.
    ///
    /// Returns false if the update carried no fields.
    pub fn update(&self, update: &SensorUpdate, now: Instant) -> bool {
        let applied = self.lock().apply(update, now);
        if applied {
            trace!(?update, "snapshot updated");
        }
        applied
    }

    /// Consistent copy of the current snapshot.
    pub fn read(&self) -> SensorSnapshot {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, SensorSnapshot> {
        // Poisoned snapshots are still whole: no code panics mid-merge.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
