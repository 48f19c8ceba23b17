//! Shared run state for the concurrent lock-in tasks.
//!
//! One `Arc<RunState>` is created per session and handed to both the
//! sampling loop and the annotation listener at construction. The stop
//! flag is atomic; the marker log is mutex-guarded because the
//! post-processor may read it while a late console line is still being
//! recorded during shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::core::{Marker, MarkerLog};

/// The only mutable state shared across the session's tasks.
#[derive(Debug, Default)]
pub struct RunState {
    stop: AtomicBool,
    markers: Mutex<MarkerLog>,
}

impl RunState {
    /// A fresh state with the stop flag cleared and no markers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal every loop holding this state to end at its next check.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Whether a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Append a marker to the shared log.
    pub fn record_marker(&self, marker: Marker) {
        self.lock_markers().push(marker);
    }

    /// Snapshot of the marker log at this moment.
    pub fn markers(&self) -> MarkerLog {
        self.lock_markers().clone()
    }

    /// The lock only guards plain data, so a poisoned lock (a panicked
    /// task) still yields usable state.
    fn lock_markers(&self) -> MutexGuard<'_, MarkerLog> {
        match self.markers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
