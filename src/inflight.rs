//! In-flight flags for operations that must not overlap.
//!
//! A flag is claimed with `try_claim`, which hands back a guard; dropping the guard
//! releases the flag whether the operation succeeded, failed or was cancelled.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Exclusive flag: at most one holder at a time.
#[derive(Clone, Default, Debug)]
pub struct InFlight {
    busy: Arc<AtomicBool>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Returns `None` if another operation already holds the flag.
    pub fn try_claim(&self) -> Option<InFlightGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard {
                busy: Arc::clone(&self.busy),
            })
    }
}

#[derive(Debug)]
pub struct InFlightGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Counting flag for operations that may overlap (list fetches); active while any
/// holder is alive.
#[derive(Clone, Default, Debug)]
pub struct InFlightCounter {
    count: Arc<AtomicUsize>,
}

impl InFlightCounter {
    pub fn is_active(&self) -> bool {
        self.count.load(Ordering::Acquire) > 0
    }

    pub fn enter(&self) -> CounterGuard {
        self.count.fetch_add(1, Ordering::AcqRel);
        CounterGuard {
            count: Arc::clone(&self.count),
        }
    }
}

#[derive(Debug)]
pub struct CounterGuard {
    count: Arc<AtomicUsize>,
}

impl Drop for CounterGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::AcqRel);
    }
}
