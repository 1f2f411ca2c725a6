//! Diagnostic counters for cache pressure.
//!
//! Two saturating 32-bit counters shared by every interface of a resolver:
//! entries evicted to make room for a new mapping, and insertions dropped
//! because every slot was locked or otherwise ineligible.

use core::sync::atomic::{AtomicU32, Ordering};

/// Cache-pressure counters with get-and-reset semantics.
#[derive(Debug, Default)]
pub struct ArpCounters {
    replaced: AtomicU32,
    dropped_all_locked: AtomicU32,
}

impl ArpCounters {
    pub const fn new() -> Self {
        ArpCounters {
            replaced: AtomicU32::new(0),
            dropped_all_locked: AtomicU32::new(0),
        }
    }

    /// Record a `Reachable` entry evicted for a new mapping.
    #[inline]
    pub fn inc_replaced(&self) {
        saturating_inc(&self.replaced);
    }

    /// Record an insertion that found no usable slot.
    #[inline]
    pub fn inc_dropped_all_locked(&self) {
        saturating_inc(&self.dropped_all_locked);
    }

    /// Current values as `(replaced, dropped_all_locked)`.
    pub fn get(&self) -> (u32, u32) {
        (
            self.replaced.load(Ordering::Relaxed),
            self.dropped_all_locked.load(Ordering::Relaxed),
        )
    }

    /// Read both counters and reset them to zero.
    ///
    /// Each counter is swapped individually; an increment racing with the
    /// reset lands in exactly one of the two reads.
    pub fn get_and_reset(&self) -> (u32, u32) {
        (
            self.replaced.swap(0, Ordering::Relaxed),
            self.dropped_all_locked.swap(0, Ordering::Relaxed),
        )
    }
}

#[inline]
fn saturating_inc(counter: &AtomicU32) {
    counter
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
            Some(current.saturating_add(1))
        })
        .ok();
}
