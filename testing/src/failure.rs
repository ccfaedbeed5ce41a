//! Failure injection shared by the in-memory collaborators.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Decides whether the next call to a fake should fail.
///
/// Either a countdown of upcoming failures or a permanent outage.
#[derive(Debug, Default)]
pub struct FailureSwitch {
    remaining: AtomicUsize,
    always: AtomicBool,
}

impl FailureSwitch {
    /// Fail the next `count` calls.
    pub fn fail_next(&self, count: usize) {
        self.remaining.store(count, Ordering::SeqCst);
    }

    /// Fail every call until [`FailureSwitch::reset`].
    pub fn fail_always(&self) {
        self.always.store(true, Ordering::SeqCst);
    }

    /// Stop failing.
    pub fn reset(&self) {
        self.remaining.store(0, Ordering::SeqCst);
        self.always.store(false, Ordering::SeqCst);
    }

    /// Consume one failure if armed.
    pub fn trip(&self) -> bool {
        if self.always.load(Ordering::SeqCst) {
            return true;
        }
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}
