use std::ptr;
use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot_core::{DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN, park, unpark_one};

const UNLOCKED: u8 = 0;
const LOCKED: u8 = 1;
// Locked, and some thread may be parked waiting for it.
const CONTENDED: u8 = 2;

/// A raw lock that parks waiting threads, without priority inheritance.
///
/// This is the lock used where no priority-inheriting primitive is available. Waiters are woken
/// in the order `parking_lot_core` queues them, regardless of their scheduling priority, so a
/// high-priority waiter may be delayed for as long as a preempted low-priority holder is.
#[derive(Debug)]
pub(crate) struct ParkLock {
    state: AtomicU8,
}

impl ParkLock {
    pub(crate) const PRIORITY_INHERITANCE: bool = false;

    pub(crate) const fn new() -> Self {
        Self {
            state: AtomicU8::new(UNLOCKED),
        }
    }

    #[inline]
    pub(crate) fn lock(&self) {
        if !self.try_lock() {
            self.lock_contended();
        }
    }

    #[inline]
    pub(crate) fn try_lock(&self) -> bool {
        self.state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[cold]
    fn lock_contended(&self) {
        loop {
            // Marking the lock contended before parking guarantees that the holder wakes someone
            // up on unlock. If it was unlocked in the meantime, we now hold it, just with a
            // possibly unnecessary wakeup on our own unlock.
            if self.state.swap(CONTENDED, Ordering::Acquire) == UNLOCKED {
                return;
            }

            // SAFETY: The key is the address of our own state, which stays valid while we are
            // parked because we are borrowed. The callbacks do not call into parking_lot_core.
            unsafe {
                park(
                    self.key(),
                    || self.state.load(Ordering::Relaxed) == CONTENDED,
                    || {},
                    |_, _| {},
                    DEFAULT_PARK_TOKEN,
                    None,
                );
            }
        }
    }

    /// Releases the lock. Must only be called by the current holder.
    #[inline]
    pub(crate) fn unlock(&self) {
        if self.state.swap(UNLOCKED, Ordering::Release) == CONTENDED {
            self.wake_one();
        }
    }

    #[cold]
    fn wake_one(&self) {
        // SAFETY: The key is the address of our own state. The callback does not call into
        // parking_lot_core.
        unsafe {
            unpark_one(self.key(), |_| DEFAULT_UNPARK_TOKEN);
        }
    }

    fn key(&self) -> usize {
        ptr::from_ref(&self.state).addr()
    }
}
