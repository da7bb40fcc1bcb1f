use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

#[cfg(not(target_os = "linux"))]
type RawLock = crate::park_lock::ParkLock;
#[cfg(target_os = "linux")]
type RawLock = crate::pi_futex::PiFutex;

/// A mutex that bounds priority inversion where the platform allows it.
///
/// Handle pools are touched from time-sensitive control loops. With an ordinary mutex, a
/// low-priority thread that holds the lock and gets preempted by a medium-priority thread can
/// stall a high-priority waiter indefinitely. This mutex avoids that through priority
/// inheritance: while a thread waits, the holder runs at (at least) the waiter's priority.
///
/// # Platform support
///
/// * **Linux**: backed by a PI futex. The kernel applies priority inheritance and hands the lock
///   to the highest-priority waiter on unlock. If the kernel rejects PI futex operations,
///   waiters fall back to yielding in user space and a `debug` event is logged.
/// * **Other platforms**: backed by a parking mutex with **no** priority inheritance. Waiters are
///   served in queue order. [`PriorityMutex::PRIORITY_INHERITANCE`] is `false` on these
///   platforms so callers that require the guarantee can refuse to run.
///
/// The mutex is not reentrant, has no poisoning and exposes no timeouts. Critical sections guarded
/// by it are expected to be short.
///
/// # Examples
///
/// ```
/// use handle_pool::PriorityMutex;
///
/// let counter = PriorityMutex::new(0_u32);
///
/// *counter.lock() += 1;
/// assert_eq!(*counter.lock(), 1);
/// ```
pub struct PriorityMutex<T> {
    raw: RawLock,
    data: UnsafeCell<T>,
}

// SAFETY: Moving the mutex moves the T inside it, so T must be Send.
unsafe impl<T: Send> Send for PriorityMutex<T> {}
// SAFETY: The mutex hands out access to T to one thread at a time, which lets T move between
// threads but never be shared between them, so T: Send is sufficient.
unsafe impl<T: Send> Sync for PriorityMutex<T> {}

impl<T> PriorityMutex<T> {
    /// Whether lock waits on this platform are protected by priority inheritance.
    pub const PRIORITY_INHERITANCE: bool = RawLock::PRIORITY_INHERITANCE;

    /// Creates an unlocked mutex holding `value`.
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self {
            raw: RawLock::new(),
            data: UnsafeCell::new(value),
        }
    }

    /// Acquires the mutex, blocking the current thread until it is available.
    ///
    /// # Panics
    ///
    /// On Linux, panics if the current thread already holds the mutex.
    pub fn lock(&self) -> PriorityMutexGuard<'_, T> {
        self.raw.lock();

        PriorityMutexGuard {
            mutex: self,
            _not_send: PhantomData,
        }
    }

    /// Acquires the mutex if it is not held by anyone, without blocking.
    pub fn try_lock(&self) -> Option<PriorityMutexGuard<'_, T>> {
        if !self.raw.try_lock() {
            return None;
        }

        Some(PriorityMutexGuard {
            mutex: self,
            _not_send: PhantomData,
        })
    }

    /// Accesses the value without locking, which the exclusive borrow makes safe.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Consumes the mutex and returns the value.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: Default> Default for PriorityMutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for PriorityMutex<T> {
    #[cfg_attr(test, mutants::skip)] // No API contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("PriorityMutex");

        match self.try_lock() {
            Some(guard) => debug.field("data", &&*guard),
            None => debug.field("data", &format_args!("<locked>")),
        };

        debug.finish_non_exhaustive()
    }
}

/// Grants access to the value inside a [`PriorityMutex`] and releases the mutex when dropped.
///
/// The guard must be dropped on the thread that acquired it, because the lock records its owner
/// thread, so the guard is not `Send`.
#[must_use = "the mutex is released as soon as the guard is dropped"]
pub struct PriorityMutexGuard<'a, T> {
    mutex: &'a PriorityMutex<T>,

    _not_send: PhantomData<*const ()>,
}

// SAFETY: Sharing the guard only shares &T, which is fine if T is Sync.
unsafe impl<T: Sync> Sync for PriorityMutexGuard<'_, T> {}

impl<T> Deref for PriorityMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: We hold the lock, so nobody else has access to the data.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T> DerefMut for PriorityMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: We hold the lock, so nobody else has access to the data.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T> Drop for PriorityMutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.raw.unlock();
    }
}

impl<T: fmt::Debug> fmt::Debug for PriorityMutexGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
