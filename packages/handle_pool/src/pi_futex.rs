//! Priority-inheriting lock built on Linux PI futexes.
//!
//! The lock word holds 0 when unlocked or the kernel thread ID of the owner when locked. The
//! kernel may set `FUTEX_WAITERS` in the word while threads are blocked on it. Uncontended
//! lock/unlock is a single compare-exchange in user space; everything else goes to the kernel,
//! which boosts the owner to the priority of the highest-priority waiter and hands the lock to
//! that waiter on unlock.

use std::cell::Cell;
use std::io;
use std::ptr;
use std::sync::Once;
use std::sync::atomic::{self, AtomicBool, AtomicU32, Ordering};
use std::thread;

use tracing::debug;

// The kernel reserves the two top bits of the word for FUTEX_WAITERS and FUTEX_OWNER_DIED.
const TID_MASK: u32 = 0x3fff_ffff;

/// Set once we learn that the kernel refuses PI futex operations (e.g. some sandboxes).
static PI_UNSUPPORTED: AtomicBool = AtomicBool::new(false);

/// Advanced in every child process created by `fork()`. A cached TID is only trusted if it was
/// read in the current fork generation, because the forking thread keeps its thread-locals but
/// gets a new TID in the child.
static FORK_GENERATION: AtomicU32 = AtomicU32::new(0);
static FORK_HANDLER: Once = Once::new();

thread_local! {
    // (fork generation, TID)
    static CURRENT_TID: Cell<Option<(u32, u32)>> = const { Cell::new(None) };
}

#[derive(Debug)]
pub(crate) struct PiFutex {
    word: AtomicU32,
}

impl PiFutex {
    pub(crate) const PRIORITY_INHERITANCE: bool = true;

    pub(crate) const fn new() -> Self {
        Self {
            word: AtomicU32::new(0),
        }
    }

    #[inline]
    pub(crate) fn lock(&self) {
        let tid = current_tid();

        if !self.try_lock_as(tid) {
            self.lock_contended(tid, !PI_UNSUPPORTED.load(Ordering::Relaxed));
        }
    }

    #[inline]
    pub(crate) fn try_lock(&self) -> bool {
        self.try_lock_as(current_tid())
    }

    fn try_lock_as(&self, tid: u32) -> bool {
        self.word
            .compare_exchange(0, tid, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[cold]
    fn lock_contended(&self, tid: u32, pi_supported: bool) {
        assert!(
            (self.word.load(Ordering::Relaxed) & TID_MASK) != tid,
            "PriorityMutex is not reentrant but the current thread already holds it"
        );

        if !pi_supported {
            self.lock_yielding(tid);
            return;
        }

        loop {
            // SAFETY: The futex word is a live, aligned u32 for as long as we are borrowed.
            // FUTEX_LOCK_PI takes no value argument and a null timeout means "wait forever".
            let result = unsafe {
                libc::syscall(
                    libc::SYS_futex,
                    self.word.as_ptr(),
                    libc::FUTEX_LOCK_PI | libc::FUTEX_PRIVATE_FLAG,
                    0,
                    ptr::null::<libc::timespec>(),
                )
            };

            if result == 0 {
                // The kernel stored our TID in the word. Pair with the Release of the unlock.
                atomic::fence(Ordering::Acquire);
                return;
            }

            match io::Error::last_os_error().raw_os_error() {
                // The owner is exiting or we were interrupted. Just try again.
                Some(libc::EAGAIN | libc::EINTR) => {}
                Some(libc::ENOSYS) => {
                    debug!("PI futexes are not supported; priority inheritance is unavailable");
                    PI_UNSUPPORTED.store(true, Ordering::Relaxed);
                    self.lock_yielding(tid);
                    return;
                }
                Some(libc::EDEADLK) => {
                    panic!("PriorityMutex is not reentrant but the current thread already holds it")
                }
                other => panic!("FUTEX_LOCK_PI failed with unexpected OS error {other:?}"),
            }
        }
    }

    /// Degraded path for kernels without PI futexes: no waiter ever reaches the kernel, so the
    /// waiters bit is never set and unlocking stays a plain compare-exchange.
    #[cold]
    fn lock_yielding(&self, tid: u32) {
        while !self.try_lock_as(tid) {
            thread::yield_now();
        }
    }

    /// Releases the lock. Must only be called by the thread that acquired it.
    #[inline]
    pub(crate) fn unlock(&self) {
        let tid = current_tid();

        if self
            .word
            .compare_exchange(tid, 0, Ordering::Release, Ordering::Relaxed)
            .is_err()
        {
            self.unlock_contended();
        }
    }

    #[cold]
    fn unlock_contended(&self) {
        atomic::fence(Ordering::Release);

        // SAFETY: The futex word is a live, aligned u32 for as long as we are borrowed.
        // FUTEX_UNLOCK_PI takes no further arguments.
        let result = unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.word.as_ptr(),
                libc::FUTEX_UNLOCK_PI | libc::FUTEX_PRIVATE_FLAG,
            )
        };

        assert!(
            result == 0,
            "FUTEX_UNLOCK_PI failed with OS error {:?}; the lock was not held by this thread",
            io::Error::last_os_error().raw_os_error()
        );
    }
}

fn current_tid() -> u32 {
    FORK_HANDLER.call_once(register_fork_handler);
    let generation = FORK_GENERATION.load(Ordering::Relaxed);

    CURRENT_TID.with(|cached| match cached.get() {
        Some((cached_generation, tid)) if cached_generation == generation => tid,
        _ => {
            let tid = current_tid_uncached();
            cached.set(Some((generation, tid)));
            tid
        }
    })
}

fn register_fork_handler() {
    // SAFETY: The child handler only performs an atomic increment, which is async-signal-safe.
    let result = unsafe { libc::pthread_atfork(None, None, Some(advance_fork_generation)) };

    if result != 0 {
        debug!(
            error = result,
            "failed to register fork handler; locks must not be used in forked child processes"
        );
    }
}

extern "C" fn advance_fork_generation() {
    FORK_GENERATION.fetch_add(1, Ordering::Relaxed);
}

fn current_tid_uncached() -> u32 {
    // SAFETY: gettid has no preconditions and cannot fail.
    let tid = unsafe { libc::syscall(libc::SYS_gettid) };

    u32::try_from(tid).expect("Linux thread IDs are positive and fit in the futex TID field")
}
