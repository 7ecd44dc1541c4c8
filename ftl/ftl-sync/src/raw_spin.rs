use crate::{RawLock, RawUnlock};
use core::hint::spin_loop;
use core::sync::atomic::{AtomicBool, Ordering};

/// A simple spinlock implementation based on an atomic flag.
///
/// `RawSpin` busy-waits until the lock becomes available. It is not fair and
/// does not support reentrancy; intended for the short critical sections the
/// `ftl_lock` guards (§5 of the component design).
///
/// # Examples
///
/// ```
/// use ftl_sync::RawSpin;
///
/// let lock = RawSpin::new();
///
/// lock.lock();
/// // critical section
/// unsafe { lock.unlock(); }
/// ```
pub struct RawSpin {
    held: AtomicBool,
}

impl Default for RawSpin {
    fn default() -> Self {
        Self::new()
    }
}

impl RawSpin {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn lock(&self) {
        while self.held.swap(true, Ordering::Acquire) {
            while self.held.load(Ordering::Relaxed) {
                spin_loop();
            }
        }
    }

    #[inline]
    pub fn try_lock(&self) -> bool {
        !self.held.swap(true, Ordering::Acquire)
    }

    /// # Safety
    ///
    /// Must only be called by the holder of a prior successful [`lock`](Self::lock)
    /// or [`try_lock`](Self::try_lock).
    #[inline]
    pub unsafe fn unlock(&self) {
        self.held.store(false, Ordering::Release);
    }
}

impl RawLock for RawSpin {
    #[inline]
    fn raw_lock(&self) {
        self.lock();
    }

    #[inline]
    fn raw_try_lock(&self) -> bool {
        self.try_lock()
    }
}

impl RawUnlock for RawSpin {
    #[inline]
    unsafe fn raw_unlock(&self) {
        unsafe { self.unlock() }
    }
}
