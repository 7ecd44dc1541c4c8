use core::hint::spin_loop;
use core::sync::atomic::{AtomicUsize, Ordering};

/// A one-shot waitable completion signal.
///
/// GC phases B–D and the bad-block scan submit a batch of `n` requests to
/// the LLM, release the `ftl_lock`, and block on a fresh `Countdown` until
/// every request's `end_req` callback has called [`Countdown::signal`]. This
/// replaces the "lock a mutex twice in a row" idiom the original driver uses
/// to model a synchronous wait on asynchronous completion (§9).
///
/// A `Countdown` is not reusable across passes: construct a new one per
/// batch.
///
/// # Examples
///
/// ```
/// use ftl_sync::Countdown;
///
/// let c = Countdown::new(2);
/// assert!(!c.is_done());
/// c.signal();
/// assert!(!c.is_done());
/// c.signal();
/// assert!(c.is_done());
/// c.wait(); // returns immediately, already done
/// ```
pub struct Countdown {
    remaining: AtomicUsize,
}

impl Countdown {
    /// Creates a countdown expecting `n` calls to [`signal`](Self::signal).
    ///
    /// `n == 0` is a valid, already-complete countdown.
    #[must_use]
    pub const fn new(n: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(n),
        }
    }

    /// Records one completed request. Called from the LLM's `end_req` path.
    ///
    /// Saturates at zero; signalling more often than the original count was
    /// constructed with does not underflow.
    #[inline]
    pub fn signal(&self) {
        let _ = self
            .remaining
            .fetch_update(Ordering::Release, Ordering::Relaxed, |r| {
                Some(r.saturating_sub(1))
            });
    }

    /// Returns whether every expected signal has arrived.
    #[inline]
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.remaining.load(Ordering::Acquire) == 0
    }

    /// Spins until every expected signal has arrived.
    ///
    /// Callers must release the `ftl_lock` before calling this so the LLM
    /// (which may run on the same thread, as the in-memory test double does)
    /// can make forward progress.
    #[inline]
    pub fn wait(&self) {
        while !self.is_done() {
            spin_loop();
        }
    }
}
