//! Cancellation tokens for interruptible waits.
//!
//! A [`CancelToken`] plays the role of a pending-signal flag for one waiting
//! task: whoever owns the task's token can interrupt a blocking operation,
//! which then finishes with a "cancelled" outcome instead of hanging. The
//! flag stays raised until [`CancelToken::reset`] acknowledges it.

use core::sync::atomic::{AtomicBool, Ordering};
use core::task::Context;

use crate::sync::WakerSlot;

/// A resettable, wakeable cancellation flag.
pub struct CancelToken {
    cancelled: AtomicBool,
    waiter: WakerSlot,
}

impl CancelToken {
    /// Creates a token in the non-cancelled state.
    pub fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            waiter: WakerSlot::new(),
        }
    }

    /// Raises the flag and wakes the task waiting on it, if any.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.waiter.wake();
    }

    /// Returns `true` if the flag is raised.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Lowers the flag. Returns whether it was raised.
    pub fn reset(&self) -> bool {
        self.cancelled.swap(false, Ordering::AcqRel)
    }

    /// Registers the current task for wakeup, then checks the flag.
    ///
    /// Registration happens first so a concurrent [`cancel`](Self::cancel)
    /// either is observed here or finds the waker and wakes it.
    pub fn poll_cancelled(&self, cx: &Context<'_>) -> bool {
        self.waiter.register(cx.waker());
        self.is_cancelled()
    }

    /// Forgets the registered waker once the wait has finished.
    pub fn disarm(&self) {
        self.waiter.clear();
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
