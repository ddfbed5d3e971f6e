//! Waker helpers for polling futures outside an executor.
//!
//! [`noop_waker`] and [`try_poll_immediate`] let task-context code drive a
//! future one step (for example to check whether a read could complete
//! without suspending). [`counting_waker`] lets tests observe exactly how
//! many times a producer signalled.

use alloc::sync::Arc;
use core::future::Future;
use core::pin::pin;
use core::sync::atomic::{AtomicUsize, Ordering};
use core::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

/// Creates a [`Waker`] that does nothing when woken.
pub fn noop_waker() -> Waker {
    fn noop(_: *const ()) {}
    fn clone(p: *const ()) -> RawWaker {
        RawWaker::new(p, &NOOP_VTABLE)
    }
    static NOOP_VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
    // SAFETY: Every vtable function ignores the data pointer.
    unsafe { Waker::from_raw(RawWaker::new(core::ptr::null(), &NOOP_VTABLE)) }
}

/// Creates a [`Waker`] that increments a counter each time it is woken.
///
/// Returns the waker and the shared counter.
pub fn counting_waker() -> (Waker, Arc<AtomicUsize>) {
    unsafe fn clone(data: *const ()) -> RawWaker {
        // SAFETY: `data` came from `Arc::into_raw` on an `Arc<AtomicUsize>`.
        unsafe { Arc::increment_strong_count(data.cast::<AtomicUsize>()) };
        RawWaker::new(data, &COUNTING_VTABLE)
    }

    unsafe fn wake(data: *const ()) {
        // SAFETY: `data` came from `Arc::into_raw`; this consumes that reference.
        let counter = unsafe { Arc::from_raw(data.cast::<AtomicUsize>()) };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    unsafe fn wake_by_ref(data: *const ()) {
        // SAFETY: `data` is a live `Arc<AtomicUsize>` pointer owned by the waker.
        let counter = unsafe { &*data.cast::<AtomicUsize>() };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    unsafe fn drop_waker(data: *const ()) {
        // SAFETY: `data` came from `Arc::into_raw`; this releases that reference.
        unsafe { drop(Arc::from_raw(data.cast::<AtomicUsize>())) };
    }

    static COUNTING_VTABLE: RawWakerVTable =
        RawWakerVTable::new(clone, wake, wake_by_ref, drop_waker);

    let counter = Arc::new(AtomicUsize::new(0));
    let data = Arc::into_raw(Arc::clone(&counter)).cast::<()>();
    // SAFETY: The vtable upholds the `Arc` reference counting contract above.
    let waker = unsafe { Waker::from_raw(RawWaker::new(data, &COUNTING_VTABLE)) };
    (waker, counter)
}

/// Polls `future` once with a no-op waker.
///
/// Returns `Some(output)` if it completed immediately, `None` if it would
/// have suspended. The future is dropped either way.
pub fn try_poll_immediate<F: Future>(future: F) -> Option<F::Output> {
    let waker = noop_waker();
    let mut cx = Context::from_waker(&waker);
    let future = pin!(future);
    match future.poll(&mut cx) {
        Poll::Ready(value) => Some(value),
        Poll::Pending => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_future_completes() {
        assert_eq!(try_poll_immediate(async { 5 }), Some(5));
    }

    #[test]
    fn pending_future_returns_none() {
        assert_eq!(try_poll_immediate(core::future::pending::<u8>()), None);
    }

    #[test]
    fn counting_waker_counts_clones_and_refs() {
        let (waker, count) = counting_waker();
        waker.wake_by_ref();
        let clone = waker.clone();
        clone.wake();
        waker.wake();
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(Arc::strong_count(&count), 1);
    }
}
