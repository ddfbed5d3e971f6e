//! Single-slot waker notification.

use core::task::Waker;

use super::IrqSpinLock;

/// Holds at most one [`Waker`] for a single consumer.
///
/// The consumer stores its waker with [`register`](Self::register) before
/// suspending; a producer (typically an interrupt handler) calls
/// [`wake`](Self::wake). Registering again replaces the previous waker, so a
/// consumer that is polled repeatedly never accumulates stale entries.
pub struct WakerSlot {
    waker: IrqSpinLock<Option<Waker>>,
}

impl WakerSlot {
    /// Creates an empty slot.
    #[cfg(not(loom))]
    pub const fn new() -> Self {
        Self {
            waker: IrqSpinLock::new(None),
        }
    }

    /// Creates an empty slot.
    #[cfg(loom)]
    pub fn new() -> Self {
        Self {
            waker: IrqSpinLock::new(None),
        }
    }

    /// Stores `waker`, replacing whatever was registered before.
    pub fn register(&self, waker: &Waker) {
        let mut slot = self.waker.lock();
        match slot.as_ref() {
            Some(existing) if existing.will_wake(waker) => {}
            _ => *slot = Some(waker.clone()),
        }
    }

    /// Takes the stored waker and wakes it outside the lock.
    ///
    /// Returns `true` if a waker was present.
    pub fn wake(&self) -> bool {
        let waker = self.waker.lock().take();
        match waker {
            Some(w) => {
                w.wake();
                true
            }
            None => false,
        }
    }

    /// Drops the stored waker without waking it.
    pub fn clear(&self) {
        let stale = self.waker.lock().take();
        drop(stale);
    }

    /// Returns `true` if a waker is currently registered.
    pub fn is_registered(&self) -> bool {
        self.waker.lock().is_some()
    }
}

impl Default for WakerSlot {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(loom)]
mod loom_tests {
    use core::sync::atomic::Ordering;

    use loom::sync::Arc;

    use super::*;
    use crate::sync::IrqSpinLock;
    use crate::task::counting_waker;

    /// The consumer checks its predicate and registers under the same lock
    /// the producer takes to publish; the wake must never be lost.
    #[test]
    fn publish_and_wait_never_loses_wake() {
        loom::model(|| {
            let ready = Arc::new(IrqSpinLock::new(false));
            let slot = Arc::new(WakerSlot::new());

            let producer = {
                let ready = Arc::clone(&ready);
                let slot = Arc::clone(&slot);
                loom::thread::spawn(move || {
                    *ready.lock() = true;
                    slot.wake();
                })
            };

            let (waker, count) = counting_waker();
            let saw_ready = {
                let flag = ready.lock();
                if !*flag {
                    slot.register(&waker);
                }
                *flag
            };

            producer.join().unwrap();
            assert!(saw_ready || count.load(Ordering::SeqCst) == 1);
        });
    }
}
