//! Time sources and the deadline queue behind timed waits.
//!
//! A [`ClockSource`] supplies monotonic nanoseconds. Tasks that wait with a
//! deadline register their waker in a [`TimerQueue`]; the system timer tick
//! calls [`TimerQueue::wake_expired`] (usually through [`Timebase::tick`]) to
//! wake every task whose deadline has passed. The woken task re-checks its
//! own deadline, so an early or spurious wake is harmless.

use alloc::collections::BinaryHeap;
use alloc::sync::Arc;
use core::cmp::{Ordering, Reverse};
use core::sync::atomic::{self, AtomicU64};
use core::task::Waker;
use core::time::Duration;

use crate::sync::IrqSpinLock;

/// A monotonic time source.
pub trait ClockSource: Send + Sync {
    /// Returns the current time in nanoseconds since an arbitrary epoch.
    fn read_nanos(&self) -> u64;
}

/// A clock that only moves when told to.
///
/// Backs emulated devices and tests, where time must be deterministic.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Creates a clock reading `start_ns`.
    pub const fn new(start_ns: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ns),
        }
    }

    /// Sets the current reading.
    pub fn set(&self, now_ns: u64) {
        self.now.store(now_ns, atomic::Ordering::Release);
    }

    /// Moves the clock forward by `delta` and returns the new reading.
    pub fn advance(&self, delta: Duration) -> u64 {
        let delta = duration_to_nanos(delta);
        self.now
            .fetch_add(delta, atomic::Ordering::AcqRel)
            .saturating_add(delta)
    }
}

impl ClockSource for ManualClock {
    fn read_nanos(&self) -> u64 {
        self.now.load(atomic::Ordering::Acquire)
    }
}

/// Converts a [`Duration`] to nanoseconds, saturating at `u64::MAX`.
pub fn duration_to_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Handle to a registered wake-up, used to withdraw it early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

struct SleepEntry {
    deadline: u64,
    id: TimerId,
    waker: Waker,
}

impl PartialEq for SleepEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline
    }
}

impl Eq for SleepEntry {}

impl PartialOrd for SleepEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SleepEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline.cmp(&other.deadline)
    }
}

/// Maximum wakers drained per call. The rest stay queued for the next tick,
/// which keeps the timer interrupt bounded and allocation-free.
const WAKE_BATCH_SIZE: usize = 32;

/// Deadline-ordered registry of wakers.
pub struct TimerQueue {
    entries: IrqSpinLock<BinaryHeap<Reverse<SleepEntry>>>,
    next_id: AtomicU64,
}

impl TimerQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            entries: IrqSpinLock::new(BinaryHeap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Arranges for `waker` to be woken once `deadline` (ns) is reached.
    pub fn register(&self, deadline: u64, waker: Waker) -> TimerId {
        let id = TimerId(self.next_id.fetch_add(1, atomic::Ordering::Relaxed));
        self.entries
            .lock()
            .push(Reverse(SleepEntry { deadline, id, waker }));
        id
    }

    /// Withdraws the wake-up registered as `id`.
    ///
    /// Returns `false` if it already fired or was cancelled. The removed
    /// waker is dropped after the lock is released.
    pub fn cancel(&self, id: TimerId) -> bool {
        let removed = {
            let mut entries = self.entries.lock();
            let mut pending = core::mem::take(&mut *entries).into_vec();
            let removed = pending
                .iter()
                .position(|Reverse(entry)| entry.id == id)
                .map(|index| pending.swap_remove(index));
            *entries = BinaryHeap::from(pending);
            removed
        };
        removed.is_some()
    }

    /// Wakes every waker whose deadline is at or before `now`.
    ///
    /// Expired entries are popped under the lock and woken after it is
    /// released. Returns the number of wakers woken.
    pub fn wake_expired(&self, now: u64) -> usize {
        let mut batch: [Option<Waker>; WAKE_BATCH_SIZE] = [const { None }; WAKE_BATCH_SIZE];
        let mut taken = 0;

        {
            let mut entries = self.entries.lock();
            while taken < WAKE_BATCH_SIZE {
                match entries.peek() {
                    Some(Reverse(entry)) if entry.deadline <= now => {}
                    _ => break,
                }
                if let Some(Reverse(entry)) = entries.pop() {
                    batch[taken] = Some(entry.waker);
                    taken += 1;
                }
            }
        }

        for waker in batch.iter_mut().take(taken).filter_map(Option::take) {
            waker.wake();
        }
        taken
    }

    /// Returns the earliest pending deadline.
    pub fn next_deadline(&self) -> Option<u64> {
        self.entries.lock().peek().map(|Reverse(e)| e.deadline)
    }

    /// Returns the number of registered wakers, expired or not.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// A clock paired with the timer queue that is ticked against it.
#[derive(Clone)]
pub struct Timebase {
    clock: Arc<dyn ClockSource>,
    timers: Arc<TimerQueue>,
}

impl Timebase {
    /// Pairs `clock` with `timers`.
    pub fn new(clock: Arc<dyn ClockSource>, timers: Arc<TimerQueue>) -> Self {
        Self { clock, timers }
    }

    /// Returns the current clock reading.
    pub fn now(&self) -> u64 {
        self.clock.read_nanos()
    }

    /// Returns the absolute deadline `timeout` from now.
    pub fn deadline_after(&self, timeout: Duration) -> u64 {
        self.now().saturating_add(duration_to_nanos(timeout))
    }

    /// Returns `true` once `deadline` has been reached.
    pub fn has_expired(&self, deadline: u64) -> bool {
        self.now() >= deadline
    }

    /// Registers `waker` to be woken at `deadline`.
    pub fn wake_at(&self, deadline: u64, waker: &Waker) -> TimerId {
        self.timers.register(deadline, waker.clone())
    }

    /// Withdraws a wake-up registered with [`wake_at`](Self::wake_at).
    pub fn cancel(&self, id: TimerId) -> bool {
        self.timers.cancel(id)
    }

    /// Wakes everything that has expired as of the current clock reading.
    ///
    /// Intended to be called from the periodic timer interrupt.
    pub fn tick(&self) -> usize {
        self.timers.wake_expired(self.now())
    }

    /// Returns the underlying timer queue.
    pub fn timers(&self) -> &TimerQueue {
        &self.timers
    }
}

impl core::fmt::Debug for Timebase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Timebase")
            .field("now", &self.now())
            .field("pending", &self.timers.len())
            .finish()
    }
}
