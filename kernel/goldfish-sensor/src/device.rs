//! Interrupt-to-reader hand-off.
//!
//! [`SensorDevice`] owns the register window and the state shared between
//! the interrupt handler and the single consumer:
//!
//! - `enabled`: classes the consumer wants (written through a [`Session`]);
//! - `ready`: classes reported since the pending read began (written by
//!   the handler);
//! - `latched`: the sample buffer handed to the reader.
//!
//! All of it sits behind one [`IrqSpinLock`]. A reader checks `ready` and
//! registers its waker in the same critical section the handler uses to
//! publish, so a wake cannot slip between the check and the sleep.
//!
//! ```text
//!   Unarmed --open / set_enabled_classes--> Armed --interrupt--> DataReady
//!      ^                                                            |
//!      +-------------------------- read ----------------------------+
//!   any state --shutdown--> Shutdown
//! ```

use alloc::sync::Arc;
use core::future::Future;
use core::pin::Pin;
use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use core::task::{Context, Poll, Waker};
use core::time::Duration;

use goldfish_core::cancel::CancelToken;
use goldfish_core::sync::{IrqSpinLock, WakerSlot};
use goldfish_core::time::{TimerId, Timebase};
use goldfish_core::{kdebug, kinfo, ktrace, kwarn};
use goldfish_mmio::RegisterIo;

use crate::config::{SamplePoint, SensorConfig};
use crate::error::{DriverError, SensorError};
use crate::irq::{IrqHandler, IrqReturn};
use crate::regs::SensorRegs;
use crate::sample::{SampleRecord, SensorClasses};

/// Observable protocol state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmState {
    /// Nothing requested since the last read (or no session).
    Unarmed,
    /// A session opened or changed its enabled classes; waiting for data.
    Armed,
    /// The device reported data that has not been read yet.
    DataReady,
    /// The device was unbound. Terminal.
    Shutdown,
}

/// Parameters of one blocking read.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions<'a> {
    /// Token that aborts the wait with [`SensorError::Cancelled`].
    pub cancel: Option<&'a CancelToken>,
    /// Maximum wait. Falls back to [`SensorConfig::default_timeout`].
    pub timeout: Option<Duration>,
}

impl<'a> ReadOptions<'a> {
    /// No cancellation, configured default timeout.
    pub const fn new() -> Self {
        Self {
            cancel: None,
            timeout: None,
        }
    }

    /// Aborts the read when `token` is cancelled.
    #[must_use]
    pub const fn cancel_on(mut self, token: &'a CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Gives up after `timeout`.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

struct Shared {
    enabled: SensorClasses,
    ready: SensorClasses,
    latched: SampleRecord,
    armed: bool,
    shutdown: bool,
}

impl Shared {
    fn clear_data(&mut self) {
        self.ready = SensorClasses::empty();
        self.latched = SampleRecord::ZERO;
    }
}

/// A bound goldfish sensor.
pub struct SensorDevice<R: RegisterIo> {
    regs: SensorRegs<R>,
    shared: IrqSpinLock<Shared>,
    reader: WakerSlot,
    sessions: AtomicU32,
    irqs_handled: AtomicU64,
    irqs_spurious: AtomicU64,
    config: SensorConfig,
    timebase: Timebase,
}

impl<R: RegisterIo> SensorDevice<R> {
    /// Takes ownership of a register window.
    ///
    /// The device starts disarmed with every class enabled; interrupts are
    /// only requested from the hardware once a session opens.
    pub fn new(regs: R, config: SensorConfig, timebase: Timebase) -> Result<Self, DriverError> {
        let regs = SensorRegs::new(regs);
        if !regs.fits() {
            return Err(DriverError::DeviceNotFound);
        }
        regs.disarm();

        Ok(Self {
            regs,
            shared: IrqSpinLock::new(Shared {
                enabled: SensorClasses::all(),
                ready: SensorClasses::empty(),
                latched: SampleRecord::ZERO,
                armed: false,
                shutdown: false,
            }),
            reader: WakerSlot::new(),
            sessions: AtomicU32::new(0),
            irqs_handled: AtomicU64::new(0),
            irqs_spurious: AtomicU64::new(0),
            config,
            timebase,
        })
    }

    /// Starts the exclusive session.
    ///
    /// Enables every class, discards anything reported before this point and
    /// arms all three interrupts in hardware.
    pub fn open(self: &Arc<Self>) -> Result<Session<R>, SensorError> {
        if self
            .sessions
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            kdebug!("{}: open rejected, session already active", self.config.name);
            return Err(SensorError::Busy);
        }

        {
            let mut shared = self.shared.lock();
            if shared.shutdown {
                drop(shared);
                self.sessions.store(0, Ordering::Release);
                return Err(SensorError::NotBound);
            }
            shared.enabled = SensorClasses::all();
            shared.clear_data();
            shared.armed = true;
            self.regs.arm(SensorClasses::all());
        }

        kdebug!("{}: session opened", self.config.name);
        Ok(Session {
            device: Arc::clone(self),
        })
    }

    fn close_session(&self) {
        {
            let mut shared = self.shared.lock();
            shared.armed = false;
            shared.clear_data();
            self.regs.disarm();
        }
        self.reader.clear();
        self.sessions.store(0, Ordering::Release);
        kdebug!("{}: session closed", self.config.name);
    }

    /// Interrupt entry point.
    ///
    /// Reads (and thereby acknowledges) the pending classes. With
    /// [`SamplePoint::Interrupt`] the registers of every pending class are
    /// latched here, so the reader gets the values of this instant; the
    /// enabled mask is applied when the read drains them.
    pub fn handle_interrupt(&self) -> IrqReturn {
        let mut shared = self.shared.lock();
        let status = self.regs.pending();
        if status.is_empty() {
            drop(shared);
            self.irqs_spurious.fetch_add(1, Ordering::Relaxed);
            return IrqReturn::None;
        }

        if self.config.sample_point == SamplePoint::Interrupt {
            self.regs.sample_into(&mut shared.latched, status);
        }
        shared.ready |= status;
        drop(shared);

        self.irqs_handled.fetch_add(1, Ordering::Relaxed);
        ktrace!("{}: interrupt, status {:#05b}", self.config.name, status.bits());
        self.reader.wake();
        IrqReturn::Handled
    }

    /// Unbinds: disarms the hardware, fails the pending read with
    /// [`SensorError::Shutdown`] and refuses further opens.
    pub fn shut_down(&self) {
        {
            let mut shared = self.shared.lock();
            if shared.shutdown {
                return;
            }
            shared.shutdown = true;
            shared.armed = false;
            shared.clear_data();
            self.regs.disarm();
        }

        if self.reader.wake() {
            kwarn!("{}: shut down with a reader waiting", self.config.name);
        } else {
            kinfo!("{}: shut down", self.config.name);
        }
    }

    /// Current protocol state.
    pub fn arm_state(&self) -> ArmState {
        let shared = self.shared.lock();
        if shared.shutdown {
            ArmState::Shutdown
        } else if !shared.ready.is_empty() {
            ArmState::DataReady
        } else if shared.armed {
            ArmState::Armed
        } else {
            ArmState::Unarmed
        }
    }

    /// Classes the consumer asked for.
    pub fn enabled_classes(&self) -> SensorClasses {
        self.shared.lock().enabled
    }

    /// Classes reported and not yet read.
    pub fn ready_classes(&self) -> SensorClasses {
        self.shared.lock().ready
    }

    /// Returns `true` while a session is open.
    pub fn is_open(&self) -> bool {
        self.sessions.load(Ordering::Acquire) != 0
    }

    /// Returns `true` once [`shut_down`](Self::shut_down) ran.
    pub fn is_shut_down(&self) -> bool {
        self.shared.lock().shutdown
    }

    /// Returns `true` while a reader is suspended waiting for data.
    pub fn has_waiting_reader(&self) -> bool {
        self.reader.is_registered()
    }

    /// Interrupts claimed / interrupts that found nothing pending.
    pub fn irq_counts(&self) -> (u64, u64) {
        (
            self.irqs_handled.load(Ordering::Relaxed),
            self.irqs_spurious.load(Ordering::Relaxed),
        )
    }

    /// The register view.
    pub fn regs(&self) -> &SensorRegs<R> {
        &self.regs
    }

    /// Per-device settings.
    pub fn config(&self) -> &SensorConfig {
        &self.config
    }
}

impl<R: RegisterIo> IrqHandler for SensorDevice<R> {
    fn handle_irq(&self) -> IrqReturn {
        self.handle_interrupt()
    }
}

/// The exclusive consumer session. Closing (or dropping) it disarms the
/// device.
pub struct Session<R: RegisterIo> {
    device: Arc<SensorDevice<R>>,
}

impl<R: RegisterIo> Session<R> {
    /// Replaces the enabled classes. Bits outside the known classes are
    /// ignored. Takes effect for data reported after this call; the
    /// hardware enable register is not touched.
    pub fn set_enabled_classes(&self, classes: SensorClasses) {
        let mut shared = self.device.shared.lock();
        shared.enabled = classes & SensorClasses::all();
        shared.armed = true;
    }

    /// Waits for the next interrupt and returns its samples.
    ///
    /// Data reported before the first poll is discarded; only interrupts
    /// delivered after the read began complete it. Triples of classes that
    /// are not enabled, or that no such interrupt reported, are zero.
    pub fn read<'a>(&'a self, options: ReadOptions<'a>) -> ReadFuture<'a, R> {
        ReadFuture {
            device: &self.device,
            cancel: options.cancel,
            timeout: options.timeout.or(self.device.config.default_timeout),
            deadline: None,
            prefetched: None,
            timer: None,
            started: false,
        }
    }

    /// Ends the session.
    pub fn close(self) {
        drop(self);
    }

    /// The device this session belongs to.
    pub fn device(&self) -> &Arc<SensorDevice<R>> {
        &self.device
    }
}

impl<R: RegisterIo> Drop for Session<R> {
    fn drop(&mut self) {
        self.device.close_session();
    }
}

/// Future returned by [`Session::read`].
pub struct ReadFuture<'a, R: RegisterIo> {
    device: &'a SensorDevice<R>,
    cancel: Option<&'a CancelToken>,
    timeout: Option<Duration>,
    deadline: Option<u64>,
    prefetched: Option<SampleRecord>,
    timer: Option<(TimerId, Waker)>,
    started: bool,
}

impl<R: RegisterIo> ReadFuture<'_, R> {
    fn start(&mut self) {
        let device = self.device;
        self.started = true;
        self.deadline = self.timeout.map(|t| device.timebase.deadline_after(t));

        let mut shared = device.shared.lock();
        shared.clear_data();
        if device.config.sample_point == SamplePoint::BeforeWait {
            self.prefetched = Some(device.regs.sample(shared.enabled));
        }
    }

    fn arm_timer(&mut self, deadline: u64, waker: &Waker) {
        if self.timer.as_ref().is_some_and(|(_, w)| w.will_wake(waker)) {
            return;
        }
        self.disarm_timer();
        let id = self.device.timebase.wake_at(deadline, waker);
        self.timer = Some((id, waker.clone()));
    }

    fn disarm_timer(&mut self) {
        if let Some((id, _)) = self.timer.take() {
            self.device.timebase.cancel(id);
        }
    }
}

impl<R: RegisterIo> Future for ReadFuture<'_, R> {
    type Output = Result<SampleRecord, SensorError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        if !this.started {
            this.start();
        }

        let cancelled = this.cancel.is_some_and(|token| token.poll_cancelled(cx));

        let device = this.device;
        let mut shared = device.shared.lock();
        let outcome = if shared.shutdown {
            Err(SensorError::Shutdown)
        } else if !shared.ready.is_empty() {
            let record = match this.prefetched.take() {
                Some(early) => early,
                None => shared.latched.masked(shared.enabled & shared.ready),
            };
            shared.clear_data();
            shared.armed = false;
            Ok(record)
        } else if cancelled {
            Err(SensorError::Cancelled)
        } else if this.deadline.is_some_and(|d| device.timebase.has_expired(d)) {
            Err(SensorError::TimedOut)
        } else {
            // Registered before the lock drops: the handler publishes under
            // the same lock and wakes after releasing it.
            device.reader.register(cx.waker());
            drop(shared);

            if let Some(deadline) = this.deadline {
                this.arm_timer(deadline, cx.waker());
            }
            return Poll::Pending;
        };
        drop(shared);

        this.disarm_timer();
        Poll::Ready(outcome)
    }
}

impl<R: RegisterIo> Drop for ReadFuture<'_, R> {
    fn drop(&mut self) {
        if self.started {
            self.disarm_timer();
            self.device.reader.clear();
            if let Some(token) = self.cancel {
                token.disarm();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use core::sync::atomic::Ordering;

    use goldfish_core::task::{counting_waker, try_poll_immediate};
    use goldfish_core::time::{ManualClock, TimerQueue};

    use super::*;
    use crate::emulated::EmulatedSensor;
    use crate::sample::SensorKind;

    struct Rig {
        hw: Arc<EmulatedSensor>,
        clock: Arc<ManualClock>,
        timebase: Timebase,
        device: Arc<SensorDevice<Arc<EmulatedSensor>>>,
    }

    fn rig(config: SensorConfig) -> Rig {
        let hw = Arc::new(EmulatedSensor::new());
        let clock = Arc::new(ManualClock::new(0));
        let timebase = Timebase::new(clock.clone(), Arc::new(TimerQueue::new()));
        let device =
            Arc::new(SensorDevice::new(Arc::clone(&hw), config, timebase.clone()).unwrap());
        Rig {
            hw,
            clock,
            timebase,
            device,
        }
    }

    impl Rig {
        fn fire(&self, kind: SensorKind, xyz: [i32; 3]) -> IrqReturn {
            self.hw.report(kind, xyz);
            self.device.handle_interrupt()
        }
    }

    fn poll_once<F: Future + Unpin>(fut: &mut F, waker: &Waker) -> Poll<F::Output> {
        let mut cx = Context::from_waker(waker);
        Pin::new(fut).poll(&mut cx)
    }

    #[test]
    fn second_open_is_busy_and_leaves_hardware_alone() {
        let rig = rig(SensorConfig::default());
        let _session = rig.device.open().unwrap();
        let writes = rig.hw.enable_writes();

        assert_eq!(rig.device.open().err(), Some(SensorError::Busy));
        assert_eq!(rig.hw.enable_writes(), writes);
        assert_eq!(rig.hw.enabled(), SensorClasses::all());
    }

    #[test]
    fn open_arms_and_close_disarms() {
        let rig = rig(SensorConfig::default());
        assert_eq!(rig.hw.enabled(), SensorClasses::empty());

        let session = rig.device.open().unwrap();
        assert_eq!(rig.hw.enabled(), SensorClasses::all());
        assert_eq!(rig.device.arm_state(), ArmState::Armed);

        session.close();
        assert_eq!(rig.hw.enabled(), SensorClasses::empty());
        assert_eq!(rig.device.arm_state(), ArmState::Unarmed);
        assert!(!rig.device.is_open());
        assert!(rig.device.open().is_ok());
    }

    #[test]
    fn open_rearms_all_classes_after_narrowing() {
        let rig = rig(SensorConfig::default());
        let session = rig.device.open().unwrap();
        session.set_enabled_classes(SensorClasses::GYRO);
        session.close();

        let _session = rig.device.open().unwrap();
        assert_eq!(rig.device.enabled_classes(), SensorClasses::all());
    }

    #[test]
    fn read_blocks_until_interrupt() {
        let rig = rig(SensorConfig::default());
        let session = rig.device.open().unwrap();
        let (waker, wakes) = counting_waker();

        let mut read = session.read(ReadOptions::new());
        assert!(poll_once(&mut read, &waker).is_pending());
        assert!(rig.device.has_waiting_reader());

        assert_eq!(rig.fire(SensorKind::Accel, [1, 2, 3]), IrqReturn::Handled);
        assert_eq!(wakes.load(Ordering::SeqCst), 1);
        assert_eq!(rig.device.arm_state(), ArmState::DataReady);

        let record = match poll_once(&mut read, &waker) {
            Poll::Ready(Ok(record)) => record,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(record.values(), &[1, 2, 3, 0, 0, 0, 0, 0, 0]);
        assert_eq!(rig.device.arm_state(), ArmState::Unarmed);
    }

    #[test]
    fn accel_and_compass_scenario() {
        let rig = rig(SensorConfig::default());
        let session = rig.device.open().unwrap();
        session.set_enabled_classes(SensorClasses::from_bits_truncate(0b011));

        let (waker, _) = counting_waker();
        let mut read = session.read(ReadOptions::new());
        assert!(poll_once(&mut read, &waker).is_pending());

        rig.hw.set_triple(SensorKind::Accel, [1, 2, 3]);
        rig.hw.set_triple(SensorKind::Compass, [4, 5, 6]);
        rig.hw.set_triple(SensorKind::Gyro, [70, 80, 90]);
        rig.hw.raise(SensorClasses::from_bits_truncate(0b011));
        rig.device.handle_interrupt();

        let Poll::Ready(Ok(record)) = poll_once(&mut read, &waker) else {
            panic!("read should complete");
        };
        assert_eq!(record.values(), &[1, 2, 3, 4, 5, 6, 0, 0, 0]);
    }

    #[test]
    fn gyro_only_interrupt_scenario() {
        let rig = rig(SensorConfig::default());
        let session = rig.device.open().unwrap();
        rig.hw.set_triple(SensorKind::Accel, [11, 12, 13]);

        let (waker, _) = counting_waker();
        let mut read = session.read(ReadOptions::new());
        assert!(poll_once(&mut read, &waker).is_pending());
        rig.fire(SensorKind::Gyro, [7, 8, 9]);

        let Poll::Ready(Ok(record)) = poll_once(&mut read, &waker) else {
            panic!("read should complete");
        };
        assert_eq!(record.values(), &[0, 0, 0, 0, 0, 0, 7, 8, 9]);
    }

    #[test]
    fn disabled_classes_read_as_zero() {
        let rig = rig(SensorConfig::default());
        let session = rig.device.open().unwrap();
        session.set_enabled_classes(SensorClasses::COMPASS);

        let (waker, _) = counting_waker();
        let mut read = session.read(ReadOptions::new());
        assert!(poll_once(&mut read, &waker).is_pending());

        rig.hw.load(&SampleRecord::from_values([1, 2, 3, 4, 5, 6, 7, 8, 9]));
        rig.hw.raise(SensorClasses::all());
        rig.device.handle_interrupt();

        let Poll::Ready(Ok(record)) = poll_once(&mut read, &waker) else {
            panic!("read should complete");
        };
        assert_eq!(record.values(), &[0, 0, 0, 4, 5, 6, 0, 0, 0]);
    }

    #[test]
    fn class_enabled_after_its_interrupt_reads_the_interrupt_time_value() {
        let rig = rig(SensorConfig::default());
        let session = rig.device.open().unwrap();
        session.set_enabled_classes(SensorClasses::COMPASS);

        let (waker, _) = counting_waker();
        let mut read = session.read(ReadOptions::new());
        assert!(poll_once(&mut read, &waker).is_pending());

        rig.fire(SensorKind::Accel, [1, 2, 3]);
        session.set_enabled_classes(SensorClasses::ACCEL | SensorClasses::COMPASS);
        rig.hw.set_triple(SensorKind::Accel, [9, 9, 9]);

        let Poll::Ready(Ok(record)) = poll_once(&mut read, &waker) else {
            panic!("read should complete");
        };
        assert_eq!(record.values(), &[1, 2, 3, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn interrupt_time_values_win_over_later_register_changes() {
        let rig = rig(SensorConfig::default());
        let session = rig.device.open().unwrap();
        let (waker, _) = counting_waker();
        let mut read = session.read(ReadOptions::new());
        assert!(poll_once(&mut read, &waker).is_pending());

        rig.fire(SensorKind::Accel, [1, 1, 1]);
        rig.hw.set_triple(SensorKind::Accel, [2, 2, 2]);
        let Poll::Ready(Ok(record)) = poll_once(&mut read, &waker) else {
            panic!("read should complete");
        };
        assert_eq!(record.triple(SensorKind::Accel), [1, 1, 1]);
    }

    #[test]
    fn before_wait_returns_the_pre_wait_sample() {
        let rig = rig(SensorConfig::new().with_sample_point(SamplePoint::BeforeWait));
        let session = rig.device.open().unwrap();
        session.set_enabled_classes(SensorClasses::ACCEL | SensorClasses::GYRO);
        rig.hw.load(&SampleRecord::from_values([1, 2, 3, 4, 5, 6, 7, 8, 9]));

        let (waker, _) = counting_waker();
        let mut read = session.read(ReadOptions::new());
        assert!(poll_once(&mut read, &waker).is_pending());

        rig.fire(SensorKind::Accel, [100, 200, 300]);
        let Poll::Ready(Ok(record)) = poll_once(&mut read, &waker) else {
            panic!("read should complete");
        };
        assert_eq!(record.values(), &[1, 2, 3, 0, 0, 0, 7, 8, 9]);
    }

    #[test]
    fn data_reported_before_the_read_began_is_discarded() {
        let rig = rig(SensorConfig::default());
        let session = rig.device.open().unwrap();
        rig.fire(SensorKind::Compass, [4, 5, 6]);
        assert_eq!(rig.device.arm_state(), ArmState::DataReady);

        assert!(try_poll_immediate(session.read(ReadOptions::new())).is_none());
        assert!(rig.device.ready_classes().is_empty());

        let (waker, _) = counting_waker();
        let mut read = session.read(ReadOptions::new());
        assert!(poll_once(&mut read, &waker).is_pending());
        rig.fire(SensorKind::Gyro, [7, 8, 9]);
        let Poll::Ready(Ok(record)) = poll_once(&mut read, &waker) else {
            panic!("read should complete");
        };
        assert_eq!(record.values(), &[0, 0, 0, 0, 0, 0, 7, 8, 9]);
    }

    #[test]
    fn drained_read_is_not_repeated() {
        let rig = rig(SensorConfig::default());
        let session = rig.device.open().unwrap();
        let (waker, _) = counting_waker();

        let mut first = session.read(ReadOptions::new());
        assert!(poll_once(&mut first, &waker).is_pending());
        rig.fire(SensorKind::Gyro, [7, 8, 9]);
        assert!(poll_once(&mut first, &waker).is_ready());
        drop(first);
        assert!(rig.device.ready_classes().is_empty());

        let mut second = session.read(ReadOptions::new());
        assert!(poll_once(&mut second, &waker).is_pending());
    }

    #[test]
    fn interrupts_before_the_reader_runs_accumulate() {
        let rig = rig(SensorConfig::default());
        let session = rig.device.open().unwrap();
        let (waker, wakes) = counting_waker();
        let mut read = session.read(ReadOptions::new());
        assert!(poll_once(&mut read, &waker).is_pending());

        rig.fire(SensorKind::Accel, [1, 2, 3]);
        rig.fire(SensorKind::Gyro, [7, 8, 9]);
        assert_eq!(wakes.load(Ordering::SeqCst), 1);
        let Poll::Ready(Ok(record)) = poll_once(&mut read, &waker) else {
            panic!("read should complete");
        };
        assert_eq!(record.values(), &[1, 2, 3, 0, 0, 0, 7, 8, 9]);
    }

    #[test]
    fn spurious_interrupt_is_not_handled() {
        let rig = rig(SensorConfig::default());
        let session = rig.device.open().unwrap();
        let (waker, wakes) = counting_waker();
        let mut read = session.read(ReadOptions::new());
        assert!(poll_once(&mut read, &waker).is_pending());

        assert_eq!(rig.device.handle_interrupt(), IrqReturn::None);
        assert_eq!(wakes.load(Ordering::SeqCst), 0);
        assert_eq!(rig.device.irq_counts(), (0, 1));
        assert!(poll_once(&mut read, &waker).is_pending());
    }

    #[test]
    fn cancellation_unblocks_read() {
        let rig = rig(SensorConfig::default());
        let session = rig.device.open().unwrap();
        let token = CancelToken::new();
        let (waker, wakes) = counting_waker();

        let mut read = session.read(ReadOptions::new().cancel_on(&token));
        assert!(poll_once(&mut read, &waker).is_pending());
        token.cancel();
        assert_eq!(wakes.load(Ordering::SeqCst), 1);
        assert_eq!(
            poll_once(&mut read, &waker),
            Poll::Ready(Err(SensorError::Cancelled))
        );
        drop(read);

        // Retrying after acknowledging the cancellation works.
        token.reset();
        let mut retry = session.read(ReadOptions::new().cancel_on(&token));
        assert!(poll_once(&mut retry, &waker).is_pending());
        rig.fire(SensorKind::Compass, [4, 5, 6]);
        assert!(matches!(poll_once(&mut retry, &waker), Poll::Ready(Ok(_))));
    }

    #[test]
    fn ready_data_wins_over_cancellation() {
        let rig = rig(SensorConfig::default());
        let session = rig.device.open().unwrap();
        let token = CancelToken::new();
        let (waker, _) = counting_waker();
        let mut read = session.read(ReadOptions::new().cancel_on(&token));
        assert!(poll_once(&mut read, &waker).is_pending());

        rig.fire(SensorKind::Accel, [1, 2, 3]);
        token.cancel();
        assert!(matches!(poll_once(&mut read, &waker), Poll::Ready(Ok(_))));
    }

    #[test]
    fn timeout_expires_on_timer_tick() {
        let rig = rig(SensorConfig::default());
        let session = rig.device.open().unwrap();
        let (waker, wakes) = counting_waker();

        let mut read = session.read(ReadOptions::new().timeout(Duration::from_millis(10)));
        assert!(poll_once(&mut read, &waker).is_pending());
        assert!(poll_once(&mut read, &waker).is_pending());
        assert_eq!(rig.timebase.timers().len(), 1);

        rig.clock.advance(Duration::from_millis(9));
        assert_eq!(rig.timebase.tick(), 0);
        rig.clock.advance(Duration::from_millis(1));
        assert_eq!(rig.timebase.tick(), 1);
        assert_eq!(wakes.load(Ordering::SeqCst), 1);
        assert_eq!(
            poll_once(&mut read, &waker),
            Poll::Ready(Err(SensorError::TimedOut))
        );
        assert!(rig.timebase.timers().is_empty());
    }

    #[test]
    fn completed_reads_release_their_timers() {
        let rig = rig(SensorConfig::new().with_default_timeout(Duration::from_secs(3600)));
        let session = rig.device.open().unwrap();
        let (waker, _) = counting_waker();

        for x in 0..100 {
            let mut read = session.read(ReadOptions::new());
            assert!(poll_once(&mut read, &waker).is_pending());
            assert_eq!(rig.timebase.timers().len(), 1);
            rig.fire(SensorKind::Gyro, [x, 0, 0]);
            assert!(matches!(poll_once(&mut read, &waker), Poll::Ready(Ok(_))));
            assert!(rig.timebase.timers().is_empty());
        }
    }

    #[test]
    fn abandoned_reads_release_their_timers() {
        let rig = rig(SensorConfig::new().with_default_timeout(Duration::from_secs(3600)));
        let session = rig.device.open().unwrap();
        let token = CancelToken::new();
        let (waker, _) = counting_waker();

        let mut read = session.read(ReadOptions::new().cancel_on(&token));
        assert!(poll_once(&mut read, &waker).is_pending());
        token.cancel();
        assert_eq!(
            poll_once(&mut read, &waker),
            Poll::Ready(Err(SensorError::Cancelled))
        );
        assert!(rig.timebase.timers().is_empty());
        drop(read);

        let mut read = session.read(ReadOptions::new());
        assert!(poll_once(&mut read, &waker).is_pending());
        assert_eq!(rig.timebase.timers().len(), 1);
        drop(read);
        assert!(rig.timebase.timers().is_empty());
    }

    #[test]
    fn new_waker_replaces_the_armed_timer() {
        let rig = rig(SensorConfig::new().with_default_timeout(Duration::from_secs(1)));
        let session = rig.device.open().unwrap();
        let (first, _) = counting_waker();
        let (second, _) = counting_waker();

        let mut read = session.read(ReadOptions::new());
        assert!(poll_once(&mut read, &first).is_pending());
        assert!(poll_once(&mut read, &second).is_pending());
        assert_eq!(rig.timebase.timers().len(), 1);
    }

    #[test]
    fn config_default_timeout_applies() {
        let rig = rig(SensorConfig::new().with_default_timeout(Duration::from_millis(5)));
        let session = rig.device.open().unwrap();
        let (waker, _) = counting_waker();

        let mut read = session.read(ReadOptions::new());
        assert!(poll_once(&mut read, &waker).is_pending());
        rig.clock.advance(Duration::from_millis(5));
        assert_eq!(
            poll_once(&mut read, &waker),
            Poll::Ready(Err(SensorError::TimedOut))
        );
    }

    #[test]
    fn shutdown_fails_waiting_reader_and_future_opens() {
        let rig = rig(SensorConfig::default());
        let session = rig.device.open().unwrap();
        let (waker, wakes) = counting_waker();

        let mut read = session.read(ReadOptions::new());
        assert!(poll_once(&mut read, &waker).is_pending());
        rig.device.shut_down();

        assert_eq!(wakes.load(Ordering::SeqCst), 1);
        assert_eq!(rig.hw.enabled(), SensorClasses::empty());
        assert_eq!(
            poll_once(&mut read, &waker),
            Poll::Ready(Err(SensorError::Shutdown))
        );
        assert_eq!(rig.device.arm_state(), ArmState::Shutdown);
        drop(read);
        drop(session);

        assert_eq!(rig.device.open().err(), Some(SensorError::NotBound));
        assert!(!rig.device.is_open());
    }

    #[test]
    fn dropped_read_unregisters_waker() {
        let rig = rig(SensorConfig::default());
        let session = rig.device.open().unwrap();
        let (waker, wakes) = counting_waker();

        let mut read = session.read(ReadOptions::new());
        assert!(poll_once(&mut read, &waker).is_pending());
        drop(read);
        assert!(!rig.device.has_waiting_reader());

        rig.fire(SensorKind::Accel, [1, 2, 3]);
        assert_eq!(wakes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn small_window_is_rejected() {
        let hw = EmulatedSensor::with_window(0x10);
        let timebase = Timebase::new(
            Arc::new(ManualClock::new(0)),
            Arc::new(TimerQueue::new()),
        );
        assert_eq!(
            SensorDevice::new(hw, SensorConfig::default(), timebase).err(),
            Some(DriverError::DeviceNotFound)
        );
    }
}
