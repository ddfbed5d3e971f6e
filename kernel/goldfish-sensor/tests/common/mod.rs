//! Host-side harness: an emulated sensor probed onto a fake platform, and a
//! thread-parking executor for driving blocking reads.

#![allow(dead_code)]

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use std::thread::{self, Thread};

use goldfish_core::time::{ManualClock, Timebase, TimerQueue};
use goldfish_sensor::devfs::MiscRegistry;
use goldfish_sensor::emulated::EmulatedSensor;
use goldfish_sensor::irq::SharedIrqLine;
use goldfish_sensor::{ProbeContext, SensorBinding, SensorConfig, probe};

pub const SENSOR_IRQ: u32 = 9;

struct ThreadWaker(Thread);

impl Wake for ThreadWaker {
    fn wake(self: Arc<Self>) {
        self.0.unpark();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.0.unpark();
    }
}

/// Runs `future` to completion on the current thread, parking between polls.
pub fn block_on<F: Future>(future: F) -> F::Output {
    let waker = Waker::from(Arc::new(ThreadWaker(thread::current())));
    let mut cx = Context::from_waker(&waker);
    let mut future = pin!(future);
    loop {
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(out) => return out,
            Poll::Pending => thread::park(),
        }
    }
}

pub struct Rig {
    pub hw: Arc<EmulatedSensor>,
    pub irq: Arc<SharedIrqLine>,
    pub registry: Arc<MiscRegistry>,
    pub clock: Arc<ManualClock>,
    pub timebase: Timebase,
    pub binding: SensorBinding<Arc<EmulatedSensor>>,
}

impl Rig {
    pub fn new(config: SensorConfig) -> Self {
        let hw = Arc::new(EmulatedSensor::new());
        let irq = Arc::new(SharedIrqLine::new(SENSOR_IRQ));
        let registry = Arc::new(MiscRegistry::new());
        let clock = Arc::new(ManualClock::new(0));
        let timebase = Timebase::new(clock.clone(), Arc::new(TimerQueue::new()));

        let binding = probe(ProbeContext {
            regs: Arc::clone(&hw),
            irq: Arc::clone(&irq),
            registry: Arc::clone(&registry),
            timebase: timebase.clone(),
            config,
        })
        .expect("probe");

        Self {
            hw,
            irq,
            registry,
            clock,
            timebase,
            binding,
        }
    }
}
