//! Register-level model of the goldfish sensor.
//!
//! [`EmulatedSensor`] stands in for the device when there is no hardware
//! (bring-up, host tests). It models the three behaviours the driver relies
//! on:
//!
//! - writing `INT_ENABLE` selects which classes may raise the interrupt;
//! - reading `INT_ENABLE` returns the pending classes and clears them;
//! - the nine sample registers hold whatever was last loaded.
//!
//! No IRQ is delivered by the model itself; after [`raise`](EmulatedSensor::raise)
//! the caller dispatches the interrupt line.

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, Ordering};

use goldfish_core::sync::IrqSpinLock;
use goldfish_mmio::RegisterIo;

use crate::regs::{REGISTER_SPAN, offset};
use crate::sample::{SampleRecord, SensorClasses, SensorKind};

/// Number of enable-register writes [`EmulatedSensor::enable_writes`] keeps.
pub const ENABLE_HISTORY: usize = 32;

/// In-memory goldfish sensor.
pub struct EmulatedSensor {
    enable: AtomicU32,
    pending: AtomicU32,
    samples: [AtomicU32; 9],
    window: usize,
    enable_writes: IrqSpinLock<VecDeque<SensorClasses>>,
}

impl EmulatedSensor {
    /// Creates a device with a full-size register window.
    pub fn new() -> Self {
        Self::with_window(REGISTER_SPAN)
    }

    /// Creates a device whose window reports `size` bytes.
    pub fn with_window(size: usize) -> Self {
        Self {
            enable: AtomicU32::new(0),
            pending: AtomicU32::new(0),
            samples: [const { AtomicU32::new(0) }; 9],
            window: size,
            enable_writes: IrqSpinLock::new(VecDeque::new()),
        }
    }

    /// Loads the sample registers of one class.
    #[allow(clippy::cast_sign_loss)]
    pub fn set_triple(&self, kind: SensorKind, xyz: [i32; 3]) {
        let base = kind.index() * 3;
        for (slot, value) in self.samples[base..base + 3].iter().zip(xyz) {
            slot.store(value as u32, Ordering::Release);
        }
    }

    /// Loads every sample register.
    pub fn load(&self, record: &SampleRecord) {
        for kind in SensorKind::ALL {
            self.set_triple(kind, record.triple(kind));
        }
    }

    /// Marks `classes` as having fresh data.
    ///
    /// Only classes currently enabled become pending; the result is the new
    /// pending set. An empty result means the device would not assert its
    /// interrupt line.
    pub fn raise(&self, classes: SensorClasses) -> SensorClasses {
        let raised = classes & self.enabled();
        if raised.is_empty() {
            return SensorClasses::empty();
        }
        let pending = self.pending.fetch_or(raised.bits(), Ordering::AcqRel) | raised.bits();
        SensorClasses::from_bits_truncate(pending)
    }

    /// Loads samples for `kind` and raises its class.
    pub fn report(&self, kind: SensorKind, xyz: [i32; 3]) -> SensorClasses {
        self.set_triple(kind, xyz);
        self.raise(kind.class())
    }

    /// Current contents of the enable register.
    pub fn enabled(&self) -> SensorClasses {
        SensorClasses::from_bits_truncate(self.enable.load(Ordering::Acquire))
    }

    /// Classes raised and not yet acknowledged.
    pub fn pending(&self) -> SensorClasses {
        SensorClasses::from_bits_truncate(self.pending.load(Ordering::Acquire))
    }

    /// The last [`ENABLE_HISTORY`] values written to the enable register,
    /// oldest first.
    pub fn enable_writes(&self) -> Vec<SensorClasses> {
        self.enable_writes.lock().iter().copied().collect()
    }
}

impl Default for EmulatedSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterIo for EmulatedSensor {
    fn size(&self) -> usize {
        self.window
    }

    fn read32(&self, off: usize) -> u32 {
        match off {
            offset::INT_ENABLE => self.pending.swap(0, Ordering::AcqRel),
            offset::ACCEL_X..=offset::GYRO_Z if off % 4 == 0 => {
                self.samples[(off - offset::ACCEL_X) / 4].load(Ordering::Acquire)
            }
            _ => 0,
        }
    }

    fn write32(&self, off: usize, value: u32) {
        if off == offset::INT_ENABLE {
            let classes = SensorClasses::from_bits_truncate(value);
            self.enable.store(classes.bits(), Ordering::Release);
            let mut history = self.enable_writes.lock();
            if history.len() == ENABLE_HISTORY {
                history.pop_front();
            }
            history.push_back(classes);
        }
    }
}
