//! Driver for the goldfish virtual sensor device.
//!
//! The device exposes accelerometer, compass and gyroscope readings through
//! ten 32-bit registers and raises an interrupt when fresh samples are
//! available. A single consumer opens the device, optionally narrows the set
//! of sensor classes it cares about, and blocks in `read` until the next
//! interrupt hands over a [`SampleRecord`].
//!
//! Layering, bottom-up:
//!
//! - [`regs`]: the register window and the typed [`SensorRegs`] view.
//! - [`device`]: [`SensorDevice`], the lock/wait hand-off between the
//!   interrupt handler and the blocking reader.
//! - [`file`]: the character-device adapter registered in [`devfs`].
//! - [`binding`]: probe/remove against platform resources.
//!
//! [`emulated`] provides a register-level model of the device for bring-up
//! and tests.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

extern crate alloc;

pub mod binding;
pub mod config;
pub mod devfs;
pub mod device;
pub mod emulated;
pub mod error;
pub mod file;
pub mod irq;
pub mod regs;
pub mod sample;
pub mod userptr;

pub use binding::{DeviceHandle, ProbeContext, SensorBinding, probe};
pub use config::{SamplePoint, SensorConfig};
pub use device::{ArmState, ReadOptions, SensorDevice, Session};
pub use error::{DriverError, SensorError};
pub use regs::SensorRegs;
pub use sample::{SampleRecord, SensorClasses, SensorKind};
