//! Synchronization primitives.
//!
//! [`IrqSpinLock`] is the only lock in the driver stack: every piece of state
//! shared with an interrupt handler lives behind one. [`WakerSlot`] is the
//! single-slot notification an interrupt producer uses to wake its one
//! consumer.

mod irq_spinlock;
mod waker_slot;

pub(crate) mod loom_compat;

pub use irq_spinlock::{IrqSpinLock, IrqSpinLockGuard};
pub use waker_slot::WakerSlot;
