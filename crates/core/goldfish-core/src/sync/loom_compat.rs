//! Loom compatibility shim.
//!
//! Under `cfg(loom)` the atomics and the spin hint come from loom so the
//! primitives in this module can be model-checked unchanged.

#[cfg(loom)]
pub(crate) use loom::hint::spin_loop;
#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicBool, Ordering};

#[cfg(not(loom))]
pub(crate) use core::hint::spin_loop;
#[cfg(not(loom))]
pub(crate) use core::sync::atomic::{AtomicBool, Ordering};
