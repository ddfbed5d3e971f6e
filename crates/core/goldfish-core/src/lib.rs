//! Core primitives shared by the goldfish sensor driver stack.
//!
//! Everything here is `no_std` + `alloc` and usable from interrupt context
//! unless noted otherwise:
//!
//! - [`sync`]: the interrupt-safe spin lock and the single-slot waker used
//!   to hand data from an interrupt handler to one waiting task.
//! - [`cancel`]: cancellation tokens that unblock a pending wait.
//! - [`time`]: clock sources and the deadline queue behind read timeouts.
//! - [`log`]: leveled logging macros (`kinfo!`, `kdebug!`, ...).
//! - [`errno`]: POSIX error numbers reported at the device-file boundary.
//! - [`task`]: waker helpers for polling futures without an executor.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

extern crate alloc;

pub mod cancel;
pub mod errno;
pub mod log;
pub mod sync;
pub mod task;
pub mod time;
