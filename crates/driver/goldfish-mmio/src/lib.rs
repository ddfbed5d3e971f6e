//! Register access for memory-mapped devices.
//!
//! [`RegisterIo`] is the raw contract: 32/64-bit reads and writes at byte
//! offsets inside a window. [`MmioWindow`] implements it with volatile
//! accesses to mapped device memory; its constructor is the only `unsafe`
//! entry point. The [`register_block!`] macro generates a typed view (named
//! registers, bitflags values, access modes) over any backend.
//!
//! # Example
//!
//! ```ignore
//! use goldfish_mmio::{MmioWindow, register_block};
//!
//! register_block! {
//!     /// Example device.
//!     pub ExampleRegs {
//!         /// Control register.
//!         [0x00; u32; rw] control => ExampleControl,
//!         /// Free-running counter.
//!         [0x08; u64; ro] counter,
//!     }
//! }
//!
//! let regs = ExampleRegs::new(unsafe { MmioWindow::new(base, 0x10) });
//! let ticks = regs.counter();
//! ```

#![no_std]
#![warn(missing_docs)]

extern crate alloc;
// Generated code names this crate by absolute path.
extern crate self as goldfish_mmio;

use alloc::sync::Arc;
use core::ptr::NonNull;

pub use goldfish_mmio_macros::register_block;

/// Raw register access at byte offsets.
///
/// Accesses do not fail at runtime; a backend that cannot reach its device
/// must be rejected when it is created.
pub trait RegisterIo: Send + Sync {
    /// Size of the window in bytes.
    fn size(&self) -> usize;

    /// Reads the 32-bit register at `offset`.
    fn read32(&self, offset: usize) -> u32;

    /// Writes the 32-bit register at `offset`.
    fn write32(&self, offset: usize, value: u32);

    /// Reads a 64-bit register as two 32-bit halves, low half first.
    fn read64(&self, offset: usize) -> u64 {
        let lo = u64::from(self.read32(offset));
        let hi = u64::from(self.read32(offset + 4));
        lo | (hi << 32)
    }

    /// Writes a 64-bit register as two 32-bit halves, low half first.
    #[allow(clippy::cast_possible_truncation)]
    fn write64(&self, offset: usize, value: u64) {
        self.write32(offset, value as u32);
        self.write32(offset + 4, (value >> 32) as u32);
    }
}

impl<R: RegisterIo + ?Sized> RegisterIo for &R {
    fn size(&self) -> usize {
        (**self).size()
    }

    fn read32(&self, offset: usize) -> u32 {
        (**self).read32(offset)
    }

    fn write32(&self, offset: usize, value: u32) {
        (**self).write32(offset, value);
    }

    fn read64(&self, offset: usize) -> u64 {
        (**self).read64(offset)
    }

    fn write64(&self, offset: usize, value: u64) {
        (**self).write64(offset, value);
    }
}

impl<R: RegisterIo + ?Sized> RegisterIo for Arc<R> {
    fn size(&self) -> usize {
        (**self).size()
    }

    fn read32(&self, offset: usize) -> u32 {
        (**self).read32(offset)
    }

    fn write32(&self, offset: usize, value: u32) {
        (**self).write32(offset, value);
    }

    fn read64(&self, offset: usize) -> u64 {
        (**self).read64(offset)
    }

    fn write64(&self, offset: usize, value: u64) {
        (**self).write64(offset, value);
    }
}

/// A mapped MMIO window accessed with volatile loads and stores.
#[derive(Debug)]
pub struct MmioWindow {
    base: NonNull<u8>,
    size: usize,
}

// SAFETY: Device registers are shared by nature; every access is a single
// volatile load or store, and callers serialize multi-register sequences.
unsafe impl Send for MmioWindow {}
// SAFETY: Same as above.
unsafe impl Sync for MmioWindow {}

impl MmioWindow {
    /// Wraps a mapped register window.
    ///
    /// # Safety
    ///
    /// `base..base + size` must be mapped device memory (uncached), valid
    /// for the whole lifetime of the returned value, and not accessed
    /// through any other non-volatile path.
    pub const unsafe fn new(base: NonNull<u8>, size: usize) -> Self {
        Self { base, size }
    }

    /// Returns the base address.
    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    fn checked<T>(&self, offset: usize) -> NonNull<T> {
        let width = core::mem::size_of::<T>();
        assert!(
            offset % width == 0 && offset.checked_add(width).is_some_and(|end| end <= self.size),
            "MMIO access at {offset:#x} outside {:#x}-byte window",
            self.size
        );
        // SAFETY: The assertion keeps the offset inside the window given to `new`.
        unsafe { self.base.add(offset).cast::<T>() }
    }
}

impl RegisterIo for MmioWindow {
    fn size(&self) -> usize {
        self.size
    }

    fn read32(&self, offset: usize) -> u32 {
        let ptr = self.checked::<u32>(offset);
        // SAFETY: `ptr` is aligned and inside the mapped window.
        unsafe { ptr.as_ptr().read_volatile() }
    }

    fn write32(&self, offset: usize, value: u32) {
        let ptr = self.checked::<u32>(offset);
        // SAFETY: `ptr` is aligned and inside the mapped window.
        unsafe { ptr.as_ptr().write_volatile(value) }
    }

    fn read64(&self, offset: usize) -> u64 {
        let ptr = self.checked::<u64>(offset);
        // SAFETY: `ptr` is aligned and inside the mapped window.
        unsafe { ptr.as_ptr().read_volatile() }
    }

    fn write64(&self, offset: usize, value: u64) {
        let ptr = self.checked::<u64>(offset);
        // SAFETY: `ptr` is aligned and inside the mapped window.
        unsafe { ptr.as_ptr().write_volatile(value) }
    }
}
