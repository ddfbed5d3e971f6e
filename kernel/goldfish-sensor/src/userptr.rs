//! Validated user-space buffers.
//!
//! [`UserSlice`] is a source the kernel copies *from* (the `write` path),
//! [`UserSliceMut`] a destination it copies *to* (the `read` path). Raw
//! ranges from a system call are checked against the user half of the
//! address space; kernel-owned buffers can be wrapped directly. Every failure
//! surfaces as [`SensorError::TransferFault`].

use core::marker::PhantomData;

use crate::error::SensorError;

/// Upper bound of canonical user-space addresses.
pub const USER_ADDR_MAX: usize = 0x0000_8000_0000_0000;

fn check_user_range(addr: usize, len: usize) -> Result<(), SensorError> {
    if len == 0 {
        return Ok(());
    }
    let end = addr.checked_add(len).ok_or(SensorError::TransferFault)?;
    if addr == 0 || end > USER_ADDR_MAX {
        return Err(SensorError::TransferFault);
    }
    Ok(())
}

/// A readable user buffer.
#[derive(Debug, Clone, Copy)]
pub struct UserSlice<'a> {
    ptr: *const u8,
    len: usize,
    _marker: PhantomData<&'a [u8]>,
}

// SAFETY: Behaves like `&'a [u8]`.
unsafe impl Send for UserSlice<'_> {}
// SAFETY: Behaves like `&'a [u8]`.
unsafe impl Sync for UserSlice<'_> {}

impl<'a> UserSlice<'a> {
    /// Validates a raw user range.
    ///
    /// # Safety
    ///
    /// If validation succeeds, `addr..addr + len` must be mapped and
    /// readable for `'a`.
    pub unsafe fn from_raw(addr: usize, len: usize) -> Result<Self, SensorError> {
        check_user_range(addr, len)?;
        Ok(Self {
            ptr: addr as *const u8,
            len,
            _marker: PhantomData,
        })
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` for a zero-length buffer.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copies the first `dst.len()` bytes into `dst`.
    ///
    /// Fails without copying anything if the buffer is shorter than `dst`.
    pub fn copy_to(&self, dst: &mut [u8]) -> Result<(), SensorError> {
        if dst.len() > self.len {
            return Err(SensorError::TransferFault);
        }
        if dst.is_empty() {
            return Ok(());
        }
        // SAFETY: `ptr..ptr + len` is readable for 'a and `dst.len() <= len`.
        let src = unsafe { core::slice::from_raw_parts(self.ptr, dst.len()) };
        dst.copy_from_slice(src);
        Ok(())
    }
}

impl<'a> From<&'a [u8]> for UserSlice<'a> {
    fn from(buf: &'a [u8]) -> Self {
        Self {
            ptr: buf.as_ptr(),
            len: buf.len(),
            _marker: PhantomData,
        }
    }
}

/// A writable user buffer.
#[derive(Debug)]
pub struct UserSliceMut<'a> {
    ptr: *mut u8,
    len: usize,
    _marker: PhantomData<&'a mut [u8]>,
}

// SAFETY: Behaves like `&'a mut [u8]`.
unsafe impl Send for UserSliceMut<'_> {}
// SAFETY: Behaves like `&'a mut [u8]`.
unsafe impl Sync for UserSliceMut<'_> {}

impl<'a> UserSliceMut<'a> {
    /// Validates a raw user range.
    ///
    /// # Safety
    ///
    /// If validation succeeds, `addr..addr + len` must be mapped, writable
    /// and not otherwise borrowed for `'a`.
    pub unsafe fn from_raw(addr: usize, len: usize) -> Result<Self, SensorError> {
        check_user_range(addr, len)?;
        Ok(Self {
            ptr: addr as *mut u8,
            len,
            _marker: PhantomData,
        })
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` for a zero-length buffer.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copies `src` to the start of the buffer.
    ///
    /// Fails without writing anything if the buffer is shorter than `src`.
    pub fn copy_from(&mut self, src: &[u8]) -> Result<(), SensorError> {
        if src.len() > self.len {
            return Err(SensorError::TransferFault);
        }
        if src.is_empty() {
            return Ok(());
        }
        // SAFETY: `ptr..ptr + len` is writable and unaliased for 'a, and
        // `src.len() <= len`.
        let dst = unsafe { core::slice::from_raw_parts_mut(self.ptr, src.len()) };
        dst.copy_from_slice(src);
        Ok(())
    }
}

impl<'a> From<&'a mut [u8]> for UserSliceMut<'a> {
    fn from(buf: &'a mut [u8]) -> Self {
        Self {
            ptr: buf.as_mut_ptr(),
            len: buf.len(),
            _marker: PhantomData,
        }
    }
}
