//! POSIX error numbers reported across the device-file boundary.
//!
//! Values match Linux so a userspace consumer can interpret them without a
//! translation table. File operations return them negated.

/// Interrupted system call.
pub const EINTR: isize = 4;
/// Bad address.
pub const EFAULT: isize = 14;
/// Device or resource busy.
pub const EBUSY: isize = 16;
/// No such device.
pub const ENODEV: isize = 19;
/// Connection timed out.
pub const ETIMEDOUT: isize = 110;

/// Returns the symbolic name of a (positive) error number.
pub const fn name(errno: isize) -> &'static str {
    match errno {
        EINTR => "EINTR",
        EFAULT => "EFAULT",
        EBUSY => "EBUSY",
        ENODEV => "ENODEV",
        ETIMEDOUT => "ETIMEDOUT",
        _ => "E?",
    }
}
