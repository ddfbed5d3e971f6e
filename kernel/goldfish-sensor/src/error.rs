//! Error types.
//!
//! [`SensorError`] is what a consumer sees; [`errno`](SensorError::errno)
//! gives the POSIX code reported through the device file. [`DriverError`]
//! covers failures while binding to hardware.

use core::fmt;

use goldfish_core::errno;

/// Consumer-facing failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// No device is bound.
    NotBound,
    /// Another session holds the device.
    Busy,
    /// A user buffer could not be copied to or from.
    TransferFault,
    /// A blocking read was cancelled. Safe to retry.
    Cancelled,
    /// A blocking read reached its deadline. Safe to retry.
    TimedOut,
    /// The device was unbound while the caller waited.
    Shutdown,
}

impl SensorError {
    /// Returns the positive errno value for this error.
    pub const fn errno(self) -> isize {
        match self {
            Self::NotBound | Self::Shutdown => errno::ENODEV,
            Self::Busy => errno::EBUSY,
            Self::TransferFault => errno::EFAULT,
            Self::Cancelled => errno::EINTR,
            Self::TimedOut => errno::ETIMEDOUT,
        }
    }

    /// Returns `true` if repeating the operation may succeed.
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Cancelled | Self::TimedOut | Self::Busy)
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotBound => f.write_str("no such device"),
            Self::Busy => f.write_str("device or resource busy"),
            Self::TransferFault => f.write_str("bad address"),
            Self::Cancelled => f.write_str("interrupted"),
            Self::TimedOut => f.write_str("timed out waiting for sensor data"),
            Self::Shutdown => f.write_str("device shut down"),
        }
    }
}

/// Failures while binding the driver to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// The register window does not cover the device's registers.
    DeviceNotFound,
    /// A registration step failed; nothing was left registered.
    InitFailed,
    /// The operation does not fit the current binding state.
    InvalidState,
    /// The driver does not implement the operation.
    Unsupported,
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceNotFound => f.write_str("device not found"),
            Self::InitFailed => f.write_str("driver initialization failed"),
            Self::InvalidState => f.write_str("invalid driver state"),
            Self::Unsupported => f.write_str("operation not supported"),
        }
    }
}
