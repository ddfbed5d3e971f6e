//! Driver configuration.
//!
//! Compile-time constants fix the wire format; [`SensorConfig`] carries the
//! per-instance knobs chosen at probe time.

use core::time::Duration;

use crate::sample::SampleRecord;

/// Name the device is registered under in the misc-device registry.
pub const DEVICE_NAME: &str = "goldfish_sensor";

/// Bytes produced by one `read`.
pub const RECORD_SIZE: usize = SampleRecord::SIZE;

/// Bytes transferred by one `write`: a native-endian `i32` class mask.
pub const MASK_SIZE: usize = 4;

/// The one ioctl command the device rejects; every other command succeeds.
pub const LEGACY_FAILING_IOCTL: u32 = 315;

/// When the sample registers are read relative to the interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplePoint {
    /// The interrupt handler latches the registers of every ready, enabled
    /// class. A read returns exactly what the device held when it signalled.
    #[default]
    Interrupt,
    /// The reader samples the enabled classes when the read starts, then
    /// waits for an interrupt and returns that earlier sample. The interrupt
    /// only paces the read.
    BeforeWait,
}

/// Per-device settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorConfig {
    /// Sampling point for reads.
    pub sample_point: SamplePoint,
    /// Timeout applied to reads that do not pass their own. `None` waits
    /// until an interrupt, cancellation or shutdown.
    pub default_timeout: Option<Duration>,
    /// Misc-device name.
    pub name: &'static str,
}

impl SensorConfig {
    /// Interrupt-time sampling, no default timeout, [`DEVICE_NAME`].
    pub const DEFAULT: Self = Self {
        sample_point: SamplePoint::Interrupt,
        default_timeout: None,
        name: DEVICE_NAME,
    };

    /// Returns the default configuration.
    pub const fn new() -> Self {
        Self::DEFAULT
    }

    /// Sets the sampling point.
    #[must_use]
    pub const fn with_sample_point(mut self, sample_point: SamplePoint) -> Self {
        self.sample_point = sample_point;
        self
    }

    /// Sets the fallback read timeout.
    #[must_use]
    pub const fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Sets the misc-device name.
    #[must_use]
    pub const fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
