//! Sample data model.

use core::fmt;

bitflags::bitflags! {
    /// Set of sensor classes.
    ///
    /// The same bit layout is used by the device's interrupt-enable register
    /// and its pending-status readback.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SensorClasses: u32 {
        /// Accelerometer.
        const ACCEL = 1 << 0;
        /// Magnetic compass.
        const COMPASS = 1 << 1;
        /// Gyroscope.
        const GYRO = 1 << 2;
    }
}

/// One sensor class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    /// Accelerometer.
    Accel,
    /// Magnetic compass.
    Compass,
    /// Gyroscope.
    Gyro,
}

impl SensorKind {
    /// Every kind, in record order.
    pub const ALL: [Self; 3] = [Self::Accel, Self::Compass, Self::Gyro];

    /// Position of this kind's triple in a [`SampleRecord`].
    pub const fn index(self) -> usize {
        match self {
            Self::Accel => 0,
            Self::Compass => 1,
            Self::Gyro => 2,
        }
    }

    /// The class bit for this kind.
    pub const fn class(self) -> SensorClasses {
        match self {
            Self::Accel => SensorClasses::ACCEL,
            Self::Compass => SensorClasses::COMPASS,
            Self::Gyro => SensorClasses::GYRO,
        }
    }
}

/// Nine raw readings: accel XYZ, compass XYZ, gyro XYZ.
///
/// Values pass through from the registers unmodified. A record handed to a
/// consumer has every triple outside the enabled classes zeroed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SampleRecord {
    values: [i32; 9],
}

impl SampleRecord {
    /// Size of the serialized record.
    pub const SIZE: usize = 36;

    /// All-zero record.
    pub const ZERO: Self = Self { values: [0; 9] };

    /// Builds a record from nine values in record order.
    pub const fn from_values(values: [i32; 9]) -> Self {
        Self { values }
    }

    /// Returns the nine values in record order.
    pub const fn values(&self) -> &[i32; 9] {
        &self.values
    }

    /// Returns the X/Y/Z triple of `kind`.
    pub fn triple(&self, kind: SensorKind) -> [i32; 3] {
        let base = kind.index() * 3;
        [
            self.values[base],
            self.values[base + 1],
            self.values[base + 2],
        ]
    }

    /// Replaces the X/Y/Z triple of `kind`.
    pub fn set_triple(&mut self, kind: SensorKind, xyz: [i32; 3]) {
        let base = kind.index() * 3;
        self.values[base..base + 3].copy_from_slice(&xyz);
    }

    /// Returns a copy with every class outside `classes` zeroed.
    #[must_use]
    pub fn masked(&self, classes: SensorClasses) -> Self {
        let mut out = *self;
        for kind in SensorKind::ALL {
            if !classes.contains(kind.class()) {
                out.set_triple(kind, [0; 3]);
            }
        }
        out
    }

    /// Serializes to the 36-byte wire layout (native-endian `i32`s).
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        for (chunk, value) in out.chunks_exact_mut(4).zip(self.values) {
            chunk.copy_from_slice(&value.to_ne_bytes());
        }
        out
    }

    /// Parses the 36-byte wire layout.
    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let mut values = [0i32; 9];
        for (value, chunk) in values.iter_mut().zip(bytes.chunks_exact(4)) {
            *value = i32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Self { values }
    }
}

impl From<[i32; 9]> for SampleRecord {
    fn from(values: [i32; 9]) -> Self {
        Self::from_values(values)
    }
}

impl fmt::Debug for SampleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleRecord")
            .field("accel", &self.triple(SensorKind::Accel))
            .field("compass", &self.triple(SensorKind::Compass))
            .field("gyro", &self.triple(SensorKind::Gyro))
            .finish()
    }
}
