//! Goldfish sensor register window.
//!
//! | Offset | Register | |
//! |--------|----------|---|
//! | `0x00` | `INT_ENABLE` | write: enabled classes; read: pending classes |
//! | `0x04`-`0x0c` | `ACCEL_X/Y/Z` | read-only |
//! | `0x10`-`0x18` | `COMPASS_X/Y/Z` | read-only |
//! | `0x1c`-`0x24` | `GYRO_X/Y/Z` | read-only |

use goldfish_mmio::{RegisterIo, register_block};

use crate::sample::{SampleRecord, SensorClasses, SensorKind};

/// Register offsets.
pub mod offset {
    /// Interrupt enable (write) / pending status (read).
    pub const INT_ENABLE: usize = 0x00;
    /// Accelerometer X.
    pub const ACCEL_X: usize = 0x04;
    /// Accelerometer Y.
    pub const ACCEL_Y: usize = 0x08;
    /// Accelerometer Z.
    pub const ACCEL_Z: usize = 0x0c;
    /// Compass X.
    pub const COMPASS_X: usize = 0x10;
    /// Compass Y.
    pub const COMPASS_Y: usize = 0x14;
    /// Compass Z.
    pub const COMPASS_Z: usize = 0x18;
    /// Gyroscope X.
    pub const GYRO_X: usize = 0x1c;
    /// Gyroscope Y.
    pub const GYRO_Y: usize = 0x20;
    /// Gyroscope Z.
    pub const GYRO_Z: usize = 0x24;
}

register_block! {
    /// Typed view of the sensor registers.
    pub SensorRegs {
        /// Pending sensor classes (reading acknowledges them).
        [0x00; u32; rw] int_enable => SensorClasses,
        /// Accelerometer X.
        [0x04; u32; ro] accel_x,
        /// Accelerometer Y.
        [0x08; u32; ro] accel_y,
        /// Accelerometer Z.
        [0x0c; u32; ro] accel_z,
        /// Compass X.
        [0x10; u32; ro] compass_x,
        /// Compass Y.
        [0x14; u32; ro] compass_y,
        /// Compass Z.
        [0x18; u32; ro] compass_z,
        /// Gyroscope X.
        [0x1c; u32; ro] gyro_x,
        /// Gyroscope Y.
        [0x20; u32; ro] gyro_y,
        /// Gyroscope Z.
        [0x24; u32; ro] gyro_z,
    }
}

/// Bytes a register window must span.
pub const REGISTER_SPAN: usize = 0x28;

impl<I: RegisterIo> SensorRegs<I> {
    /// Reads and acknowledges the pending classes, dropping unknown bits.
    pub fn pending(&self) -> SensorClasses {
        self.int_enable() & SensorClasses::all()
    }

    /// Enables interrupts for `classes`.
    pub fn arm(&self, classes: SensorClasses) {
        self.set_int_enable(classes);
    }

    /// Disables every sensor interrupt.
    pub fn disarm(&self) {
        self.set_int_enable(SensorClasses::empty());
    }

    /// Reads the X/Y/Z registers of one class.
    #[allow(clippy::cast_possible_wrap)]
    pub fn read_triple(&self, kind: SensorKind) -> [i32; 3] {
        let raw = match kind {
            SensorKind::Accel => [self.accel_x(), self.accel_y(), self.accel_z()],
            SensorKind::Compass => [self.compass_x(), self.compass_y(), self.compass_z()],
            SensorKind::Gyro => [self.gyro_x(), self.gyro_y(), self.gyro_z()],
        };
        raw.map(|v| v as i32)
    }

    /// Reads the registers of every class in `classes` into `record`.
    /// Triples of other classes are left untouched.
    pub fn sample_into(&self, record: &mut SampleRecord, classes: SensorClasses) {
        for kind in SensorKind::ALL {
            if classes.contains(kind.class()) {
                record.set_triple(kind, self.read_triple(kind));
            }
        }
    }

    /// Samples `classes`; every other triple is zero.
    pub fn sample(&self, classes: SensorClasses) -> SampleRecord {
        let mut record = SampleRecord::ZERO;
        self.sample_into(&mut record, classes);
        record
    }
}
