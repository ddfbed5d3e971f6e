//! The `goldfish_sensor` character device.
//!
//! | Verb | Behaviour |
//! |------|-----------|
//! | open | exclusive; arms all classes |
//! | read | blocks for the next interrupt; 36-byte [`SampleRecord`] |
//! | write | 4-byte native-endian class mask; returns 4 |
//! | ioctl | `315` fails with -1, everything else returns 0 |
//! | release | disarms; returns 0 |
//!
//! [`SampleRecord`]: crate::sample::SampleRecord

use alloc::boxed::Box;

use goldfish_core::ktrace;
use goldfish_mmio::RegisterIo;

use crate::binding::DeviceHandle;
use crate::config::{LEGACY_FAILING_IOCTL, MASK_SIZE, RECORD_SIZE};
use crate::devfs::{BoxFuture, Errno, IoContext, MiscDevice, OpenFile};
use crate::device::{ReadOptions, Session};
use crate::error::SensorError;
use crate::sample::SensorClasses;
use crate::userptr::{UserSlice, UserSliceMut};

/// Registry entry for a bound (or not yet bound) sensor.
pub struct SensorFile<R: RegisterIo> {
    handle: DeviceHandle<R>,
    name: &'static str,
}

impl<R: RegisterIo> SensorFile<R> {
    /// Creates the entry. Opens fail with `ENODEV` while `handle` is unbound.
    pub fn new(handle: DeviceHandle<R>, name: &'static str) -> Self {
        Self { handle, name }
    }
}

impl<R: RegisterIo + 'static> MiscDevice for SensorFile<R> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn open(&self) -> Result<Box<dyn OpenFile>, Errno> {
        let device = self.handle.get()?;
        let session = device.open()?;
        Ok(Box::new(SensorOpenFile { session }))
    }
}

/// An open `goldfish_sensor` file; holds the exclusive session.
pub struct SensorOpenFile<R: RegisterIo> {
    session: Session<R>,
}

impl<R: RegisterIo> SensorOpenFile<R> {
    /// The session behind this file.
    pub fn session(&self) -> &Session<R> {
        &self.session
    }
}

impl<R: RegisterIo + 'static> OpenFile for SensorOpenFile<R> {
    fn read<'a>(
        &'a self,
        io: IoContext<'a>,
        mut buf: UserSliceMut<'a>,
    ) -> BoxFuture<'a, Result<usize, Errno>> {
        Box::pin(async move {
            if buf.len() < RECORD_SIZE {
                return Err(Errno::from(SensorError::TransferFault));
            }
            let options = ReadOptions {
                cancel: io.cancel,
                timeout: io.timeout,
            };
            let record = self.session.read(options).await.map_err(Errno::from)?;
            buf.copy_from(&record.to_bytes()).map_err(Errno::from)?;
            Ok(RECORD_SIZE)
        })
    }

    fn write(&self, buf: UserSlice<'_>) -> Result<usize, Errno> {
        let mut raw = [0u8; MASK_SIZE];
        buf.copy_to(&mut raw)?;
        let classes = SensorClasses::from_bits_truncate(u32::from_ne_bytes(raw));
        self.session.set_enabled_classes(classes);
        Ok(MASK_SIZE)
    }

    fn ioctl(&self, cmd: u32, _arg: usize) -> isize {
        if cmd == LEGACY_FAILING_IOCTL {
            ktrace!("{}: ioctl {} rejected", self.session.device().config().name, cmd);
            return -1;
        }
        0
    }

    fn release(self: Box<Self>) -> i32 {
        drop(self);
        0
    }
}
