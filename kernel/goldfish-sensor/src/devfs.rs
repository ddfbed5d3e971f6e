//! Misc character-device registry.
//!
//! Devices register under a unique name and receive a dynamically assigned
//! minor number. Opening a name produces an [`OpenFile`], the per-open
//! object the file-descriptor layer drives with read/write/ioctl/release.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::time::Duration;

use goldfish_core::cancel::CancelToken;
use goldfish_core::errno;
use goldfish_core::sync::IrqSpinLock;
use goldfish_core::kdebug;

use crate::error::SensorError;
use crate::userptr::{UserSlice, UserSliceMut};

/// First minor number handed out to dynamically registered devices.
pub const DYNAMIC_MINOR_BASE: u16 = 64;

/// Number of dynamic minors available.
pub const DYNAMIC_MINOR_COUNT: u16 = 192;

/// A boxed, sendable future borrowing from `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A positive POSIX error number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Errno(pub isize);

impl Errno {
    /// Encodes the error the way a system call returns it.
    pub const fn as_return(self) -> isize {
        -self.0
    }
}

impl From<SensorError> for Errno {
    fn from(err: SensorError) -> Self {
        Self(err.errno())
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", errno::name(self.0), self.0)
    }
}

/// Per-call context for blocking file operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct IoContext<'a> {
    /// Pending-signal token of the calling task.
    pub cancel: Option<&'a CancelToken>,
    /// Upper bound on how long the call may block.
    pub timeout: Option<Duration>,
}

/// An open file description.
pub trait OpenFile: Send + Sync {
    /// Reads into `buf`, returning the number of bytes produced.
    fn read<'a>(
        &'a self,
        io: IoContext<'a>,
        buf: UserSliceMut<'a>,
    ) -> BoxFuture<'a, Result<usize, Errno>>;

    /// Writes from `buf`, returning the number of bytes consumed.
    fn write(&self, buf: UserSlice<'_>) -> Result<usize, Errno>;

    /// Device-specific control. Returns the raw result.
    fn ioctl(&self, cmd: u32, arg: usize) -> isize;

    /// Called when the last descriptor referring to this file is closed.
    fn release(self: Box<Self>) -> i32;
}

/// A device reachable by name through the registry.
pub trait MiscDevice: Send + Sync {
    /// Registry name.
    fn name(&self) -> &'static str;

    /// Opens a new file description.
    fn open(&self) -> Result<Box<dyn OpenFile>, Errno>;
}

/// Minor number assigned at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MiscMinor(pub u16);

/// Registry failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevfsError {
    /// Another device already uses the name.
    NameInUse,
    /// Every dynamic minor is taken.
    MinorsExhausted,
    /// No device with that minor is registered.
    NotFound,
}

impl fmt::Display for DevfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NameInUse => f.write_str("device name already registered"),
            Self::MinorsExhausted => f.write_str("no free misc minor numbers"),
            Self::NotFound => f.write_str("misc device not registered"),
        }
    }
}

/// The misc device table.
pub struct MiscRegistry {
    devices: IrqSpinLock<BTreeMap<u16, Arc<dyn MiscDevice>>>,
}

impl MiscRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            devices: IrqSpinLock::new(BTreeMap::new()),
        }
    }

    /// Registers `device` at the lowest free dynamic minor.
    pub fn register(&self, device: Arc<dyn MiscDevice>) -> Result<MiscMinor, DevfsError> {
        let name = device.name();
        let mut devices = self.devices.lock();
        if devices.values().any(|d| d.name() == name) {
            return Err(DevfsError::NameInUse);
        }
        let minor = (DYNAMIC_MINOR_BASE..DYNAMIC_MINOR_BASE + DYNAMIC_MINOR_COUNT)
            .find(|m| !devices.contains_key(m))
            .ok_or(DevfsError::MinorsExhausted)?;
        devices.insert(minor, device);
        drop(devices);

        kdebug!("misc: {} registered at minor {}", name, minor);
        Ok(MiscMinor(minor))
    }

    /// Removes the device at `minor`.
    pub fn deregister(&self, minor: MiscMinor) -> Result<Arc<dyn MiscDevice>, DevfsError> {
        self.devices
            .lock()
            .remove(&minor.0)
            .ok_or(DevfsError::NotFound)
    }

    /// Finds a device by name.
    pub fn lookup(&self, name: &str) -> Option<(MiscMinor, Arc<dyn MiscDevice>)> {
        self.devices
            .lock()
            .iter()
            .find(|(_, d)| d.name() == name)
            .map(|(m, d)| (MiscMinor(*m), Arc::clone(d)))
    }

    /// Opens the device registered as `name`.
    pub fn open(&self, name: &str) -> Result<Box<dyn OpenFile>, Errno> {
        // `open` must not run under the registry lock.
        let (_, device) = self.lookup(name).ok_or(Errno(errno::ENODEV))?;
        device.open()
    }

    /// Registered names in minor order.
    pub fn names(&self) -> Vec<&'static str> {
        self.devices.lock().values().map(|d| d.name()).collect()
    }
}

impl Default for MiscRegistry {
    fn default() -> Self {
        Self::new()
    }
}
