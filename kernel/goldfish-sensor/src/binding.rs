//! Binding the driver to a device instance.
//!
//! [`probe`] takes the platform resources in a [`ProbeContext`], builds the
//! [`SensorDevice`], hooks it onto the shared interrupt line and publishes
//! the `goldfish_sensor` file. Every step is undone if a later one fails.
//! [`SensorBinding::remove`] tears the same steps down in reverse.
//!
//! The file adapter never reaches the device through a global: it holds a
//! [`DeviceHandle`], which is empty before probe and after remove.

use alloc::sync::Arc;

use goldfish_core::sync::IrqSpinLock;
use goldfish_core::time::Timebase;
use goldfish_core::{kerr, kinfo, kwarn};
use goldfish_mmio::RegisterIo;

use crate::config::SensorConfig;
use crate::devfs::{MiscMinor, MiscRegistry};
use crate::device::SensorDevice;
use crate::error::{DriverError, SensorError};
use crate::file::SensorFile;
use crate::irq::{IrqHandler, IrqHandlerId, SharedIrqLine};

/// Shared, swappable reference to the bound device.
pub struct DeviceHandle<R: RegisterIo> {
    slot: Arc<IrqSpinLock<Option<Arc<SensorDevice<R>>>>>,
}

impl<R: RegisterIo> DeviceHandle<R> {
    /// Creates a handle with no device behind it.
    pub fn unbound() -> Self {
        Self {
            slot: Arc::new(IrqSpinLock::new(None)),
        }
    }

    /// Installs `device`.
    pub fn bind(&self, device: Arc<SensorDevice<R>>) -> Result<(), DriverError> {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return Err(DriverError::InvalidState);
        }
        *slot = Some(device);
        Ok(())
    }

    /// Removes the device and shuts it down.
    ///
    /// Sessions still holding the device see it as shut down.
    pub fn unbind(&self) -> Option<Arc<SensorDevice<R>>> {
        let device = self.slot.lock().take()?;
        device.shut_down();
        Some(device)
    }

    /// Returns the bound device.
    pub fn get(&self) -> Result<Arc<SensorDevice<R>>, SensorError> {
        self.slot.lock().clone().ok_or(SensorError::NotBound)
    }

    /// Returns `true` while a device is bound.
    pub fn is_bound(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl<R: RegisterIo> Clone for DeviceHandle<R> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

/// Resources handed to [`probe`].
pub struct ProbeContext<R: RegisterIo> {
    /// Mapped register window.
    pub regs: R,
    /// Interrupt line the device signals on.
    pub irq: Arc<SharedIrqLine>,
    /// Registry the device file is published in.
    pub registry: Arc<MiscRegistry>,
    /// Clock and timers for read timeouts.
    pub timebase: Timebase,
    /// Per-device settings.
    pub config: SensorConfig,
}

/// Lifecycle hooks invoked on system state transitions.
pub trait ManagedDriver: Send + Sync {
    /// Suspends the device. Unsupported unless overridden.
    fn suspend(&self) -> Result<(), DriverError> {
        Err(DriverError::Unsupported)
    }

    /// Resumes after [`suspend`](Self::suspend). Unsupported unless
    /// overridden.
    fn resume(&self) -> Result<(), DriverError> {
        Err(DriverError::Unsupported)
    }

    /// Quiesces the device for system shutdown.
    fn shutdown(&self) {}
}

/// A probed device and everything registered on its behalf.
pub struct SensorBinding<R: RegisterIo> {
    device: Arc<SensorDevice<R>>,
    handle: DeviceHandle<R>,
    irq: Arc<SharedIrqLine>,
    irq_id: IrqHandlerId,
    registry: Arc<MiscRegistry>,
    minor: MiscMinor,
}

/// Binds the driver to the device described by `ctx`.
pub fn probe<R: RegisterIo + 'static>(
    ctx: ProbeContext<R>,
) -> Result<SensorBinding<R>, DriverError> {
    let name = ctx.config.name;
    let device = SensorDevice::new(ctx.regs, ctx.config, ctx.timebase).map_err(|e| {
        kerr!("{}: register window too small: {}", name, e);
        e
    })?;
    let device = Arc::new(device);

    let irq_id = ctx
        .irq
        .register(Arc::clone(&device) as Arc<dyn IrqHandler>)
        .map_err(|e| {
            kerr!("{}: cannot attach to irq {}: {}", name, ctx.irq.line(), e);
            DriverError::InitFailed
        })?;

    let handle = DeviceHandle::unbound();
    if let Err(e) = handle.bind(Arc::clone(&device)) {
        detach(&ctx.irq, irq_id, name);
        return Err(e);
    }

    let file = Arc::new(SensorFile::new(handle.clone(), name));
    let minor = match ctx.registry.register(file) {
        Ok(minor) => minor,
        Err(e) => {
            kerr!("{}: cannot register device file: {}", name, e);
            handle.unbind();
            detach(&ctx.irq, irq_id, name);
            return Err(DriverError::InitFailed);
        }
    };

    kinfo!(
        "{}: bound, irq {}, misc minor {}",
        name,
        ctx.irq.line(),
        minor.0
    );
    Ok(SensorBinding {
        device,
        handle,
        irq: ctx.irq,
        irq_id,
        registry: ctx.registry,
        minor,
    })
}

/// Unhooks `id` from `irq`, warning if it was no longer attached.
fn detach(irq: &SharedIrqLine, id: IrqHandlerId, name: &str) -> bool {
    match irq.unregister(id) {
        Ok(_) => true,
        Err(e) => {
            kwarn!("{}: irq handler already gone: {}", name, e);
            false
        }
    }
}

impl<R: RegisterIo> SensorBinding<R> {
    /// The bound device.
    pub fn device(&self) -> &Arc<SensorDevice<R>> {
        &self.device
    }

    /// The handle the device file resolves through.
    pub fn handle(&self) -> &DeviceHandle<R> {
        &self.handle
    }

    /// Minor number of the published file.
    pub fn minor(&self) -> MiscMinor {
        self.minor
    }

    /// Unpublishes the file, detaches the interrupt handler and shuts the
    /// device down.
    pub fn remove(self) {
        let name = self.device.config().name;
        if let Err(e) = self.registry.deregister(self.minor) {
            kwarn!("{}: device file already gone: {}", name, e);
        }
        detach(&self.irq, self.irq_id, name);
        self.handle.unbind();
        kinfo!("{}: unbound", name);
    }
}

impl<R: RegisterIo> ManagedDriver for SensorBinding<R> {
    fn shutdown(&self) {
        self.device.shut_down();
    }
}
