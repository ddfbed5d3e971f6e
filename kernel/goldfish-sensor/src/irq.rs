//! Shared interrupt lines.
//!
//! Several devices may sit on one line. When it fires, every registered
//! handler is asked in registration order whether its device raised the
//! interrupt; the line counts as handled if any handler says so.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

use goldfish_core::sync::IrqSpinLock;
use goldfish_core::ktrace;

/// Outcome of an interrupt handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqReturn {
    /// The interrupt did not come from this handler's device.
    None,
    /// The device raised the interrupt and it was serviced.
    Handled,
}

impl IrqReturn {
    /// Returns `true` for [`IrqReturn::Handled`].
    pub const fn is_handled(self) -> bool {
        matches!(self, Self::Handled)
    }
}

/// An interrupt handler.
///
/// Called with interrupts masked; must not block or suspend.
pub trait IrqHandler: Send + Sync {
    /// Services the interrupt if it belongs to this device.
    fn handle_irq(&self) -> IrqReturn;
}

/// Token returned by [`SharedIrqLine::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IrqHandlerId(u32);

/// Errors from handler registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqError {
    /// The line already has [`MAX_SHARED_HANDLERS`] handlers.
    LineFull,
    /// The id is not registered on this line.
    UnknownHandler,
}

impl fmt::Display for IrqError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LineFull => f.write_str("interrupt line has no free handler slots"),
            Self::UnknownHandler => f.write_str("handler not registered on this line"),
        }
    }
}

/// Maximum handlers sharing one line.
pub const MAX_SHARED_HANDLERS: usize = 8;

/// One interrupt line and the handlers sharing it.
pub struct SharedIrqLine {
    line: u32,
    handlers: IrqSpinLock<Vec<(IrqHandlerId, Arc<dyn IrqHandler>)>>,
    next_id: AtomicU32,
    unhandled: AtomicU32,
}

impl SharedIrqLine {
    /// Creates a line with no handlers.
    pub fn new(line: u32) -> Self {
        Self {
            line,
            handlers: IrqSpinLock::new(Vec::new()),
            next_id: AtomicU32::new(1),
            unhandled: AtomicU32::new(0),
        }
    }

    /// The line number.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Adds `handler` to the end of the dispatch order.
    pub fn register(&self, handler: Arc<dyn IrqHandler>) -> Result<IrqHandlerId, IrqError> {
        let mut handlers = self.handlers.lock();
        if handlers.len() >= MAX_SHARED_HANDLERS {
            return Err(IrqError::LineFull);
        }
        let id = IrqHandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        handlers.push((id, handler));
        Ok(id)
    }

    /// Removes a handler. Returns it so the caller controls when it drops.
    pub fn unregister(&self, id: IrqHandlerId) -> Result<Arc<dyn IrqHandler>, IrqError> {
        let mut handlers = self.handlers.lock();
        let pos = handlers
            .iter()
            .position(|(h, _)| *h == id)
            .ok_or(IrqError::UnknownHandler)?;
        Ok(handlers.remove(pos).1)
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Times the line fired without any handler claiming it.
    pub fn unhandled_count(&self) -> u32 {
        self.unhandled.load(Ordering::Relaxed)
    }

    /// Runs every handler. Called from the interrupt vector for this line.
    pub fn dispatch(&self) -> IrqReturn {
        let handlers = self.handlers.lock();
        let mut result = IrqReturn::None;
        for (_, handler) in handlers.iter() {
            if handler.handle_irq().is_handled() {
                result = IrqReturn::Handled;
            }
        }
        drop(handlers);

        if result == IrqReturn::None {
            self.unhandled.fetch_add(1, Ordering::Relaxed);
            ktrace!("irq {}: no handler claimed the interrupt", self.line);
        }
        result
    }
}

impl fmt::Debug for SharedIrqLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedIrqLine")
            .field("line", &self.line)
            .field("handlers", &self.handler_count())
            .finish_non_exhaustive()
    }
}
