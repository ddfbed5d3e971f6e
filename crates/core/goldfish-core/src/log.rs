//! Leveled logging for the driver stack.
//!
//! [`klog!`] and the per-level macros (`kerr!`, `kwarn!`, `kinfo!`,
//! `kdebug!`, `ktrace!`) format lazily and hand the arguments to a sink
//! registered with [`set_log_fn`]. Until a sink is registered every message
//! is dropped. [`set_max_level`] filters before formatting, so disabled
//! levels cost one atomic load.
//!
//! The sink may be called from interrupt context and must not block or
//! allocate.

use core::fmt;
use core::sync::atomic::{AtomicPtr, AtomicU8, Ordering};

/// Log severity, lower is more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    /// Something failed.
    Error = 1,
    /// Unexpected but recoverable.
    Warn = 2,
    /// Lifecycle events.
    Info = 3,
    /// Per-operation detail.
    Debug = 4,
    /// Interrupt-path chatter.
    Trace = 5,
}

impl LogLevel {
    /// Fixed-width tag for aligned output.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN ",
            Self::Info => "INFO ",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }

    const fn from_raw(raw: u8) -> Self {
        match raw {
            0 | 1 => Self::Error,
            2 => Self::Warn,
            3 => Self::Info,
            4 => Self::Debug,
            _ => Self::Trace,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name().trim_end())
    }
}

/// Signature of the leveled sink.
pub type LogFn = fn(LogLevel, fmt::Arguments<'_>);

/// Signature of the raw print sink.
pub type PrintFn = fn(fmt::Arguments<'_>);

fn null_log(_level: LogLevel, _args: fmt::Arguments<'_>) {}

fn null_print(_args: fmt::Arguments<'_>) {}

static LOG_FN: AtomicPtr<()> = AtomicPtr::new(null_log as *mut ());
static PRINT_FN: AtomicPtr<()> = AtomicPtr::new(null_print as *mut ());
static MAX_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Registers the leveled sink.
///
/// # Safety
///
/// `f` must be callable from any context, including interrupt handlers.
pub unsafe fn set_log_fn(f: LogFn) {
    LOG_FN.store(f as *mut (), Ordering::Release);
}

/// Registers the raw print sink used by [`kprint!`](crate::kprint).
///
/// # Safety
///
/// Same requirement as [`set_log_fn`].
pub unsafe fn set_print_fn(f: PrintFn) {
    PRINT_FN.store(f as *mut (), Ordering::Release);
}

/// Sets the most verbose level that reaches the sink.
pub fn set_max_level(level: LogLevel) {
    MAX_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Returns the most verbose level that reaches the sink.
pub fn max_level() -> LogLevel {
    LogLevel::from_raw(MAX_LEVEL.load(Ordering::Relaxed))
}

/// Returns `true` if messages at `level` are currently forwarded.
#[inline]
pub fn enabled(level: LogLevel) -> bool {
    level as u8 <= MAX_LEVEL.load(Ordering::Relaxed)
}

/// Implementation detail of [`klog!`]. Not public API.
#[doc(hidden)]
pub fn _log(level: LogLevel, args: fmt::Arguments<'_>) {
    if !enabled(level) {
        return;
    }
    let ptr = LOG_FN.load(Ordering::Acquire);
    // SAFETY: Only `LogFn` pointers are ever stored in LOG_FN.
    let f: LogFn = unsafe { core::mem::transmute::<*mut (), LogFn>(ptr) };
    f(level, args);
}

/// Implementation detail of [`kprint!`]. Not public API.
#[doc(hidden)]
pub fn _print(args: fmt::Arguments<'_>) {
    let ptr = PRINT_FN.load(Ordering::Acquire);
    // SAFETY: Only `PrintFn` pointers are ever stored in PRINT_FN.
    let f: PrintFn = unsafe { core::mem::transmute::<*mut (), PrintFn>(ptr) };
    f(args);
}

/// Prints to the raw sink (no level, no filtering).
#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => { $crate::log::_print(format_args!($($arg)*)) };
}

/// Prints to the raw sink with a trailing newline.
#[macro_export]
macro_rules! kprintln {
    () => { $crate::kprint!("\n") };
    ($($arg:tt)*) => { $crate::kprint!("{}\n", format_args!($($arg)*)) };
}

/// Logs a message at the given level.
#[macro_export]
macro_rules! klog {
    ($level:expr, $($arg:tt)*) => {
        $crate::log::_log($level, format_args!($($arg)*))
    };
}

/// Logs at [`LogLevel::Error`](crate::log::LogLevel::Error).
#[macro_export]
macro_rules! kerr {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Error, $($arg)*) };
}

/// Logs at [`LogLevel::Warn`](crate::log::LogLevel::Warn).
#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Warn, $($arg)*) };
}

/// Logs at [`LogLevel::Info`](crate::log::LogLevel::Info).
#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Info, $($arg)*) };
}

/// Logs at [`LogLevel::Debug`](crate::log::LogLevel::Debug).
#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Debug, $($arg)*) };
}

/// Logs at [`LogLevel::Trace`](crate::log::LogLevel::Trace).
#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Trace, $($arg)*) };
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    static CAPTURED: Mutex<Vec<(LogLevel, String)>> = Mutex::new(Vec::new());

    fn capture(level: LogLevel, args: fmt::Arguments<'_>) {
        CAPTURED.lock().unwrap().push((level, args.to_string()));
    }

    // Single test touching the global sink and level, so parallel test
    // threads cannot observe each other's configuration.
    #[test]
    fn sink_receives_filtered_messages() {
        // SAFETY: `capture` only locks a std mutex.
        unsafe { set_log_fn(capture) };
        set_max_level(LogLevel::Debug);

        kinfo!("bound at {:#x}", 0x1000);
        ktrace!("dropped");
        kdebug!("kept");
        assert_eq!(max_level(), LogLevel::Debug);

        let captured = CAPTURED.lock().unwrap().clone();
        assert_eq!(
            captured,
            vec![
                (LogLevel::Info, "bound at 0x1000".to_string()),
                (LogLevel::Debug, "kept".to_string()),
            ]
        );

        set_max_level(LogLevel::Info);
        // SAFETY: `null_log` does nothing.
        unsafe { set_log_fn(null_log) };
    }

    static PRINTED: Mutex<String> = Mutex::new(String::new());

    fn print_capture(args: fmt::Arguments<'_>) {
        use core::fmt::Write;
        let _ = PRINTED.lock().unwrap().write_fmt(args);
    }

    #[test]
    fn raw_print_is_unfiltered() {
        // SAFETY: `print_capture` only locks a std mutex.
        unsafe { set_print_fn(print_capture) };
        kprint!("irq {}", 9);
        kprintln!();
        kprintln!("done");
        assert_eq!(PRINTED.lock().unwrap().as_str(), "irq 9\ndone\n");
    }

    #[test]
    fn level_names_and_order() {
        assert!(LogLevel::Error < LogLevel::Trace);
        assert_eq!(LogLevel::Warn.name(), "WARN ");
        assert_eq!(format!("{}", LogLevel::Info), "INFO");
        assert_eq!(LogLevel::from_raw(9), LogLevel::Trace);
    }
}
