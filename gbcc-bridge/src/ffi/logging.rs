//! Log bridge
//!
//! Forwards bridge log lines to the host so they land in the same log file as
//! the host's own messages.
//!
//! # Architecture
//! - The host installs one global callback with `gbcc_set_log_callback`
//! - Every Rust-side message goes through `log_message`
//! - Without a callback the message falls back to `eprintln!`
//!
//! # Usage
//! ```ignore
//! gbcc_set_log_callback(my_callback);
//!
//! bridge_log_warn!("[RenderGate] teardown wait timed out after {:?}", timeout);
//! bridge_log_error!("[Session] worker panicked");
//! ```

use std::ffi::{c_char, CString};
use std::sync::atomic::{AtomicPtr, Ordering};

// ============================================================================
// Levels
// ============================================================================

/// Log level, mirrored by the host's enum
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeLogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

// ============================================================================
// Callback
// ============================================================================

/// Host log sink.
///
/// May be invoked from the control thread, the render thread and the
/// emulation worker; the host side must be thread safe.
pub type LogCallback = extern "C" fn(level: BridgeLogLevel, message: *const c_char);

static LOG_CALLBACK: AtomicPtr<()> = AtomicPtr::new(std::ptr::null_mut());

// ============================================================================
// FFI
// ============================================================================

/// Install the host log sink. Call once at startup.
#[no_mangle]
pub extern "C" fn gbcc_set_log_callback(callback: LogCallback) {
    LOG_CALLBACK.store(callback as *mut (), Ordering::SeqCst);
}

/// Remove the host log sink; messages go to stderr afterwards.
#[no_mangle]
pub extern "C" fn gbcc_clear_log_callback() {
    LOG_CALLBACK.store(std::ptr::null_mut(), Ordering::SeqCst);
}

// ============================================================================
// Core
// ============================================================================

/// Send one message to the host sink, or stderr if none is installed.
pub fn log_message(level: BridgeLogLevel, message: &str) {
    let callback = LOG_CALLBACK.load(Ordering::SeqCst);

    if callback.is_null() {
        eprintln!("{}", message);
        return;
    }

    match CString::new(message) {
        Ok(c_string) => {
            // Only ever stored from a `LogCallback` in `gbcc_set_log_callback`.
            let callback: LogCallback = unsafe { std::mem::transmute(callback) };
            callback(level, c_string.as_ptr());
        }
        // interior NUL
        Err(_) => eprintln!("{}", message),
    }
}

// ============================================================================
// Macros
// ============================================================================

#[macro_export]
macro_rules! bridge_log_debug {
    ($($arg:tt)*) => {
        $crate::ffi::logging::log_message(
            $crate::ffi::logging::BridgeLogLevel::Debug,
            &format!($($arg)*)
        )
    };
}

#[macro_export]
macro_rules! bridge_log_info {
    ($($arg:tt)*) => {
        $crate::ffi::logging::log_message(
            $crate::ffi::logging::BridgeLogLevel::Info,
            &format!($($arg)*)
        )
    };
}

/// Most common level for degraded-but-continuing paths
/// (dropped frames, teardown timeouts, truncated paths).
#[macro_export]
macro_rules! bridge_log_warn {
    ($($arg:tt)*) => {
        $crate::ffi::logging::log_message(
            $crate::ffi::logging::BridgeLogLevel::Warn,
            &format!($($arg)*)
        )
    };
}

#[macro_export]
macro_rules! bridge_log_error {
    ($($arg:tt)*) => {
        $crate::ffi::logging::log_message(
            $crate::ffi::logging::BridgeLogLevel::Error,
            &format!($($arg)*)
        )
    };
}
