//! FFI - C ABI surface
//!
//! - logging: host log sink and `bridge_log_*!` macros
//! - session: host-facing control surface over the process-wide controller
//! - engine_vtable: the host's emulation core as a table of C functions
//! - callbacks: entry points the engine calls back into
//!
//! Every exported function catches panics at the boundary and returns a
//! neutral value instead of unwinding into C.

pub mod callbacks;
pub mod engine_vtable;
pub mod logging;
pub mod session;

pub use callbacks::*;
pub use engine_vtable::{ForeignEngine, GbccConfig, GbccEngineVTable, GbccMenu};
pub use logging::*;
pub use session::*;

use std::any::Any;

/// Text of a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
