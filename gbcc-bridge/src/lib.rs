//! gbcc-bridge
//!
//! Boundary layer between a host UI/render surface and the GBCC emulation
//! engine running on its own worker thread.
//!
//! ```text
//! ffi      C ABI: host controls, engine vtable, engine callbacks, logging
//!  └─ app      SessionController, Session, preferences
//!      ├─ infra    RenderGate, CancelToken, atomic signals
//!      └─ domain   FrameReducer, OptionsSnapshot, camera/atlas feeds
//! engine   the contract the emulation core implements
//! ```

/// Run `$body`, turning a panic into `$default` so it never unwinds into C.
#[doc(hidden)]
#[macro_export]
macro_rules! catch_panic {
    ($default:expr, $body:expr) => {
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| $body)) {
            Ok(result) => result,
            Err(payload) => {
                $crate::bridge_log_error!(
                    "[FFI] caught panic: {}",
                    $crate::ffi::panic_message(&*payload)
                );
                $default
            }
        }
    };
}

pub mod app;
pub mod domain;
pub mod engine;
pub mod ffi;
pub mod infra;

#[cfg(test)]
mod testing;

pub use app::{Preferences, SessionController, SessionError, StartOptions, TickOutcome};
pub use domain::{FrameReducer, OptionsSnapshot, SensorFrame};
pub use engine::{Engine, EngineConfig, EngineError, HostServices, Key};
pub use infra::{CancelToken, RenderGate};
