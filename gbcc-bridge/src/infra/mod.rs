//! Infrastructure Layer
//!
//! Synchronisation building blocks shared by the session and FFI layers:
//! - cancel_token: quit flag plus single-slot wake for the emulation worker
//! - render_gate: the one lock between render, teardown and ROM checks
//! - atomic_cache: lock-free resize/dirty/edge signals
//! - stress_tests: multi-threaded lifecycle tests (test builds only)

pub mod atomic_cache;
pub mod cancel_token;
pub mod render_gate;


pub use atomic_cache::{AtomicDirtyFlag, AtomicSurfaceSize, EdgeTrigger};
pub use cancel_token::CancelToken;
pub use render_gate::{GateGuard, RenderGate, TeardownAccess, DEFAULT_TEARDOWN_TIMEOUT};
