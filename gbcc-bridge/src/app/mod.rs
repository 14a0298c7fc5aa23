//! Application Layer
//!
//! Session orchestration on top of the domain and infra layers:
//!
//! ```text
//! host / FFI
//!     ↓
//! SessionController ──► RenderGate, CancelToken (infra)
//!     ├─► Session (engine + worker thread)
//!     └─► OptionsSnapshot, CameraFeed, FontAtlas (domain)
//! ```
//!
//! - config: preferences, start options, gate tuning
//! - error: `SessionError`
//! - session: owned engine/worker/buffers of one run
//! - session_controller: lifecycle, render tick, input and queries

pub mod config;
pub mod error;
pub mod session;
pub mod session_controller;

pub use config::{AudioConfig, GateConfig, Preferences, StartOptions, DEFAULT_SHADER};
pub use error::SessionError;
pub use session::{SaveDir, SAVE_DIR_CAPACITY, WORKER_THREAD_NAME};
pub use session_controller::{SessionController, TickOutcome};
