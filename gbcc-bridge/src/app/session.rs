//! Session - one running engine and its worker
//!
//! A `Session` exists only between a successful start and the matching stop.
//! It owns the engine handle, the worker thread, and the ROM/save-directory
//! buffers; `shutdown` consumes it, so none of them can be released twice.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::engine::Engine;
use crate::infra::{CancelToken, RenderGate};
use crate::{bridge_log_error, bridge_log_info, bridge_log_warn};

/// Save-directory bound in bytes, terminator slot included.
pub const SAVE_DIR_CAPACITY: usize = 4096;

pub const WORKER_THREAD_NAME: &str = "gbcc-emulation";

/// Save directory, at most `SAVE_DIR_CAPACITY - 1` bytes.
///
/// Longer paths are cut at the last character boundary that fits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveDir(String);

impl SaveDir {
    pub fn new(path: &str) -> Self {
        let limit = SAVE_DIR_CAPACITY - 1;
        if path.len() <= limit {
            return Self(path.to_string());
        }

        let mut end = limit;
        while !path.is_char_boundary(end) {
            end -= 1;
        }
        bridge_log_warn!(
            "[Session] save directory is {} bytes, truncated to {}",
            path.len(),
            end
        );
        Self(path[..end].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub(crate) struct Session<E: Engine> {
    engine: Arc<E>,
    cancel: Arc<CancelToken>,
    worker: JoinHandle<()>,
    rom_path: PathBuf,
    save_dir: SaveDir,
}

impl<E: Engine> Session<E> {
    /// Start the worker over an initialised engine.
    ///
    /// On error the engine is left to the caller, still initialised.
    pub fn spawn(engine: Arc<E>, rom_path: PathBuf, save_dir: SaveDir) -> std::io::Result<Self> {
        let cancel = Arc::new(CancelToken::new());

        let worker = {
            let engine = Arc::clone(&engine);
            let cancel = Arc::clone(&cancel);
            thread::Builder::new()
                .name(WORKER_THREAD_NAME.to_string())
                .spawn(move || run_worker(&*engine, &cancel))?
        };

        Ok(Self {
            engine,
            cancel,
            worker,
            rom_path,
            save_dir,
        })
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    pub fn save_dir(&self) -> &SaveDir {
        &self.save_dir
    }

    /// Quit, wake, join, then free the engine.
    ///
    /// The gate is taken best-effort: if a render tick holds it past the
    /// teardown timeout the engine is freed anyway. The tick still holds its
    /// own `Arc`, so the worst case is a display call into a freed engine,
    /// never a dangling handle.
    pub fn shutdown(self, gate: &RenderGate) {
        let Self {
            engine,
            cancel,
            worker,
            rom_path,
            save_dir: _,
        } = self;

        cancel.cancel();
        if worker.join().is_err() {
            bridge_log_error!("[Session] emulation worker panicked");
        }

        let access = gate.acquire_for_teardown();
        if !access.is_acquired() {
            bridge_log_warn!(
                "[RenderGate] teardown wait timed out after {:?}, freeing engine anyway",
                gate.teardown_timeout()
            );
        }

        engine.free();
        engine.audio_destroy();
        drop(access);

        bridge_log_info!("[Session] stopped {}", rom_path.display());
    }
}

fn run_worker<E: Engine>(engine: &E, cancel: &CancelToken) {
    bridge_log_info!("[Session] emulation worker started");
    while !cancel.is_cancelled() {
        engine.run_frame(cancel);
    }
    bridge_log_info!("[Session] emulation worker exiting");
}
