//! Engine callbacks - entry points the C engine calls back into
//!
//! - `gbcc_camera_capture`: copy the latest 128x128 camera image
//! - `gbcc_font_atlas`: text tileset bitmap and tile size
//! - `gbcc_screenshot`: no-op on this platform
//! - `gbcc_worker_park` / `gbcc_worker_cancelled`: pacing waits inside
//!   `run_frame` that `stop()` can interrupt

use std::ffi::c_void;
use std::ptr;
use std::time::Duration;

use crate::domain::{CameraImage, CAMERA_PIXELS};
use crate::engine::HostServices;
use crate::infra::CancelToken;
use crate::{bridge_log_debug, catch_panic};

/// Host services handle (opaque), given to the engine at initialisation
#[repr(C)]
pub struct GbccHostHandle {
    _private: [u8; 0],
}

/// Worker cancellation handle (opaque), valid during one `run_frame` call
#[repr(C)]
pub struct GbccCancelToken {
    _private: [u8; 0],
}

/// Font tileset as seen by the engine.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct GbccTileset {
    /// RGBA, `width * height * 4` bytes
    pub pixels: *const c_void,
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
}

impl Default for GbccTileset {
    fn default() -> Self {
        Self {
            pixels: ptr::null(),
            width: 0,
            height: 0,
            tile_width: 0,
            tile_height: 0,
        }
    }
}

fn host<'a>(handle: *const GbccHostHandle) -> Option<&'a HostServices> {
    if handle.is_null() {
        return None;
    }
    Some(unsafe { &*(handle as *const HostServices) })
}

fn token<'a>(handle: *const GbccCancelToken) -> Option<&'a CancelToken> {
    if handle.is_null() {
        return None;
    }
    Some(unsafe { &*(handle as *const CancelToken) })
}

/// Fill `out` (`len` must be 128 * 128) with the latest camera image.
///
/// Returns false if the camera feed is not initialised.
#[no_mangle]
pub extern "C" fn gbcc_camera_capture(host_handle: *const GbccHostHandle, out: *mut u8, len: usize) -> bool {
    catch_panic!(false, {
        let Some(host) = host(host_handle) else {
            return false;
        };
        if out.is_null() || len != CAMERA_PIXELS {
            return false;
        }

        let out = unsafe { &mut *(out as *mut CameraImage) };
        match host.camera.capture(out) {
            Ok(()) => true,
            Err(err) => {
                bridge_log_debug!("[Camera] capture refused: {}", err);
                false
            }
        }
    })
}

/// Describe the current font tileset.
///
/// `pixels` stays valid until the host provides a new atlas or destroys
/// it.
#[no_mangle]
pub extern "C" fn gbcc_font_atlas(host_handle: *const GbccHostHandle, out: *mut GbccTileset) -> bool {
    catch_panic!(false, {
        let Some(host) = host(host_handle) else {
            return false;
        };
        if out.is_null() {
            return false;
        }

        match host.font_atlas.tileset() {
            Ok(tileset) => {
                let raw = GbccTileset {
                    pixels: tileset.pixels.as_ptr() as *const c_void,
                    width: tileset.width,
                    height: tileset.height,
                    tile_width: tileset.tile_width,
                    tile_height: tileset.tile_height,
                };
                unsafe { *out = raw };
                true
            }
            Err(err) => {
                bridge_log_debug!("[FontAtlas] {}", err);
                false
            }
        }
    })
}

/// Screenshots are not supported here.
#[no_mangle]
pub extern "C" fn gbcc_screenshot(_host_handle: *const GbccHostHandle) {}

/// Sleep up to `timeout_us` microseconds, returning early when `stop()`
/// wakes the worker. Returns true if woken or cancelled.
#[no_mangle]
pub extern "C" fn gbcc_worker_park(cancel: *const GbccCancelToken, timeout_us: u64) -> bool {
    catch_panic!(true, {
        match token(cancel) {
            Some(token) => token.park_timeout(Duration::from_micros(timeout_us)),
            None => true,
        }
    })
}

/// Whether the worker has been told to quit.
#[no_mangle]
pub extern "C" fn gbcc_worker_cancelled(cancel: *const GbccCancelToken) -> bool {
    token(cancel).map(CancelToken::is_cancelled).unwrap_or(true)
}
