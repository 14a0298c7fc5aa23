//! Session FFI - host-facing control surface
//!
//! One process-wide `SessionController` over the registered C engine. Call
//! order from the host:
//!
//! ```text
//! gbcc_set_log_callback → gbcc_register_engine → gbcc_start
//!     render thread:  gbcc_render_tick (every frame)
//!     UI thread:      gbcc_press / gbcc_update_* / gbcc_check_*
//! gbcc_get_options → gbcc_stop → ... → gbcc_set_options → gbcc_start
//! ```
//!
//! Control calls (`start`, `stop`, `check_rom`) must be serialised by the
//! host.

use std::ffi::{c_char, CStr, CString};
use std::path::{Path, PathBuf};
use std::ptr;

use once_cell::sync::Lazy;

use super::engine_vtable::{self, ForeignEngine, GbccEngineVTable};
use crate::app::{AudioConfig, Preferences, SessionController, SessionError, StartOptions, TickOutcome};
use crate::domain::{Rotation, SensorFrame, SNAPSHOT_LEN};
use crate::{bridge_log_warn, catch_panic};

static CONTROLLER: Lazy<SessionController<ForeignEngine>> = Lazy::new(SessionController::new);

// ============================================================================
// Result codes
// ============================================================================

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Ok = 0,
    AlreadyActive = 1,
    NotActive = 2,
    Initialization = 3,
    Spawn = 4,
    InvalidSlot = 5,
    InvalidArgument = 6,
    Preferences = 7,
    Peripheral = 8,
    Snapshot = 9,
    EngineAlreadyRegistered = 10,
    Panic = 11,
}

impl From<&SessionError> for ErrorCode {
    fn from(err: &SessionError) -> Self {
        match err {
            SessionError::AlreadyActive => Self::AlreadyActive,
            SessionError::NotActive => Self::NotActive,
            SessionError::Initialization(_) => Self::Initialization,
            SessionError::Spawn(_) => Self::Spawn,
            SessionError::InvalidSlot(_) => Self::InvalidSlot,
            SessionError::Preferences(_) => Self::Preferences,
            SessionError::Peripheral(_) => Self::Peripheral,
            SessionError::Snapshot(_) => Self::Snapshot,
        }
    }
}

fn code(result: Result<(), SessionError>) -> ErrorCode {
    match result {
        Ok(()) => ErrorCode::Ok,
        Err(err) => ErrorCode::from(&err),
    }
}

/// Render tick result, mirrors `TickOutcome`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GbccTickOutcome {
    Idle = 0,
    Skipped = 1,
    Rendered = 2,
}

impl From<TickOutcome> for GbccTickOutcome {
    fn from(outcome: TickOutcome) -> Self {
        match outcome {
            TickOutcome::Idle => Self::Idle,
            TickOutcome::Skipped => Self::Skipped,
            TickOutcome::Rendered => Self::Rendered,
        }
    }
}

// ============================================================================
// Argument helpers
// ============================================================================

/// Borrow a NUL-terminated UTF-8 string; `None` for null or invalid text.
fn c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

fn c_path(ptr: *const c_char) -> Option<PathBuf> {
    c_str(ptr).map(PathBuf::from)
}

/// Borrow `len` bytes; a null pointer is only valid with `len == 0`.
fn byte_slice<'a>(ptr: *const u8, len: usize) -> Option<&'a [u8]> {
    if ptr.is_null() {
        return if len == 0 { Some(&[][..]) } else { None };
    }
    Some(unsafe { std::slice::from_raw_parts(ptr, len) })
}

// ============================================================================
// Engine registration
// ============================================================================

/// Register the emulation core. Must precede `gbcc_start`; only the first
/// registration is kept.
#[no_mangle]
pub extern "C" fn gbcc_register_engine(vtable: *const GbccEngineVTable) -> ErrorCode {
    catch_panic!(ErrorCode::Panic, {
        if vtable.is_null() {
            return ErrorCode::InvalidArgument;
        }
        if engine_vtable::register_engine(unsafe { *vtable }) {
            ErrorCode::Ok
        } else {
            ErrorCode::EngineAlreadyRegistered
        }
    })
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Start a session.
///
/// `config_file`, `cheat_file` and `preferences_json` may be null. Returns
/// false on failure; the reason is available from `gbcc_get_error_message`.
#[no_mangle]
pub extern "C" fn gbcc_start(
    rom: *const c_char,
    sample_rate: u32,
    samples_per_buffer: u32,
    save_dir: *const c_char,
    config_file: *const c_char,
    cheat_file: *const c_char,
    preferences_json: *const c_char,
) -> bool {
    catch_panic!(false, {
        let Some(rom) = c_path(rom) else {
            bridge_log_warn!("[FFI] gbcc_start: missing ROM path");
            return false;
        };

        let preferences = match c_str(preferences_json) {
            Some(json) => match Preferences::from_json(json) {
                Ok(preferences) => preferences,
                Err(err) => {
                    CONTROLLER.record(SessionError::from(err));
                    return false;
                }
            },
            None => Preferences::default(),
        };

        let options = StartOptions {
            rom,
            audio: AudioConfig {
                sample_rate,
                samples_per_buffer,
            },
            save_dir: c_str(save_dir).unwrap_or_default().to_string(),
            config_file: c_path(config_file),
            cheat_file: c_path(cheat_file),
            preferences,
        };
        CONTROLLER.start(options).is_ok()
    })
}

#[no_mangle]
pub extern "C" fn gbcc_stop() {
    catch_panic!((), CONTROLLER.stop())
}

#[no_mangle]
pub extern "C" fn gbcc_is_running() -> bool {
    CONTROLLER.is_running()
}

/// Check a ROM without starting a session. Blocks while a frame renders.
#[no_mangle]
pub extern "C" fn gbcc_check_rom(path: *const c_char) -> bool {
    catch_panic!(false, {
        match c_path(path) {
            Some(path) => CONTROLLER.check_rom(&path).is_ok(),
            None => false,
        }
    })
}

// ============================================================================
// Surface
// ============================================================================

/// Render one frame if the engine is free; never blocks.
#[no_mangle]
pub extern "C" fn gbcc_render_tick() -> GbccTickOutcome {
    catch_panic!(GbccTickOutcome::Skipped, GbccTickOutcome::from(CONTROLLER.render_tick()))
}

#[no_mangle]
pub extern "C" fn gbcc_resize_surface(width: u32, height: u32) {
    CONTROLLER.resize_surface(width, height)
}

#[no_mangle]
pub extern "C" fn gbcc_destroy_surface() {
    catch_panic!((), CONTROLLER.destroy_surface())
}

#[no_mangle]
pub extern "C" fn gbcc_set_focus(focused: bool) {
    catch_panic!((), CONTROLLER.set_focus(focused))
}

// ============================================================================
// Input
// ============================================================================

#[no_mangle]
pub extern "C" fn gbcc_press(key: i32, pressed: bool) {
    catch_panic!((), CONTROLLER.press(key, pressed))
}

#[no_mangle]
pub extern "C" fn gbcc_is_pressed(key: i32) -> bool {
    catch_panic!(false, CONTROLLER.is_pressed(key))
}

#[no_mangle]
pub extern "C" fn gbcc_toggle_menu() {
    catch_panic!((), CONTROLLER.toggle_menu())
}

#[no_mangle]
pub extern "C" fn gbcc_toggle_turbo() -> bool {
    catch_panic!(false, CONTROLLER.toggle_turbo())
}

#[no_mangle]
pub extern "C" fn gbcc_save_state(slot: u8) -> ErrorCode {
    catch_panic!(ErrorCode::Panic, code(CONTROLLER.save_state(slot)))
}

#[no_mangle]
pub extern "C" fn gbcc_load_state(slot: u8) -> ErrorCode {
    catch_panic!(ErrorCode::Panic, code(CONTROLLER.load_state(slot)))
}

// ============================================================================
// Options snapshot
// ============================================================================

/// Size of the options block.
#[no_mangle]
pub extern "C" fn gbcc_options_len() -> usize {
    SNAPSHOT_LEN
}

/// Capture the live options into `out`. Returns the bytes written, 0 if
/// `out` is null or shorter than `gbcc_options_len()`.
#[no_mangle]
pub extern "C" fn gbcc_get_options(out: *mut u8, len: usize) -> usize {
    catch_panic!(0, {
        if out.is_null() || len < SNAPSHOT_LEN {
            return 0;
        }
        let bytes = CONTROLLER.options_bytes();
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), out, SNAPSHOT_LEN) };
        SNAPSHOT_LEN
    })
}

/// Store an options block for the next start. An empty block clears it.
#[no_mangle]
pub extern "C" fn gbcc_set_options(bytes: *const u8, len: usize) -> ErrorCode {
    catch_panic!(ErrorCode::Panic, {
        match byte_slice(bytes, len) {
            Some(bytes) => code(CONTROLLER.set_options_bytes(bytes)),
            None => ErrorCode::InvalidArgument,
        }
    })
}

// ============================================================================
// Queries
// ============================================================================

/// True when rumble switched on or off since the previous call.
#[no_mangle]
pub extern "C" fn gbcc_check_rumble_changed() -> bool {
    catch_panic!(false, CONTROLLER.check_rumble_changed())
}

#[no_mangle]
pub extern "C" fn gbcc_check_turbo_engaged() -> bool {
    catch_panic!(false, CONTROLLER.check_turbo_engaged())
}

#[no_mangle]
pub extern "C" fn gbcc_check_error_flag() -> bool {
    catch_panic!(false, CONTROLLER.check_error_flag())
}

#[no_mangle]
pub extern "C" fn gbcc_has_rumble() -> bool {
    catch_panic!(false, CONTROLLER.has_rumble())
}

#[no_mangle]
pub extern "C" fn gbcc_has_accelerometer() -> bool {
    catch_panic!(false, CONTROLLER.has_accelerometer())
}

#[no_mangle]
pub extern "C" fn gbcc_is_camera() -> bool {
    catch_panic!(false, CONTROLLER.is_camera())
}

/// Last error message, or null. Free with `gbcc_free_string`.
#[no_mangle]
pub extern "C" fn gbcc_get_error_message() -> *mut c_char {
    catch_panic!(ptr::null_mut(), {
        match CONTROLLER.last_error() {
            Some(message) => match CString::new(message) {
                Ok(message) => message.into_raw(),
                Err(_) => ptr::null_mut(),
            },
            None => ptr::null_mut(),
        }
    })
}

#[no_mangle]
pub extern "C" fn gbcc_free_string(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    unsafe {
        drop(CString::from_raw(s));
    }
}

#[no_mangle]
pub extern "C" fn gbcc_flush_logs() {
    catch_panic!((), CONTROLLER.flush_logs())
}

/// Change the process working directory so engine-relative paths resolve.
#[no_mangle]
pub extern "C" fn gbcc_chdir(dir: *const c_char) -> bool {
    catch_panic!(false, {
        let Some(dir) = c_str(dir) else {
            return false;
        };
        match std::env::set_current_dir(Path::new(dir)) {
            Ok(()) => true,
            Err(err) => {
                bridge_log_warn!("[FFI] chdir {} failed: {}", dir, err);
                false
            }
        }
    })
}

// ============================================================================
// Peripherals
// ============================================================================

/// Device acceleration in m/s².
#[no_mangle]
pub extern "C" fn gbcc_update_accelerometer(x: f32, y: f32) {
    catch_panic!((), CONTROLLER.update_accelerometer(x, y))
}

/// Feed one greyscale sensor frame to the camera.
#[no_mangle]
pub extern "C" fn gbcc_update_camera_frame(
    bytes: *const u8,
    len: usize,
    width: u32,
    height: u32,
    rotation: i32,
    row_stride: u32,
) -> ErrorCode {
    catch_panic!(ErrorCode::Panic, {
        let Some(bytes) = byte_slice(bytes, len) else {
            return ErrorCode::InvalidArgument;
        };
        let frame = SensorFrame {
            bytes,
            width: width as usize,
            height: height as usize,
            row_stride: row_stride as usize,
            rotation: Rotation::from_degrees(rotation),
        };
        code(CONTROLLER.update_camera_frame(&frame))
    })
}

/// Install a static 128x128 camera image.
#[no_mangle]
pub extern "C" fn gbcc_set_camera_image(bytes: *const u8, len: usize) -> ErrorCode {
    catch_panic!(ErrorCode::Panic, {
        match byte_slice(bytes, len) {
            Some(bytes) => code(CONTROLLER.set_camera_image(bytes)),
            None => ErrorCode::InvalidArgument,
        }
    })
}

/// Provide the RGBA text tileset (16x16 tiles).
#[no_mangle]
pub extern "C" fn gbcc_provide_font_atlas(width: u32, height: u32, bytes: *const u8, len: usize) -> ErrorCode {
    catch_panic!(ErrorCode::Panic, {
        match byte_slice(bytes, len) {
            Some(bytes) => code(CONTROLLER.provide_font_atlas(width, height, bytes)),
            None => ErrorCode::InvalidArgument,
        }
    })
}

#[no_mangle]
pub extern "C" fn gbcc_destroy_font_atlas() -> bool {
    catch_panic!(false, CONTROLLER.destroy_font_atlas())
}

#[no_mangle]
pub extern "C" fn gbcc_printer_connected() -> bool {
    catch_panic!(false, CONTROLLER.printer_connected())
}

/// True once per print job, when the game starts printing.
#[no_mangle]
pub extern "C" fn gbcc_should_start_printing() -> bool {
    catch_panic!(false, CONTROLLER.should_start_printing())
}

#[no_mangle]
pub extern "C" fn gbcc_is_printing() -> bool {
    catch_panic!(false, CONTROLLER.is_printing())
}

/// Advance the print job by one strip, then collect it with
/// `gbcc_take_printer_strip`. Returns true when the job has finished.
#[no_mangle]
pub extern "C" fn gbcc_update_printer() -> bool {
    catch_panic!(true, CONTROLLER.update_printer())
}

/// Printed rows since the last call, or null when there are none. The
/// length is written to `len`; free with `gbcc_free_bytes`.
#[no_mangle]
pub extern "C" fn gbcc_take_printer_strip(len: *mut usize) -> *mut u8 {
    catch_panic!(ptr::null_mut(), {
        if len.is_null() {
            return ptr::null_mut();
        }
        let strip = CONTROLLER.take_printer_strip();
        unsafe { *len = strip.len() };
        if strip.is_empty() {
            return ptr::null_mut();
        }
        Box::into_raw(strip.into_boxed_slice()) as *mut u8
    })
}

#[no_mangle]
pub extern "C" fn gbcc_free_bytes(bytes: *mut u8, len: usize) {
    if bytes.is_null() {
        return;
    }
    unsafe {
        drop(Box::from_raw(ptr::slice_from_raw_parts_mut(bytes, len)));
    }
}

#[no_mangle]
pub extern "C" fn gbcc_reset_printer() {
    catch_panic!((), CONTROLLER.reset_printer())
}
