//! Engine vtable - the C engine behind the `Engine` trait
//!
//! The host registers its emulation core once with `gbcc_register_engine`,
//! as a table of C function pointers. `ForeignEngine` wraps one engine
//! instance created through that table.
//!
//! Pointers handed to the C side:
//! - `GbccHostHandle`: valid for the lifetime of the engine instance; pass it
//!   to `gbcc_camera_capture` / `gbcc_font_atlas`
//! - `GbccCancelToken`: valid only during the `run_frame` call; pass it to
//!   `gbcc_worker_park` / `gbcc_worker_cancelled`

use std::ffi::{c_char, c_void, CString};
use std::path::Path;

use once_cell::sync::OnceCell;

use super::callbacks::{GbccCancelToken, GbccHostHandle};
use crate::domain::options_snapshot::NO_SLOT;
use crate::engine::{Engine, EngineConfig, EngineError, HostServices, Key, MenuSelection, MenuState};
use crate::infra::CancelToken;
use crate::bridge_log_warn;

/// Size of the buffer the engine writes its error text into
pub const ERROR_BUFFER_LEN: usize = 512;

const SHADER_NAME_BUFFER_LEN: usize = 128;

// ============================================================================
// C value types
// ============================================================================

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct GbccConfig {
    pub turbo_speed: f32,
    pub palette: u32,
    pub autosave: bool,
    pub frame_blending: bool,
    pub interlacing: bool,
    pub show_fps: bool,
    pub vsync: bool,
}

impl From<EngineConfig> for GbccConfig {
    fn from(config: EngineConfig) -> Self {
        Self {
            turbo_speed: config.turbo_speed,
            palette: config.palette,
            autosave: config.autosave,
            frame_blending: config.frame_blending,
            interlacing: config.interlacing,
            show_fps: config.show_fps,
            vsync: config.vsync,
        }
    }
}

impl From<GbccConfig> for EngineConfig {
    fn from(config: GbccConfig) -> Self {
        Self {
            turbo_speed: config.turbo_speed,
            autosave: config.autosave,
            frame_blending: config.frame_blending,
            interlacing: config.interlacing,
            show_fps: config.show_fps,
            vsync: config.vsync,
            palette: config.palette,
        }
    }
}

/// Menu sub-state; slots use `0xFF` for "none".
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct GbccMenu {
    pub initialised: bool,
    pub visible: bool,
    pub pending_save: u8,
    pub pending_load: u8,
    pub selection: u8,
}

impl Default for GbccMenu {
    fn default() -> Self {
        MenuState::default().into()
    }
}

impl From<MenuState> for GbccMenu {
    fn from(menu: MenuState) -> Self {
        Self {
            initialised: menu.initialised,
            visible: menu.visible,
            pending_save: menu.pending_save.unwrap_or(NO_SLOT),
            pending_load: menu.pending_load.unwrap_or(NO_SLOT),
            selection: menu.selection as u8,
        }
    }
}

impl From<GbccMenu> for MenuState {
    fn from(menu: GbccMenu) -> Self {
        let slot = |raw: u8| (raw != NO_SLOT).then_some(raw);
        let selection = MenuSelection::from_u8(menu.selection).unwrap_or_else(|| {
            bridge_log_warn!("[Engine] unknown menu selection {}, using the first entry", menu.selection);
            MenuSelection::default()
        });
        Self {
            initialised: menu.initialised,
            visible: menu.visible,
            pending_save: slot(menu.pending_save),
            pending_load: slot(menu.pending_load),
            selection,
        }
    }
}

// ============================================================================
// VTable
// ============================================================================

type EngineFn = extern "C" fn(engine: *mut c_void);
type EngineQueryFn = extern "C" fn(engine: *mut c_void) -> bool;

/// Entry points of the host's emulation core.
///
/// `initialize` returns an opaque engine pointer (null on failure, with a
/// NUL-terminated message written to `error`). Every other entry takes that
/// pointer first. The engine synchronises its own state: entries are called
/// from the control, render and worker threads.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct GbccEngineVTable {
    pub context: *mut c_void,

    pub initialize: extern "C" fn(
        context: *mut c_void,
        rom: *const c_char,
        host: *const GbccHostHandle,
        error: *mut c_char,
        error_len: usize,
    ) -> *mut c_void,
    pub validate_rom:
        extern "C" fn(context: *mut c_void, rom: *const c_char, error: *mut c_char, error_len: usize) -> bool,
    pub free: EngineFn,
    pub run_frame: extern "C" fn(engine: *mut c_void, cancel: *const GbccCancelToken),

    pub set_save_directory: extern "C" fn(engine: *mut c_void, dir: *const c_char),
    pub set_focus: extern "C" fn(engine: *mut c_void, focused: bool),
    pub audio_init: extern "C" fn(engine: *mut c_void, sample_rate: u32, samples_per_buffer: u32),
    pub audio_destroy: EngineFn,

    pub process_key: extern "C" fn(engine: *mut c_void, key: i32, pressed: bool),
    pub is_pressed: extern "C" fn(engine: *mut c_void, key: i32) -> bool,
    pub toggle_turbo: EngineQueryFn,
    pub toggle_menu: EngineFn,

    pub request_save_slot: extern "C" fn(engine: *mut c_void, slot: u8),
    pub request_load_slot: extern "C" fn(engine: *mut c_void, slot: u8),
    pub apply_state_requests: EngineFn,

    pub get_config: extern "C" fn(engine: *mut c_void, out: *mut GbccConfig),
    pub set_config: extern "C" fn(engine: *mut c_void, config: *const GbccConfig),
    pub get_menu: extern "C" fn(engine: *mut c_void, out: *mut GbccMenu),
    pub set_menu: extern "C" fn(engine: *mut c_void, menu: *const GbccMenu),
    /// Writes a NUL-terminated name into `out`, truncated to `len`.
    pub shader_name: extern "C" fn(engine: *mut c_void, out: *mut c_char, len: usize),
    pub select_shader: extern "C" fn(engine: *mut c_void, name: *const c_char),
    pub load_config: extern "C" fn(engine: *mut c_void, path: *const c_char) -> bool,
    pub reset_cheats: EngineFn,

    pub init_window: EngineFn,
    pub destroy_window: EngineFn,
    pub resize_window: extern "C" fn(engine: *mut c_void, width: u32, height: u32),
    pub display_update: EngineFn,

    pub has_rumble: EngineQueryFn,
    pub rumble_active: EngineQueryFn,
    pub has_accelerometer: EngineQueryFn,
    pub set_accelerometer: extern "C" fn(engine: *mut c_void, x: u16, y: u16),
    pub is_camera: EngineQueryFn,

    pub turbo_engaged: EngineQueryFn,
    pub error_occurred: EngineQueryFn,
    pub flush_logs: EngineFn,

    pub printer_connected: EngineQueryFn,
    /// True once per print job, when the game starts printing.
    pub should_start_printing: EngineQueryFn,
    pub is_printing: EngineQueryFn,
    /// Advance the job by one strip. Returns true when the job is finished.
    pub update_printer: EngineQueryFn,
    pub printer_strip_len: extern "C" fn(engine: *mut c_void) -> usize,
    /// Copies at most `len` bytes of the pending strip and clears it.
    /// Returns the number of bytes written.
    pub take_printer_strip: extern "C" fn(engine: *mut c_void, out: *mut u8, len: usize) -> usize,
    pub reset_printer: EngineFn,
}

// The table is immutable once registered; the engine behind `context`
// synchronises itself.
unsafe impl Send for GbccEngineVTable {}
unsafe impl Sync for GbccEngineVTable {}

static ENGINE_VTABLE: OnceCell<GbccEngineVTable> = OnceCell::new();

/// Install the engine table. Only the first call takes effect.
pub fn register_engine(vtable: GbccEngineVTable) -> bool {
    ENGINE_VTABLE.set(vtable).is_ok()
}

// ============================================================================
// ForeignEngine
// ============================================================================

pub struct ForeignEngine {
    vtable: GbccEngineVTable,
    handle: *mut c_void,
    /// Boxed so the pointer given to the engine stays put; only the engine
    /// reads it, through the callbacks.
    _host: Box<HostServices>,
}

// See `GbccEngineVTable`: the C engine serialises access to `handle`.
unsafe impl Send for ForeignEngine {}
unsafe impl Sync for ForeignEngine {}

impl ForeignEngine {
    /// Create an engine instance through `vtable`.
    pub fn with_vtable(vtable: GbccEngineVTable, rom: &Path, host: HostServices) -> Result<Self, EngineError> {
        let rom_c = path_cstring(rom)?;
        let host = Box::new(host);
        let host_ptr = &*host as *const HostServices as *const GbccHostHandle;

        let mut error = [0 as c_char; ERROR_BUFFER_LEN];
        let handle = (vtable.initialize)(vtable.context, rom_c.as_ptr(), host_ptr, error.as_mut_ptr(), error.len());
        if handle.is_null() {
            return Err(engine_error(&error, || format!("engine failed to load {}", rom.display())));
        }

        Ok(Self {
            vtable,
            handle,
            _host: host,
        })
    }

    fn registered() -> Result<GbccEngineVTable, EngineError> {
        ENGINE_VTABLE
            .get()
            .copied()
            .ok_or_else(|| EngineError::new("no engine registered"))
    }
}

impl Engine for ForeignEngine {
    fn initialize(rom: &Path, host: HostServices) -> Result<Self, EngineError> {
        Self::with_vtable(Self::registered()?, rom, host)
    }

    fn validate_rom(rom: &Path) -> Result<(), EngineError> {
        let vtable = Self::registered()?;
        let rom_c = path_cstring(rom)?;
        let mut error = [0 as c_char; ERROR_BUFFER_LEN];
        if (vtable.validate_rom)(vtable.context, rom_c.as_ptr(), error.as_mut_ptr(), error.len()) {
            Ok(())
        } else {
            Err(engine_error(&error, || format!("{} is not a valid ROM", rom.display())))
        }
    }

    fn free(&self) {
        (self.vtable.free)(self.handle)
    }

    fn run_frame(&self, cancel: &CancelToken) {
        let token = cancel as *const CancelToken as *const GbccCancelToken;
        (self.vtable.run_frame)(self.handle, token)
    }

    fn set_save_directory(&self, dir: &str) {
        match CString::new(dir) {
            Ok(dir) => (self.vtable.set_save_directory)(self.handle, dir.as_ptr()),
            Err(_) => bridge_log_warn!("[Engine] save directory contains NUL, not passed on"),
        }
    }

    fn set_focus(&self, focused: bool) {
        (self.vtable.set_focus)(self.handle, focused)
    }

    fn audio_init(&self, sample_rate: u32, samples_per_buffer: u32) {
        (self.vtable.audio_init)(self.handle, sample_rate, samples_per_buffer)
    }

    fn audio_destroy(&self) {
        (self.vtable.audio_destroy)(self.handle)
    }

    fn process_key(&self, key: Key, pressed: bool) {
        (self.vtable.process_key)(self.handle, key.code(), pressed)
    }

    fn is_pressed(&self, key: Key) -> bool {
        (self.vtable.is_pressed)(self.handle, key.code())
    }

    fn toggle_turbo(&self) -> bool {
        (self.vtable.toggle_turbo)(self.handle)
    }

    fn toggle_menu(&self) {
        (self.vtable.toggle_menu)(self.handle)
    }

    fn request_save_slot(&self, slot: u8) {
        (self.vtable.request_save_slot)(self.handle, slot)
    }

    fn request_load_slot(&self, slot: u8) {
        (self.vtable.request_load_slot)(self.handle, slot)
    }

    fn apply_state_requests(&self) {
        (self.vtable.apply_state_requests)(self.handle)
    }

    fn config(&self) -> EngineConfig {
        let mut config = GbccConfig::default();
        (self.vtable.get_config)(self.handle, &mut config);
        config.into()
    }

    fn set_config(&self, config: EngineConfig) {
        let config = GbccConfig::from(config);
        (self.vtable.set_config)(self.handle, &config)
    }

    fn menu(&self) -> MenuState {
        let mut menu = GbccMenu::default();
        (self.vtable.get_menu)(self.handle, &mut menu);
        menu.into()
    }

    fn set_menu(&self, menu: MenuState) {
        let menu = GbccMenu::from(menu);
        (self.vtable.set_menu)(self.handle, &menu)
    }

    fn shader_name(&self) -> String {
        let mut name = [0 as c_char; SHADER_NAME_BUFFER_LEN];
        (self.vtable.shader_name)(self.handle, name.as_mut_ptr(), name.len());
        buffer_text(&name)
    }

    fn select_shader(&self, name: &str) {
        match CString::new(name) {
            Ok(name) => (self.vtable.select_shader)(self.handle, name.as_ptr()),
            Err(_) => bridge_log_warn!("[Engine] shader name contains NUL, not selected"),
        }
    }

    fn load_config(&self, path: &Path) -> Result<(), EngineError> {
        let path_c = path_cstring(path)?;
        if (self.vtable.load_config)(self.handle, path_c.as_ptr()) {
            Ok(())
        } else {
            Err(EngineError::new(format!("could not load {}", path.display())))
        }
    }

    fn reset_cheats(&self) {
        (self.vtable.reset_cheats)(self.handle)
    }

    fn init_window(&self) {
        (self.vtable.init_window)(self.handle)
    }

    fn destroy_window(&self) {
        (self.vtable.destroy_window)(self.handle)
    }

    fn resize_window(&self, width: u32, height: u32) {
        (self.vtable.resize_window)(self.handle, width, height)
    }

    fn display_update(&self) {
        (self.vtable.display_update)(self.handle)
    }

    fn has_rumble(&self) -> bool {
        (self.vtable.has_rumble)(self.handle)
    }

    fn rumble_active(&self) -> bool {
        (self.vtable.rumble_active)(self.handle)
    }

    fn has_accelerometer(&self) -> bool {
        (self.vtable.has_accelerometer)(self.handle)
    }

    fn set_accelerometer(&self, x: u16, y: u16) {
        (self.vtable.set_accelerometer)(self.handle, x, y)
    }

    fn is_camera(&self) -> bool {
        (self.vtable.is_camera)(self.handle)
    }

    fn turbo_engaged(&self) -> bool {
        (self.vtable.turbo_engaged)(self.handle)
    }

    fn error_occurred(&self) -> bool {
        (self.vtable.error_occurred)(self.handle)
    }

    fn flush_logs(&self) {
        (self.vtable.flush_logs)(self.handle)
    }

    fn printer_connected(&self) -> bool {
        (self.vtable.printer_connected)(self.handle)
    }

    fn should_start_printing(&self) -> bool {
        (self.vtable.should_start_printing)(self.handle)
    }

    fn is_printing(&self) -> bool {
        (self.vtable.is_printing)(self.handle)
    }

    fn update_printer(&self) -> bool {
        (self.vtable.update_printer)(self.handle)
    }

    fn take_printer_strip(&self) -> Vec<u8> {
        let len = (self.vtable.printer_strip_len)(self.handle);
        if len == 0 {
            return Vec::new();
        }
        let mut strip = vec![0u8; len];
        let written = (self.vtable.take_printer_strip)(self.handle, strip.as_mut_ptr(), strip.len());
        strip.truncate(written);
        strip
    }

    fn reset_printer(&self) {
        (self.vtable.reset_printer)(self.handle)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn path_cstring(path: &Path) -> Result<CString, EngineError> {
    CString::new(path.to_string_lossy().as_bytes())
        .map_err(|_| EngineError::new(format!("path contains NUL: {}", path.display())))
}

/// Text up to the first NUL; the whole buffer if there is none.
fn buffer_text(buffer: &[c_char]) -> String {
    let bytes: Vec<u8> = buffer.iter().take_while(|&&c| c != 0).map(|&c| c as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn engine_error(buffer: &[c_char], fallback: impl FnOnce() -> String) -> EngineError {
    let message = buffer_text(buffer);
    if message.is_empty() {
        EngineError::new(fallback())
    } else {
        EngineError::new(message)
    }
}
