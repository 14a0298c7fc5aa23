//! Engine contract
//!
//! The emulation core (CPU/PPU/APU/cartridge) lives outside this crate. This
//! module fixes the entry points the session layer drives and the plain
//! value types that cross the boundary.
//!
//! All methods take `&self`: the engine is shared between the control thread,
//! the render thread and the emulation worker, and owns its own interior
//! synchronisation the same way a C engine handle does.

use std::path::Path;
use std::sync::Arc;

use crate::domain::peripherals::{CameraFeed, FontAtlas};
use crate::infra::CancelToken;

/// Reserved save-state slot used for suspend/auto-resume.
pub const AUTO_SAVE_SLOT: u8 = 10;

/// Save-state slots a user may address directly.
pub const USER_SLOTS: std::ops::RangeInclusive<u8> = 1..=9;

// ============================================================================
// Value types
// ============================================================================

/// Scalar engine configuration that survives surface teardown.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineConfig {
    /// Turbo multiplier, 0 = unlimited
    pub turbo_speed: f32,
    pub autosave: bool,
    pub frame_blending: bool,
    pub interlacing: bool,
    pub show_fps: bool,
    pub vsync: bool,
    /// Engine palette identifier
    pub palette: u32,
}

/// Entry currently highlighted in the in-emulator menu.
#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MenuSelection {
    #[default]
    SaveState = 0,
    LoadState = 1,
    Palette = 2,
    Shader = 3,
    Turbo = 4,
    FrameBlending = 5,
    Vsync = 6,
    Interlacing = 7,
    Autosave = 8,
    Fps = 9,
    Exit = 10,
}

impl MenuSelection {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::SaveState,
            1 => Self::LoadState,
            2 => Self::Palette,
            3 => Self::Shader,
            4 => Self::Turbo,
            5 => Self::FrameBlending,
            6 => Self::Vsync,
            7 => Self::Interlacing,
            8 => Self::Autosave,
            9 => Self::Fps,
            10 => Self::Exit,
            _ => return None,
        })
    }
}

/// In-emulator menu sub-state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MenuState {
    pub initialised: bool,
    pub visible: bool,
    pub pending_save: Option<u8>,
    pub pending_load: Option<u8>,
    pub selection: MenuSelection,
}

/// Logical keys understood by the engine.
///
/// Host codes are stable; see `Key::from_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    A,
    B,
    Start,
    Select,
    Up,
    Down,
    Left,
    Right,
    Turbo,
    Pause,
    Printer,
    Fps,
    FrameBlending,
    Vsync,
    LinkCable,
    Autosave,
    Menu,
    Interlace,
    Shader,
}

impl Key {
    /// Map a host key code; unknown codes (including the host's `-1`
    /// "unmapped") yield `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => Self::A,
            1 => Self::B,
            2 => Self::Start,
            3 => Self::Select,
            4 => Self::Up,
            5 => Self::Down,
            6 => Self::Left,
            7 => Self::Right,
            8 => Self::Turbo,
            9 => Self::Pause,
            10 => Self::Printer,
            11 => Self::Fps,
            12 => Self::FrameBlending,
            13 => Self::Vsync,
            14 => Self::LinkCable,
            15 => Self::Autosave,
            16 => Self::Menu,
            17 => Self::Interlace,
            18 => Self::Shader,
            _ => return None,
        })
    }

    /// Host code for this key.
    pub fn code(self) -> i32 {
        self as i32
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Failure reported by the engine, carrying its own message text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================================================
// Services handed to the engine
// ============================================================================

/// Capabilities the engine calls back into: camera capture and the text
/// tileset. Screenshots are a no-op on this platform.
#[derive(Clone, Default)]
pub struct HostServices {
    pub camera: Arc<CameraFeed>,
    pub font_atlas: Arc<FontAtlas>,
}

// ============================================================================
// Contract
// ============================================================================

pub trait Engine: Send + Sync + Sized + 'static {
    /// Load `rom` and bring the core up. No worker exists yet.
    fn initialize(rom: &Path, host: HostServices) -> Result<Self, EngineError>;

    /// Check that `rom` is loadable without creating a session.
    fn validate_rom(rom: &Path) -> Result<(), EngineError>;

    /// Release engine resources. Called exactly once per initialised engine.
    fn free(&self);

    /// One iteration of the run-loop. Pacing waits must park on `cancel`
    /// so that `stop()` can interrupt them.
    fn run_frame(&self, cancel: &CancelToken);

    /// Directory for battery saves and save states.
    fn set_save_directory(&self, dir: &str);
    /// Advisory; an unfocused engine may throttle its pacing.
    fn set_focus(&self, focused: bool);

    fn audio_init(&self, sample_rate: u32, samples_per_buffer: u32);
    fn audio_destroy(&self);

    fn process_key(&self, key: Key, pressed: bool);
    fn is_pressed(&self, key: Key) -> bool;
    /// Returns the new turbo state.
    fn toggle_turbo(&self) -> bool;
    fn toggle_menu(&self);

    fn request_save_slot(&self, slot: u8);
    fn request_load_slot(&self, slot: u8);
    /// Perform pending save/load requests immediately instead of at the next
    /// frame boundary.
    fn apply_state_requests(&self);

    fn config(&self) -> EngineConfig;
    fn set_config(&self, config: EngineConfig);
    fn menu(&self) -> MenuState;
    fn set_menu(&self, menu: MenuState);
    fn shader_name(&self) -> String;
    fn select_shader(&self, name: &str);
    fn load_config(&self, path: &Path) -> Result<(), EngineError>;
    fn reset_cheats(&self);

    fn init_window(&self);
    fn destroy_window(&self);
    fn resize_window(&self, width: u32, height: u32);
    fn display_update(&self);

    fn has_rumble(&self) -> bool;
    fn rumble_active(&self) -> bool;
    fn has_accelerometer(&self) -> bool;
    fn set_accelerometer(&self, x: u16, y: u16);
    fn is_camera(&self) -> bool;

    fn turbo_engaged(&self) -> bool;
    fn error_occurred(&self) -> bool;
    fn flush_logs(&self);

    fn printer_connected(&self) -> bool;
    /// True once when the game starts a print job; reading it clears it.
    fn should_start_printing(&self) -> bool;
    fn is_printing(&self) -> bool;
    /// Move the running job on by one strip (picked up with
    /// `take_printer_strip`). Returns true once the job has finished.
    fn update_printer(&self) -> bool;
    fn take_printer_strip(&self) -> Vec<u8>;
    fn reset_printer(&self);
}
