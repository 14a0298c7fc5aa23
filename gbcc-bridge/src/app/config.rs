//! Session configuration
//!
//! - `Preferences`: the host's preference set, delivered as JSON
//! - `AudioConfig`: output format handed to the engine
//! - `StartOptions`: everything `SessionController::start` needs
//! - `GateConfig`: RenderGate tuning

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::EngineConfig;
use crate::infra::DEFAULT_TEARDOWN_TIMEOUT;

pub const DEFAULT_SHADER: &str = "Subpixel";

/// Host preferences applied at session start.
///
/// Missing keys take their defaults and unknown keys are ignored, so older
/// and newer hosts can share one preference blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// 0 = unlimited
    pub turbo_speed: f32,
    pub palette: u32,
    pub shader: String,
    pub autosave: bool,
    pub frame_blending: bool,
    pub interlacing: bool,
    pub show_fps: bool,
    pub vsync: bool,
    /// Load the reserved auto-save slot right after start.
    pub auto_resume: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            turbo_speed: 0.0,
            palette: 0,
            shader: DEFAULT_SHADER.to_string(),
            autosave: false,
            frame_blending: false,
            interlacing: false,
            show_fps: false,
            vsync: false,
            auto_resume: false,
        }
    }
}

impl Preferences {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            turbo_speed: self.turbo_speed,
            autosave: self.autosave,
            frame_blending: self.frame_blending,
            interlacing: self.interlacing,
            show_fps: self.show_fps,
            vsync: self.vsync,
            palette: self.palette,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub samples_per_buffer: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            samples_per_buffer: 512,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    pub rom: PathBuf,
    pub audio: AudioConfig,
    pub save_dir: String,
    pub config_file: Option<PathBuf>,
    pub cheat_file: Option<PathBuf>,
    pub preferences: Preferences,
}

impl StartOptions {
    pub fn new(rom: impl Into<PathBuf>, save_dir: impl Into<String>) -> Self {
        Self {
            rom: rom.into(),
            save_dir: save_dir.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    /// Upper bound on how long `stop()` waits for an in-flight render tick
    pub teardown_timeout: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            teardown_timeout: DEFAULT_TEARDOWN_TIMEOUT,
        }
    }
}
