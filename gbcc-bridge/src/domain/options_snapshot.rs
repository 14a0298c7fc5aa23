//! OptionsSnapshot - transient session options
//!
//! Captured when the host is about to tear the surface down, handed back on
//! the next start, cleared on stop. The record is flat (`Copy`, no
//! references) and travels through the host as an opaque byte block with an
//! explicit, versioned layout:
//!
//! ```text
//! off  size  field
//!   0     4  magic "GBOP"
//!   4     2  version (LE)
//!   6     1  initialised
//!   7     1  flags: autosave | frame_blending<<1 | interlacing<<2 | show_fps<<3 | vsync<<4
//!   8     4  turbo_speed (f32 bits, LE)
//!  12     4  palette (LE)
//!  16     1  menu initialised
//!  17     1  menu visible
//!  18     1  pending save slot (0xFF = none)
//!  19     1  pending load slot (0xFF = none)
//!  20     1  menu selection
//!  21     1  shader name length
//!  22    32  shader name, zero padded
//! ```

use thiserror::Error;

use crate::engine::{Engine, EngineConfig, MenuSelection, MenuState};

pub const SNAPSHOT_MAGIC: [u8; 4] = *b"GBOP";
pub const SNAPSHOT_VERSION: u16 = 1;
pub const SHADER_NAME_CAPACITY: usize = 32;
pub const SNAPSHOT_LEN: usize = 22 + SHADER_NAME_CAPACITY;

/// Pending-slot byte meaning "none"
pub const NO_SLOT: u8 = 0xFF;

const FLAG_AUTOSAVE: u8 = 1 << 0;
const FLAG_FRAME_BLENDING: u8 = 1 << 1;
const FLAG_INTERLACING: u8 = 1 << 2;
const FLAG_SHOW_FPS: u8 = 1 << 3;
const FLAG_VSYNC: u8 = 1 << 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("options snapshot must be {expected} bytes, got {got}")]
    Length { expected: usize, got: usize },

    #[error("options snapshot has bad magic {0:02x?}")]
    Magic([u8; 4]),

    #[error("unsupported options snapshot version {0}")]
    Version(u16),

    #[error("unknown menu selection {0}")]
    Selection(u8),

    #[error("invalid shader name in options snapshot")]
    ShaderName,
}

// ============================================================================
// ShaderName
// ============================================================================

/// Shader name stored inline, at most `SHADER_NAME_CAPACITY` bytes of UTF-8.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ShaderName {
    len: u8,
    bytes: [u8; SHADER_NAME_CAPACITY],
}

impl ShaderName {
    /// Longer names are cut at the last char boundary that fits.
    pub fn truncating(name: &str) -> Self {
        let mut end = name.len().min(SHADER_NAME_CAPACITY);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        let mut bytes = [0u8; SHADER_NAME_CAPACITY];
        bytes[..end].copy_from_slice(&name.as_bytes()[..end]);
        Self { len: end as u8, bytes }
    }

    pub fn as_str(&self) -> &str {
        // Only built from &str prefixes or validated bytes.
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn from_raw(len: u8, raw: &[u8]) -> Result<Self, SnapshotError> {
        let len_usize = len as usize;
        if len_usize > SHADER_NAME_CAPACITY {
            return Err(SnapshotError::ShaderName);
        }
        std::str::from_utf8(&raw[..len_usize]).map_err(|_| SnapshotError::ShaderName)?;
        let mut bytes = [0u8; SHADER_NAME_CAPACITY];
        bytes[..len_usize].copy_from_slice(&raw[..len_usize]);
        Ok(Self { len, bytes })
    }
}

impl Default for ShaderName {
    fn default() -> Self {
        Self {
            len: 0,
            bytes: [0u8; SHADER_NAME_CAPACITY],
        }
    }
}

impl std::fmt::Debug for ShaderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ShaderName").field(&self.as_str()).finish()
    }
}

// ============================================================================
// OptionsSnapshot
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OptionsSnapshot {
    pub initialised: bool,
    pub config: EngineConfig,
    pub menu: MenuState,
    pub shader: ShaderName,
}

impl OptionsSnapshot {
    /// Read the live engine state into a new, initialised snapshot.
    pub fn capture<E: Engine>(engine: &E) -> Self {
        Self {
            initialised: true,
            config: engine.config(),
            menu: engine.menu(),
            shader: ShaderName::truncating(&engine.shader_name()),
        }
    }

    /// Write the snapshot back into the engine. Does nothing unless
    /// initialised.
    pub fn apply<E: Engine>(&self, engine: &E) {
        if !self.initialised {
            return;
        }
        engine.set_config(self.config);
        self.apply_display(engine);
    }

    /// Menu and shader part only; used when the surface is rebuilt without
    /// the engine restarting.
    pub fn apply_display<E: Engine>(&self, engine: &E) {
        if !self.initialised {
            return;
        }
        if self.menu.initialised {
            engine.set_menu(self.menu);
        }
        if !self.shader.is_empty() {
            engine.select_shader(self.shader.as_str());
        }
    }

    /// Reset to the all-zero, un-initialised form.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn encode(&self) -> [u8; SNAPSHOT_LEN] {
        let mut out = [0u8; SNAPSHOT_LEN];
        let config = &self.config;

        out[0..4].copy_from_slice(&SNAPSHOT_MAGIC);
        out[4..6].copy_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
        out[6] = self.initialised as u8;
        out[7] = flag(config.autosave, FLAG_AUTOSAVE)
            | flag(config.frame_blending, FLAG_FRAME_BLENDING)
            | flag(config.interlacing, FLAG_INTERLACING)
            | flag(config.show_fps, FLAG_SHOW_FPS)
            | flag(config.vsync, FLAG_VSYNC);
        out[8..12].copy_from_slice(&config.turbo_speed.to_bits().to_le_bytes());
        out[12..16].copy_from_slice(&config.palette.to_le_bytes());
        out[16] = self.menu.initialised as u8;
        out[17] = self.menu.visible as u8;
        out[18] = self.menu.pending_save.unwrap_or(NO_SLOT);
        out[19] = self.menu.pending_load.unwrap_or(NO_SLOT);
        out[20] = self.menu.selection as u8;
        out[21] = self.shader.len;
        out[22..].copy_from_slice(&self.shader.bytes);
        out
    }

    /// Parse a block produced by `encode`. An empty block means the host had
    /// nothing stored and yields the cleared snapshot.
    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        if bytes.len() != SNAPSHOT_LEN {
            return Err(SnapshotError::Length {
                expected: SNAPSHOT_LEN,
                got: bytes.len(),
            });
        }

        let magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
        if magic != SNAPSHOT_MAGIC {
            return Err(SnapshotError::Magic(magic));
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != SNAPSHOT_VERSION {
            return Err(SnapshotError::Version(version));
        }

        let flags = bytes[7];
        let config = EngineConfig {
            turbo_speed: f32::from_bits(u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]])),
            autosave: flags & FLAG_AUTOSAVE != 0,
            frame_blending: flags & FLAG_FRAME_BLENDING != 0,
            interlacing: flags & FLAG_INTERLACING != 0,
            show_fps: flags & FLAG_SHOW_FPS != 0,
            vsync: flags & FLAG_VSYNC != 0,
            palette: u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
        };
        let menu = MenuState {
            initialised: bytes[16] != 0,
            visible: bytes[17] != 0,
            pending_save: slot(bytes[18]),
            pending_load: slot(bytes[19]),
            selection: MenuSelection::from_u8(bytes[20]).ok_or(SnapshotError::Selection(bytes[20]))?,
        };

        Ok(Self {
            initialised: bytes[6] != 0,
            config,
            menu,
            shader: ShaderName::from_raw(bytes[21], &bytes[22..])?,
        })
    }
}

#[inline]
fn flag(set: bool, bit: u8) -> u8 {
    if set {
        bit
    } else {
        0
    }
}

#[inline]
fn slot(raw: u8) -> Option<u8> {
    (raw != NO_SLOT).then_some(raw)
}
