//! Peripheral data sources the engine pulls from
//!
//! - `CameraFeed`: latest reduced sensor frame for the camera cartridge
//! - `FontAtlas`: text tileset bitmap used by the on-screen menu/overlays
//! - `accelerometer_axes`: m/s² to the tilt cartridge's 16-bit range
//!
//! Both feeds refuse to be read or written before they are initialised.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use super::frame_reducer::{CameraImage, FrameReducer, ReduceError, SensorFrame, CAMERA_PIXELS};

/// Tiles per atlas row and column (one tile per byte value).
pub const ATLAS_TILES_PER_SIDE: u32 = 16;

/// The host hands over 32-bit RGBA bitmaps.
pub const ATLAS_BYTES_PER_PIXEL: usize = 4;

/// Standard gravity, m/s²
pub const STANDARD_GRAVITY: f32 = 9.80665;

/// Tilt sensor reading at rest
pub const ACCEL_CENTER: f32 = 0x81D0 as f32;

/// Tilt sensor counts per g
pub const ACCEL_SCALE: f32 = 0x70 as f32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeripheralError {
    #[error("camera feed is not initialised")]
    CameraInactive,

    #[error("camera image must be {expected} bytes, got {got}")]
    ImageSize { expected: usize, got: usize },

    #[error("font atlas is not initialised")]
    AtlasNotInitialised,

    #[error("font atlas {width}x{height} with {len} bytes is not a valid tileset")]
    AtlasSize { width: u32, height: u32, len: usize },

    #[error(transparent)]
    Reduce(#[from] ReduceError),
}

// ============================================================================
// Camera
// ============================================================================

#[derive(Default)]
struct CameraState {
    image: Option<Box<CameraImage>>,
    reducer: FrameReducer,
}

/// Latest camera image, shared between the host's sensor callback and the
/// emulation worker.
#[derive(Default)]
pub struct CameraFeed {
    state: Mutex<CameraState>,
}

impl CameraFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the image (mid grey) if nothing has been installed yet.
    pub fn activate(&self) {
        let mut state = self.state.lock();
        if state.image.is_none() {
            state.image = Some(Box::new([0x80; CAMERA_PIXELS]));
        }
    }

    /// Drop the image; the feed refuses reads and writes until activated
    /// again.
    pub fn deactivate(&self) {
        self.state.lock().image = None;
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().image.is_some()
    }

    /// Install a static image, used until live frames arrive. Initialises the
    /// feed.
    pub fn set_fallback_image(&self, bytes: &[u8]) -> Result<(), PeripheralError> {
        let image: &CameraImage = bytes.try_into().map_err(|_| PeripheralError::ImageSize {
            expected: CAMERA_PIXELS,
            got: bytes.len(),
        })?;
        self.state.lock().image = Some(Box::new(*image));
        Ok(())
    }

    /// Reduce a live sensor frame into the camera image.
    pub fn update_frame(&self, frame: &SensorFrame<'_>) -> Result<(), PeripheralError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let image = state.image.as_deref_mut().ok_or(PeripheralError::CameraInactive)?;
        state.reducer.reduce(frame, image)?;
        Ok(())
    }

    /// Copy the latest image out; called by the engine from the worker.
    pub fn capture(&self, out: &mut CameraImage) -> Result<(), PeripheralError> {
        let state = self.state.lock();
        let image = state.image.as_deref().ok_or(PeripheralError::CameraInactive)?;
        out.copy_from_slice(image);
        Ok(())
    }
}

// ============================================================================
// Font atlas
// ============================================================================

/// Tileset handed to the engine's text renderer.
#[derive(Debug, Clone)]
pub struct Tileset {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub pixels: Arc<[u8]>,
}

#[derive(Default)]
pub struct FontAtlas {
    tileset: Mutex<Option<Tileset>>,
}

impl FontAtlas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provide(&self, width: u32, height: u32, pixels: &[u8]) -> Result<(), PeripheralError> {
        let expected = width as usize * height as usize * ATLAS_BYTES_PER_PIXEL;
        let tiles_fit = width % ATLAS_TILES_PER_SIDE == 0 && height % ATLAS_TILES_PER_SIDE == 0;
        if width == 0 || height == 0 || !tiles_fit || pixels.len() != expected {
            return Err(PeripheralError::AtlasSize {
                width,
                height,
                len: pixels.len(),
            });
        }

        *self.tileset.lock() = Some(Tileset {
            width,
            height,
            tile_width: width / ATLAS_TILES_PER_SIDE,
            tile_height: height / ATLAS_TILES_PER_SIDE,
            pixels: Arc::from(pixels),
        });
        Ok(())
    }

    pub fn tileset(&self) -> Result<Tileset, PeripheralError> {
        self.tileset.lock().clone().ok_or(PeripheralError::AtlasNotInitialised)
    }

    /// Back to the un-initialised state. Returns whether a tileset was held.
    pub fn destroy(&self) -> bool {
        self.tileset.lock().take().is_some()
    }
}

// ============================================================================
// Accelerometer
// ============================================================================

/// Convert device acceleration (m/s², screen-aligned) to tilt sensor counts.
///
/// The sensor's y axis points the other way from the device's.
pub fn accelerometer_axes(x: f32, y: f32) -> (u16, u16) {
    let convert = |value: f32| value.clamp(0.0, u16::MAX as f32) as u16;
    (
        convert(ACCEL_CENTER + ACCEL_SCALE * (x / STANDARD_GRAVITY)),
        convert(ACCEL_CENTER - ACCEL_SCALE * (y / STANDARD_GRAVITY)),
    )
}
