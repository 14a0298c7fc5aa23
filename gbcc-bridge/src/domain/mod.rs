//! Domain Layer
//!
//! Pure types and algorithms, no threads:
//! - frame_reducer: sensor frame to 128x128 camera image
//! - options_snapshot: versioned byte record of transient session options
//! - peripherals: camera feed, font atlas, accelerometer conversion

pub mod frame_reducer;
pub mod options_snapshot;
pub mod peripherals;

pub use frame_reducer::{
    box_size, reduce_frame, CameraImage, FrameReducer, ReduceError, Rotation, SensorFrame, CAMERA_PIXELS,
    CAMERA_SIZE,
};
pub use options_snapshot::{OptionsSnapshot, ShaderName, SnapshotError, SHADER_NAME_CAPACITY, SNAPSHOT_LEN};
pub use peripherals::{accelerometer_axes, CameraFeed, FontAtlas, PeripheralError, Tileset};
