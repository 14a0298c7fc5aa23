//! FrameReducer - sensor frame to camera image
//!
//! Turns an arbitrary-resolution greyscale sensor frame into the 128x128
//! image the emulated camera expects:
//!
//! ```text
//! sensor (w x h, stride) ──► horizontal box blur ──► vertical box blur
//!                                                       │
//!              128 x 128 ◄── nearest sample + rotate ◄──┘
//! ```
//!
//! The blur radius follows the downsample ratio, so each output pixel roughly
//! averages the source pixels that map onto it. Sampling afterwards is plain
//! nearest-neighbour.

use thiserror::Error;

/// Side length of the camera image
pub const CAMERA_SIZE: usize = 128;

/// Pixel count of the camera image
pub const CAMERA_PIXELS: usize = CAMERA_SIZE * CAMERA_SIZE;

/// Camera image, one luminance byte per pixel, row-major.
pub type CameraImage = [u8; CAMERA_PIXELS];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReduceError {
    #[error("sensor frame is empty ({width}x{height})")]
    EmptyFrame { width: usize, height: usize },

    #[error("row stride {stride} is smaller than width {width}")]
    Stride { stride: usize, width: usize },

    #[error("sensor frame needs {needed} bytes, got {got}")]
    ShortBuffer { needed: usize, got: usize },
}

/// Sensor rotation in 90 degree steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Anything other than 90/180/270 is treated as no rotation.
    pub fn from_degrees(degrees: i32) -> Self {
        match degrees {
            90 => Self::Deg90,
            180 => Self::Deg180,
            270 => Self::Deg270,
            _ => Self::Deg0,
        }
    }

    /// Destination offset for source sample `(j, i)`.
    #[inline]
    fn dest_index(self, j: usize, i: usize) -> usize {
        const LAST: usize = CAMERA_SIZE - 1;
        let (row, col) = match self {
            Self::Deg0 => (j, i),
            Self::Deg90 => (i, LAST - j),
            Self::Deg180 => (LAST - j, LAST - i),
            Self::Deg270 => (LAST - i, j),
        };
        row * CAMERA_SIZE + col
    }
}

/// Borrowed view of one sensor frame.
#[derive(Debug, Clone, Copy)]
pub struct SensorFrame<'a> {
    pub bytes: &'a [u8],
    pub width: usize,
    pub height: usize,
    pub row_stride: usize,
    pub rotation: Rotation,
}

impl SensorFrame<'_> {
    /// Bytes actually addressed by the frame; the last row needs no padding.
    fn required_len(&self) -> usize {
        self.row_stride * (self.height - 1) + self.width
    }

    fn validate(&self) -> Result<(), ReduceError> {
        if self.width == 0 || self.height == 0 {
            return Err(ReduceError::EmptyFrame {
                width: self.width,
                height: self.height,
            });
        }
        if self.row_stride < self.width {
            return Err(ReduceError::Stride {
                stride: self.row_stride,
                width: self.width,
            });
        }
        let needed = self.required_len();
        if self.bytes.len() < needed {
            return Err(ReduceError::ShortBuffer {
                needed,
                got: self.bytes.len(),
            });
        }
        Ok(())
    }
}

/// Blur radius for a `width x height` frame.
#[inline]
pub fn box_size(width: usize, height: usize) -> usize {
    width.min(height) / CAMERA_SIZE / 2 + 1
}

/// Reusable reducer.
///
/// Holds only scratch allocations; no state carries over between calls and
/// the input is copied, never retained.
#[derive(Debug, Default)]
pub struct FrameReducer {
    scratch: Vec<u8>,
    line: Vec<u8>,
}

impl FrameReducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reduce `frame` into `out`.
    pub fn reduce(&mut self, frame: &SensorFrame<'_>, out: &mut CameraImage) -> Result<(), ReduceError> {
        frame.validate()?;

        let (width, height, stride) = (frame.width, frame.height, frame.row_stride);
        let radius = box_size(width, height);

        self.scratch.clear();
        self.scratch.extend_from_slice(&frame.bytes[..frame.required_len()]);

        for row in 0..height {
            blur_line(&mut self.scratch, row * stride, 1, width, radius, &mut self.line);
        }
        for col in 0..width {
            blur_line(&mut self.scratch, col, stride, height, radius, &mut self.line);
        }

        let scale = width.min(height) as f32 / CAMERA_SIZE as f32;
        for j in 0..CAMERA_SIZE {
            let src_row = (j as f32 * scale) as usize;
            for i in 0..CAMERA_SIZE {
                let src_col = (i as f32 * scale) as usize;
                out[frame.rotation.dest_index(j, i)] = self.scratch[src_row * stride + src_col];
            }
        }

        Ok(())
    }
}

/// One-shot reduction without a reusable reducer.
pub fn reduce_frame(frame: &SensorFrame<'_>, out: &mut CameraImage) -> Result<(), ReduceError> {
    FrameReducer::new().reduce(frame, out)
}

/// Centered moving average over `len` samples starting at `start`, `step`
/// bytes apart, written back in place.
///
/// Window is `2 * radius + 1` wide; samples that fall outside the line are
/// dropped from the divisor instead of being clamped or wrapped.
fn blur_line(buf: &mut [u8], start: usize, step: usize, len: usize, radius: usize, line: &mut Vec<u8>) {
    line.clear();
    line.extend((0..len).map(|k| buf[start + k * step]));

    let first_end = radius.min(len - 1);
    let mut sum: u32 = line[..=first_end].iter().map(|&v| v as u32).sum();
    let mut count = (first_end + 1) as u32;

    for k in 0..len {
        buf[start + k * step] = (sum / count) as u8;

        let entering = k + radius + 1;
        if entering < len {
            sum += line[entering] as u32;
            count += 1;
        }
        if k >= radius {
            sum -= line[k - radius] as u32;
            count -= 1;
        }
    }
}
