//! Atomic Cache - lock-free session signals
//!
//! Values the host writes from its UI thread and the render thread consumes
//! without taking the gate:
//! - `AtomicSurfaceSize`: pending surface resize
//! - `AtomicDirtyFlag`: "window must be (re)initialised"
//! - `EdgeTrigger`: change detection for polled engine flags (rumble)

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Pending surface size packed into one `AtomicU64`:
/// - bits 0-31: width (u32)
/// - bits 32-62: height (31 bits)
/// - bit 63: pending
#[derive(Debug, Default)]
pub struct AtomicSurfaceSize {
    packed: AtomicU64,
}

const PENDING_BIT: u64 = 1 << 63;
const HEIGHT_MASK: u64 = 0x7FFF_FFFF;

impl AtomicSurfaceSize {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn pack(width: u32, height: u32) -> u64 {
        let height = (height as u64).min(HEIGHT_MASK);
        width as u64 | (height << 32) | PENDING_BIT
    }

    #[inline]
    fn unpack(packed: u64) -> (u32, u32) {
        let width = (packed & 0xFFFF_FFFF) as u32;
        let height = ((packed >> 32) & HEIGHT_MASK) as u32;
        (width, height)
    }

    /// Record a new size; later calls overwrite earlier unconsumed ones.
    #[inline]
    pub fn request(&self, width: u32, height: u32) {
        self.packed.store(Self::pack(width, height), Ordering::Release);
    }

    /// Take the pending size, if any, clearing the pending bit.
    #[inline]
    pub fn take_pending(&self) -> Option<(u32, u32)> {
        let packed = self.packed.fetch_and(!PENDING_BIT, Ordering::AcqRel);
        (packed & PENDING_BIT != 0).then(|| Self::unpack(packed))
    }

    pub fn clear(&self) {
        self.packed.store(0, Ordering::Release);
    }
}

/// Set/test-and-clear flag.
#[derive(Debug)]
pub struct AtomicDirtyFlag {
    dirty: AtomicBool,
}

impl AtomicDirtyFlag {
    /// Starts dirty.
    pub fn new() -> Self {
        Self {
            dirty: AtomicBool::new(true),
        }
    }

    #[inline]
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Returns the previous state.
    #[inline]
    pub fn check_and_clear(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }
}

impl Default for AtomicDirtyFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Edge-triggered view of a polled boolean.
///
/// `observe` reports whether the value differs from the one seen on the
/// previous call, and remembers the new value.
#[derive(Debug, Default)]
pub struct EdgeTrigger {
    last: AtomicBool,
}

impl EdgeTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn observe(&self, current: bool) -> bool {
        self.last.swap(current, Ordering::AcqRel) != current
    }

    pub fn reset(&self) {
        self.last.store(false, Ordering::Release);
    }
}
