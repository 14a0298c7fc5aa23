//! CancelToken - cooperative worker cancellation
//!
//! An atomic quit flag plus a single-slot wake notification:
//! - `cancel()` sets the flag and posts a wake
//! - the worker checks `is_cancelled()` on every loop iteration
//! - pacing waits use `park_timeout()`, which returns early on a wake
//!
//! The wake slot holds at most one pending notification. Posting twice before
//! the worker parks still wakes it only once; nothing depends on a wake being
//! consumed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
pub struct CancelToken {
    cancelled: AtomicBool,
    /// Pending wake
    wake: Mutex<bool>,
    condvar: Condvar,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the worker to stop and unblock any pacing wait.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.notify();
    }

    /// Post a wake without cancelling.
    pub fn notify(&self) {
        let mut pending = self.wake.lock();
        *pending = true;
        self.condvar.notify_one();
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Wait up to `timeout` for a wake or cancellation.
    ///
    /// Returns `true` if woken or cancelled, `false` on timeout. Consumes the
    /// pending wake.
    pub fn park_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut pending = self.wake.lock();

        while !*pending && !self.is_cancelled() {
            if self.condvar.wait_until(&mut pending, deadline).timed_out() {
                break;
            }
        }

        let woken = *pending || self.is_cancelled();
        *pending = false;
        woken
    }
}
