//! RenderGate - serialises access to engine display state
//!
//! One lock, three ways in:
//!
//! | caller      | mode                     | on contention            |
//! |-------------|--------------------------|--------------------------|
//! | render tick | `try_acquire`            | skip the frame           |
//! | teardown    | `acquire_for_teardown`   | wait, then proceed anyway|
//! | ROM check   | `acquire`                | block                    |
//!
//! The gate owns no data; holding a `GateGuard` only means no other path is
//! touching display state.

use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

/// How long teardown waits for an in-flight render tick.
pub const DEFAULT_TEARDOWN_TIMEOUT: Duration = Duration::from_millis(100);

/// Proof of exclusive display access; released on drop.
#[must_use = "the gate is released as soon as the guard is dropped"]
pub struct GateGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

/// Result of the best-effort teardown acquire.
#[must_use]
pub enum TeardownAccess<'a> {
    Acquired(GateGuard<'a>),
    /// The wait expired; the caller proceeds without the gate.
    TimedOut,
}

impl TeardownAccess<'_> {
    pub fn is_acquired(&self) -> bool {
        matches!(self, Self::Acquired(_))
    }
}

#[derive(Debug)]
pub struct RenderGate {
    lock: Mutex<()>,
    teardown_timeout: Duration,
}

impl Default for RenderGate {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderGate {
    pub fn new() -> Self {
        Self::with_teardown_timeout(DEFAULT_TEARDOWN_TIMEOUT)
    }

    pub fn with_teardown_timeout(teardown_timeout: Duration) -> Self {
        Self {
            lock: Mutex::new(()),
            teardown_timeout,
        }
    }

    pub fn teardown_timeout(&self) -> Duration {
        self.teardown_timeout
    }

    /// Render path: never waits.
    #[inline]
    pub fn try_acquire(&self) -> Option<GateGuard<'_>> {
        self.lock.try_lock().map(|guard| GateGuard { _guard: guard })
    }

    /// Teardown path: bounded wait.
    ///
    /// A `TimedOut` result is not an error; teardown continues and frees
    /// resources regardless.
    pub fn acquire_for_teardown(&self) -> TeardownAccess<'_> {
        match self.lock.try_lock_for(self.teardown_timeout) {
            Some(guard) => TeardownAccess::Acquired(GateGuard { _guard: guard }),
            None => TeardownAccess::TimedOut,
        }
    }

    /// Pre-flight path: blocks. Only for short diagnostic calls.
    pub fn acquire(&self) -> GateGuard<'_> {
        GateGuard {
            _guard: self.lock.lock(),
        }
    }

    #[inline]
    pub fn is_held(&self) -> bool {
        self.lock.is_locked()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_try_acquire_fails_while_held() {
        let gate = RenderGate::new();
        let guard = gate.try_acquire();
        assert!(guard.is_some());
        assert!(gate.try_acquire().is_none());
        drop(guard);
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn test_teardown_acquires_uncontended_gate() {
        let gate = RenderGate::new();
        let access = gate.acquire_for_teardown();
        assert!(access.is_acquired());
        assert!(gate.is_held());
        drop(access);
        assert!(!gate.is_held());
    }

    #[test]
    fn test_teardown_gives_up_after_timeout() {
        let gate = RenderGate::with_teardown_timeout(Duration::from_millis(30));
        let _render = gate.acquire();

        let start = Instant::now();
        let access = gate.acquire_for_teardown();
        let waited = start.elapsed();

        assert!(!access.is_acquired());
        assert!(waited >= Duration::from_millis(30));
        assert!(waited < Duration::from_secs(2));
    }

    #[test]
    fn test_teardown_waits_for_short_render() {
        let gate = Arc::new(RenderGate::with_teardown_timeout(Duration::from_secs(5)));
        let render_gate = Arc::clone(&gate);
        let (locked_tx, locked_rx) = mpsc::channel();

        let render = thread::spawn(move || {
            let _guard = render_gate.acquire();
            locked_tx.send(()).unwrap();
            thread::sleep(Duration::from_millis(20));
        });

        locked_rx.recv().unwrap();
        assert!(gate.acquire_for_teardown().is_acquired());
        render.join().unwrap();
    }

    #[test]
    fn test_blocking_acquire_waits_for_holder() {
        let gate = Arc::new(RenderGate::new());
        let guard = gate.acquire();

        let waiter_gate = Arc::clone(&gate);
        let waiter = thread::spawn(move || {
            let _guard = waiter_gate.acquire();
        });

        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.join().unwrap();
    }
}
