//! SessionController - session lifecycle and cross-thread access
//!
//! Responsibilities:
//! - start/stop the engine and its worker thread (at most one session)
//! - render ticks that never block: skip the frame when the gate is busy
//! - keep the `OptionsSnapshot` across surface teardown
//! - route host input, peripheral data and queries to the live engine
//!
//! Threads:
//!
//! ```text
//! control thread ── start / stop / input / queries ──┐
//!                                                    ├─► Arc<E> ◄── worker (run_frame loop)
//! render thread  ── render_tick (try gate) ──────────┘
//! ```
//!
//! The session slot is only held long enough to clone the engine `Arc`;
//! engine calls happen outside it. The render path reaches the slot with
//! `try_lock` only.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::config::{GateConfig, StartOptions};
use super::error::SessionError;
use super::session::{SaveDir, Session};
use crate::domain::{accelerometer_axes, OptionsSnapshot, SensorFrame, SNAPSHOT_LEN};
use crate::engine::{Engine, HostServices, Key, AUTO_SAVE_SLOT, USER_SLOTS};
use crate::infra::{AtomicDirtyFlag, AtomicSurfaceSize, EdgeTrigger, RenderGate};
use crate::{bridge_log_debug, bridge_log_error, bridge_log_info, bridge_log_warn};

/// What a render tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No engine
    Idle,
    /// Gate busy, frame dropped
    Skipped,
    Rendered,
}

pub struct SessionController<E: Engine> {
    session: Mutex<Option<Session<E>>>,
    gate: RenderGate,
    /// True from a successful start until stop takes the session out
    live: AtomicBool,
    has_focus: AtomicBool,
    /// Window must be (re)initialised before the next display update
    window_stale: AtomicDirtyFlag,
    surface_size: AtomicSurfaceSize,
    rumble: EdgeTrigger,
    snapshot: Mutex<OptionsSnapshot>,
    last_error: Mutex<Option<String>>,
    host: HostServices,
}

impl<E: Engine> Default for SessionController<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Engine> SessionController<E> {
    pub fn new() -> Self {
        Self::with_gate_config(GateConfig::default())
    }

    pub fn with_gate_config(config: GateConfig) -> Self {
        Self {
            session: Mutex::new(None),
            gate: RenderGate::with_teardown_timeout(config.teardown_timeout),
            live: AtomicBool::new(false),
            has_focus: AtomicBool::new(false),
            window_stale: AtomicDirtyFlag::new(),
            surface_size: AtomicSurfaceSize::new(),
            rumble: EdgeTrigger::new(),
            snapshot: Mutex::new(OptionsSnapshot::default()),
            last_error: Mutex::new(None),
            host: HostServices::default(),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Initialise the engine for `options.rom` and start the worker.
    ///
    /// On failure nothing is left behind: no worker, no engine, and the
    /// message is available from `last_error()`.
    pub fn start(&self, options: StartOptions) -> Result<(), SessionError> {
        if self.session.lock().is_some() {
            return Err(SessionError::AlreadyActive);
        }

        let engine = match E::initialize(&options.rom, self.host.clone()) {
            Ok(engine) => Arc::new(engine),
            Err(err) => {
                bridge_log_error!("[Session] failed to load {}: {}", options.rom.display(), err);
                return Err(self.record(err.into()));
            }
        };

        let save_dir = SaveDir::new(&options.save_dir);
        engine.set_save_directory(save_dir.as_str());
        engine.audio_init(options.audio.sample_rate, options.audio.samples_per_buffer);

        let prefs = &options.preferences;
        engine.set_config(prefs.engine_config());
        engine.select_shader(&prefs.shader);

        if let Some(path) = &options.config_file {
            if let Err(err) = engine.load_config(path) {
                bridge_log_warn!("[Session] config {} not loaded: {}", path.display(), err);
            }
        }
        if let Some(path) = &options.cheat_file {
            engine.reset_cheats();
            if let Err(err) = engine.load_config(path) {
                bridge_log_warn!("[Session] cheats {} not loaded: {}", path.display(), err);
            }
        }

        if prefs.auto_resume {
            engine.request_load_slot(AUTO_SAVE_SLOT);
            engine.apply_state_requests();
        }

        // a snapshot from before the surface was torn down wins over prefs
        self.snapshot.lock().apply(&*engine);

        if engine.is_camera() {
            self.host.camera.activate();
        }

        engine.set_focus(true);
        self.has_focus.store(true, Ordering::Release);
        self.rumble.reset();
        self.window_stale.mark_dirty();

        let rom = options.rom.clone();
        let session = match Session::spawn(Arc::clone(&engine), options.rom, save_dir) {
            Ok(session) => session,
            Err(err) => {
                engine.free();
                engine.audio_destroy();
                bridge_log_error!("[Session] worker spawn failed: {}", err);
                return Err(self.record(SessionError::Spawn(err)));
            }
        };

        {
            let mut slot = self.session.lock();
            *slot = Some(session);
            self.live.store(true, Ordering::Release);
        }
        *self.last_error.lock() = None;

        bridge_log_info!("[Session] started {}", rom.display());
        Ok(())
    }

    /// Stop the worker and release the engine. No-op without a session.
    pub fn stop(&self) {
        let session = {
            let mut slot = self.session.lock();
            self.live.store(false, Ordering::Release);
            slot.take()
        };

        let Some(session) = session else {
            bridge_log_debug!("[Session] stop without an active session");
            return;
        };

        session.shutdown(&self.gate);

        self.snapshot.lock().clear();
        self.host.camera.deactivate();
        self.rumble.reset();
        self.surface_size.clear();
        self.has_focus.store(false, Ordering::Release);
    }

    /// Pre-flight check that `rom` would load, serialised against rendering.
    pub fn check_rom(&self, rom: &Path) -> Result<(), SessionError> {
        let _gate = self.gate.acquire();
        E::validate_rom(rom).map_err(|err| self.record(err.into()))
    }

    pub fn is_running(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Live engine, if any.
    pub fn engine(&self) -> Option<Arc<E>> {
        self.session.lock().as_ref().map(|session| Arc::clone(session.engine()))
    }

    pub fn save_dir(&self) -> Option<String> {
        self.session
            .lock()
            .as_ref()
            .map(|session| session.save_dir().as_str().to_string())
    }

    pub fn host_services(&self) -> &HostServices {
        &self.host
    }

    // ========================================================================
    // Render path
    // ========================================================================

    /// One host frame. Never blocks.
    ///
    /// The engine is looked up only while the gate is held, so a tick can
    /// never pick up an engine that `stop()` has already released.
    pub fn render_tick(&self) -> TickOutcome {
        let Some(_gate) = self.gate.try_acquire() else {
            return TickOutcome::Skipped;
        };

        let engine = match self.session.try_lock() {
            Some(slot) => match slot.as_ref() {
                Some(session) => Arc::clone(session.engine()),
                None => return TickOutcome::Idle,
            },
            None => return TickOutcome::Skipped,
        };

        if self.window_stale.check_and_clear() {
            let Some(snapshot) = self.snapshot.try_lock() else {
                self.window_stale.mark_dirty();
                return TickOutcome::Skipped;
            };
            engine.init_window();
            snapshot.apply_display(&*engine);
        }
        if let Some((width, height)) = self.surface_size.take_pending() {
            engine.resize_window(width, height);
        }

        engine.display_update();
        TickOutcome::Rendered
    }

    pub fn resize_surface(&self, width: u32, height: u32) {
        self.surface_size.request(width, height);
    }

    /// The host destroyed its surface; the engine keeps running.
    ///
    /// The next render tick rebuilds the window state.
    pub fn destroy_surface(&self) {
        self.window_stale.mark_dirty();
        if let Some(engine) = self.engine() {
            let _gate = self.gate.acquire();
            engine.destroy_window();
        }
    }

    // ========================================================================
    // Options snapshot
    // ========================================================================

    /// Capture the live options; returns the stored snapshot either way.
    pub fn suspend(&self) -> OptionsSnapshot {
        let captured = self.engine().map(|engine| OptionsSnapshot::capture(&*engine));
        let mut snapshot = self.snapshot.lock();
        if let Some(captured) = captured {
            *snapshot = captured;
        }
        *snapshot
    }

    /// Store `snapshot` for the next start or window init.
    pub fn resume(&self, snapshot: OptionsSnapshot) {
        *self.snapshot.lock() = snapshot;
    }

    pub fn options_bytes(&self) -> [u8; SNAPSHOT_LEN] {
        self.suspend().encode()
    }

    /// Decode and store. A malformed block leaves the stored snapshot as is.
    pub fn set_options_bytes(&self, bytes: &[u8]) -> Result<(), SessionError> {
        match OptionsSnapshot::decode(bytes) {
            Ok(snapshot) => {
                self.resume(snapshot);
                Ok(())
            }
            Err(err) => {
                bridge_log_warn!("[Session] options snapshot rejected: {}", err);
                Err(self.record(err.into()))
            }
        }
    }

    // ========================================================================
    // Input
    // ========================================================================

    /// Unknown codes are ignored.
    pub fn press(&self, code: i32, pressed: bool) {
        if let Some(key) = Key::from_code(code) {
            self.with_engine(|engine| engine.process_key(key, pressed));
        }
    }

    pub fn is_pressed(&self, code: i32) -> bool {
        Key::from_code(code)
            .and_then(|key| self.with_engine(|engine| engine.is_pressed(key)))
            .unwrap_or(false)
    }

    pub fn toggle_menu(&self) {
        self.with_engine(|engine| engine.toggle_menu());
    }

    /// Returns the new turbo state; `false` without a session.
    pub fn toggle_turbo(&self) -> bool {
        self.with_engine(|engine| engine.toggle_turbo()).unwrap_or(false)
    }

    pub fn save_state(&self, slot: u8) -> Result<(), SessionError> {
        let slot = Self::user_slot(slot)?;
        self.with_engine(|engine| engine.request_save_slot(slot))
            .ok_or(SessionError::NotActive)
    }

    pub fn load_state(&self, slot: u8) -> Result<(), SessionError> {
        let slot = Self::user_slot(slot)?;
        self.with_engine(|engine| engine.request_load_slot(slot))
            .ok_or(SessionError::NotActive)
    }

    pub fn set_focus(&self, focused: bool) {
        self.has_focus.store(focused, Ordering::Release);
        self.with_engine(|engine| engine.set_focus(focused));
    }

    pub fn has_focus(&self) -> bool {
        self.has_focus.load(Ordering::Acquire)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Edge-triggered: true when rumble turned on or off since the last call.
    pub fn check_rumble_changed(&self) -> bool {
        self.with_engine(|engine| self.rumble.observe(engine.rumble_active()))
            .unwrap_or(false)
    }

    pub fn check_turbo_engaged(&self) -> bool {
        self.with_engine(|engine| engine.turbo_engaged()).unwrap_or(false)
    }

    pub fn check_error_flag(&self) -> bool {
        self.with_engine(|engine| engine.error_occurred()).unwrap_or(false)
    }

    pub fn has_rumble(&self) -> bool {
        self.with_engine(|engine| engine.has_rumble()).unwrap_or(false)
    }

    pub fn has_accelerometer(&self) -> bool {
        self.with_engine(|engine| engine.has_accelerometer()).unwrap_or(false)
    }

    pub fn is_camera(&self) -> bool {
        self.with_engine(|engine| engine.is_camera()).unwrap_or(false)
    }

    pub fn flush_logs(&self) {
        self.with_engine(|engine| engine.flush_logs());
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    // ========================================================================
    // Peripherals
    // ========================================================================

    /// Device acceleration in m/s².
    pub fn update_accelerometer(&self, x: f32, y: f32) {
        let (x, y) = accelerometer_axes(x, y);
        self.with_engine(|engine| engine.set_accelerometer(x, y));
    }

    pub fn update_camera_frame(&self, frame: &SensorFrame<'_>) -> Result<(), SessionError> {
        self.host.camera.update_frame(frame).map_err(|err| self.record(err.into()))
    }

    pub fn set_camera_image(&self, bytes: &[u8]) -> Result<(), SessionError> {
        self.host.camera.set_fallback_image(bytes).map_err(|err| self.record(err.into()))
    }

    pub fn provide_font_atlas(&self, width: u32, height: u32, pixels: &[u8]) -> Result<(), SessionError> {
        self.host
            .font_atlas
            .provide(width, height, pixels)
            .map_err(|err| self.record(err.into()))
    }

    pub fn destroy_font_atlas(&self) -> bool {
        self.host.font_atlas.destroy()
    }

    pub fn printer_connected(&self) -> bool {
        self.with_engine(|engine| engine.printer_connected()).unwrap_or(false)
    }

    /// True once per print job, when the game starts printing.
    pub fn should_start_printing(&self) -> bool {
        self.with_engine(|engine| engine.should_start_printing()).unwrap_or(false)
    }

    pub fn is_printing(&self) -> bool {
        self.with_engine(|engine| engine.is_printing()).unwrap_or(false)
    }

    /// Advance the print job by one strip; true when it has finished (or
    /// there is no session to print from).
    pub fn update_printer(&self) -> bool {
        self.with_engine(|engine| engine.update_printer()).unwrap_or(true)
    }

    /// Printed image rows since the last call.
    pub fn take_printer_strip(&self) -> Vec<u8> {
        self.with_engine(|engine| engine.take_printer_strip()).unwrap_or_default()
    }

    pub fn reset_printer(&self) {
        self.with_engine(|engine| engine.reset_printer());
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn with_engine<R>(&self, f: impl FnOnce(&E) -> R) -> Option<R> {
        let engine = self.engine()?;
        Some(f(&engine))
    }

    fn user_slot(slot: u8) -> Result<u8, SessionError> {
        if USER_SLOTS.contains(&slot) {
            Ok(slot)
        } else {
            Err(SessionError::InvalidSlot(slot))
        }
    }

    /// Remember `err` as the message for `last_error()` and hand it back.
    pub(crate) fn record(&self, err: SessionError) -> SessionError {
        *self.last_error.lock() = Some(err.to_string());
        err
    }
}

impl<E: Engine> Drop for SessionController<E> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::config::Preferences;
    use crate::domain::{Rotation, CAMERA_PIXELS};
    use crate::engine::{MenuSelection, MenuState};
    use crate::testing::{rom_file, MockEngine};
    use std::path::PathBuf;
    use std::time::Duration;

    fn options(rom: &Path) -> StartOptions {
        StartOptions::new(rom, "/tmp/saves")
    }

    #[test]
    fn test_restart_after_stop() {
        let rom = rom_file("tetris");
        let controller = SessionController::<MockEngine>::new();

        controller.start(options(rom.path())).unwrap();
        assert!(controller.is_running());
        assert!(controller.has_focus());
        let first = controller.engine().unwrap();
        first.wait_for_frames(3);
        assert_eq!(first.worker_threads(), vec![Some("gbcc-emulation".to_string())]);

        controller.stop();
        assert!(!controller.is_running());
        assert!(controller.engine().is_none());
        assert_eq!(first.calls("free"), 1);
        assert_eq!(first.calls("audio_destroy"), 1);

        controller.start(options(rom.path())).unwrap();
        let second = controller.engine().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        second.wait_for_frames(1);
        controller.stop();
        assert_eq!(second.calls("free"), 1);
    }

    #[test]
    fn test_start_failure_leaves_nothing_behind() {
        let controller = SessionController::<MockEngine>::new();
        let err = controller.start(options(Path::new("/nonexistent.rom"))).unwrap_err();

        assert!(matches!(err, SessionError::Initialization(_)));
        assert!(!controller.is_running());
        assert!(controller.engine().is_none());
        let message = controller.last_error().unwrap();
        assert!(!message.is_empty());
        assert!(message.contains("/nonexistent.rom"));
    }

    #[test]
    fn test_double_start_rejected() {
        let rom = rom_file("zelda");
        let controller = SessionController::<MockEngine>::new();
        controller.start(options(rom.path())).unwrap();
        let engine = controller.engine().unwrap();

        assert!(matches!(
            controller.start(options(rom.path())),
            Err(SessionError::AlreadyActive)
        ));
        assert!(Arc::ptr_eq(&engine, &controller.engine().unwrap()));

        controller.stop();
    }

    #[test]
    fn test_stop_is_idempotent() {
        let controller = SessionController::<MockEngine>::new();
        controller.stop();

        let rom = rom_file("kirby");
        controller.start(options(rom.path())).unwrap();
        let engine = controller.engine().unwrap();
        controller.stop();
        controller.stop();
        assert_eq!(engine.calls("free"), 1);
    }

    #[test]
    fn test_start_applies_preferences_and_files() {
        let rom = rom_file("pokemon");
        let config = rom_file("config");
        let cheats = rom_file("cheats");
        let controller = SessionController::<MockEngine>::new();

        let mut opts = options(rom.path());
        opts.audio.sample_rate = 48_000;
        opts.config_file = Some(config.path().to_path_buf());
        opts.cheat_file = Some(cheats.path().to_path_buf());
        opts.preferences = Preferences {
            turbo_speed: 3.0,
            palette: 4,
            shader: "LCD".to_string(),
            auto_resume: true,
            ..Preferences::default()
        };
        controller.start(opts).unwrap();

        let engine = controller.engine().unwrap();
        assert_eq!(engine.audio_format(), Some((48_000, 512)));
        assert_eq!(engine.save_directory(), "/tmp/saves");
        assert_eq!(engine.config().turbo_speed, 3.0);
        assert_eq!(engine.config().palette, 4);
        assert_eq!(engine.shader_name(), "LCD");
        assert_eq!(engine.calls("reset_cheats"), 1);
        assert_eq!(engine.calls("load_config"), 2);
        assert_eq!(engine.loaded_slots(), vec![AUTO_SAVE_SLOT]);
        assert_eq!(controller.save_dir().as_deref(), Some("/tmp/saves"));

        controller.stop();
    }

    #[test]
    fn test_missing_config_file_does_not_fail_start() {
        let rom = rom_file("mario");
        let controller = SessionController::<MockEngine>::new();
        let mut opts = options(rom.path());
        opts.config_file = Some(PathBuf::from("/nonexistent.cfg"));
        controller.start(opts).unwrap();
        assert!(controller.is_running());
        controller.stop();
    }

    #[test]
    fn test_snapshot_survives_surface_cycle() {
        let rom = rom_file("metroid");
        let controller = SessionController::<MockEngine>::new();
        controller.start(options(rom.path())).unwrap();

        let engine = controller.engine().unwrap();
        let mut config = engine.config();
        config.palette = 9;
        config.vsync = true;
        engine.set_config(config);
        engine.set_menu(MenuState {
            initialised: true,
            visible: true,
            pending_save: None,
            pending_load: Some(2),
            selection: MenuSelection::Palette,
        });
        engine.select_shader("Dot matrix");

        let bytes = controller.options_bytes();
        controller.stop();
        assert_eq!(controller.suspend(), OptionsSnapshot::default());

        controller.set_options_bytes(&bytes).unwrap();
        let mut opts = options(rom.path());
        opts.preferences.palette = 1;
        controller.start(opts).unwrap();

        let restored = controller.engine().unwrap();
        assert_eq!(restored.config(), config);
        assert_eq!(restored.menu().selection, MenuSelection::Palette);
        assert_eq!(restored.shader_name(), "Dot matrix");
        controller.stop();
    }

    #[test]
    fn test_malformed_snapshot_keeps_stored_one() {
        let controller = SessionController::<MockEngine>::new();
        let mut snapshot = OptionsSnapshot::default();
        snapshot.initialised = true;
        snapshot.config.palette = 3;
        controller.resume(snapshot);

        assert!(controller.set_options_bytes(&[1, 2, 3]).is_err());
        assert_eq!(controller.suspend(), snapshot);
        assert!(controller.last_error().is_some());
    }

    #[test]
    fn test_render_tick_lifecycle() {
        let rom = rom_file("tetris");
        let controller = SessionController::<MockEngine>::new();
        assert_eq!(controller.render_tick(), TickOutcome::Idle);

        controller.start(options(rom.path())).unwrap();
        let engine = controller.engine().unwrap();

        controller.resize_surface(1080, 720);
        assert_eq!(controller.render_tick(), TickOutcome::Rendered);
        assert_eq!(controller.render_tick(), TickOutcome::Rendered);
        assert_eq!(engine.calls("init_window"), 1);
        assert_eq!(engine.calls("display_update"), 2);
        assert_eq!(engine.window_size(), Some((1080, 720)));

        controller.destroy_surface();
        assert_eq!(engine.calls("destroy_window"), 1);
        assert_eq!(controller.render_tick(), TickOutcome::Rendered);
        assert_eq!(engine.calls("init_window"), 2);

        controller.stop();
        assert_eq!(controller.render_tick(), TickOutcome::Idle);
    }

    #[test]
    fn test_render_tick_skips_while_gate_held() {
        let rom = rom_file("tetris");
        let controller = SessionController::<MockEngine>::new();
        controller.start(options(rom.path())).unwrap();
        let engine = controller.engine().unwrap();

        let guard = controller.gate.acquire();
        assert_eq!(controller.render_tick(), TickOutcome::Skipped);
        assert_eq!(engine.calls("display_update"), 0);
        drop(guard);

        assert_eq!(controller.render_tick(), TickOutcome::Rendered);
        controller.stop();
    }

    #[test]
    fn test_tick_in_flight_across_restart_stays_on_its_engine() {
        let rom = rom_file("tetris");
        let controller = SessionController::<MockEngine>::with_gate_config(GateConfig {
            teardown_timeout: Duration::from_secs(2),
        });
        controller.start(options(rom.path())).unwrap();
        let first = controller.engine().unwrap();
        assert_eq!(controller.render_tick(), TickOutcome::Rendered);
        first.set_display_delay(Duration::from_millis(150));

        std::thread::scope(|scope| {
            let tick = scope.spawn(|| controller.render_tick());
            while first.calls("display_update") < 2 {
                std::thread::yield_now();
            }

            // waits for the tick to leave the gate before releasing the engine
            controller.stop();
            assert_eq!(first.calls("free"), 1);
            assert_eq!(tick.join().unwrap(), TickOutcome::Rendered);
        });

        controller.start(options(rom.path())).unwrap();
        let second = controller.engine().unwrap();
        assert_eq!(controller.render_tick(), TickOutcome::Rendered);

        assert_eq!(second.calls("init_window"), 1);
        assert_eq!(second.calls("display_update"), 1);
        assert_eq!(first.calls("display_update"), 2);
        assert_eq!(first.calls("display_after_free"), 0);
        controller.stop();
    }

    #[test]
    fn test_render_tick_skips_while_snapshot_busy() {
        let rom = rom_file("tetris");
        let controller = SessionController::<MockEngine>::new();
        controller.start(options(rom.path())).unwrap();
        let engine = controller.engine().unwrap();

        let busy = controller.snapshot.lock();
        assert_eq!(controller.render_tick(), TickOutcome::Skipped);
        assert_eq!(engine.calls("init_window"), 0);
        assert_eq!(engine.calls("display_update"), 0);
        drop(busy);

        assert_eq!(controller.render_tick(), TickOutcome::Rendered);
        assert_eq!(engine.calls("init_window"), 1);
        controller.stop();
    }

    #[test]
    fn test_stop_proceeds_when_gate_is_stuck() {
        let rom = rom_file("tetris");
        let controller = SessionController::<MockEngine>::with_gate_config(GateConfig {
            teardown_timeout: Duration::from_millis(20),
        });
        controller.start(options(rom.path())).unwrap();
        let engine = controller.engine().unwrap();

        let _stuck = controller.gate.acquire();
        controller.stop();
        assert_eq!(engine.calls("free"), 1);
        assert!(!controller.is_running());
    }

    #[test]
    fn test_keys_and_slots() {
        let rom = rom_file("tetris");
        let controller = SessionController::<MockEngine>::new();
        assert!(matches!(controller.save_state(1), Err(SessionError::NotActive)));

        controller.start(options(rom.path())).unwrap();
        let engine = controller.engine().unwrap();

        controller.press(Key::A.code(), true);
        assert!(controller.is_pressed(Key::A.code()));
        controller.press(Key::A.code(), false);
        assert!(!controller.is_pressed(Key::A.code()));
        controller.press(-1, true);
        controller.press(99, true);
        assert!(!controller.is_pressed(99));
        assert_eq!(engine.calls("process_key"), 2);

        assert!(controller.toggle_turbo());
        assert!(controller.check_turbo_engaged());
        assert!(!controller.toggle_turbo());

        controller.save_state(3).unwrap();
        controller.load_state(9).unwrap();
        assert!(matches!(controller.save_state(0), Err(SessionError::InvalidSlot(0))));
        assert!(matches!(controller.load_state(AUTO_SAVE_SLOT), Err(SessionError::InvalidSlot(10))));
        assert_eq!(engine.saved_slots(), vec![3]);
        assert_eq!(engine.loaded_slots(), vec![9]);

        controller.stop();
    }

    #[test]
    fn test_rumble_is_edge_triggered() {
        let rom = rom_file("rumble");
        let controller = SessionController::<MockEngine>::new();
        assert!(!controller.check_rumble_changed());
        controller.start(options(rom.path())).unwrap();
        let engine = controller.engine().unwrap();

        assert!(!controller.check_rumble_changed());
        engine.set_rumble(true);
        assert!(controller.check_rumble_changed());
        assert!(!controller.check_rumble_changed());
        engine.set_rumble(false);
        assert!(controller.check_rumble_changed());

        controller.stop();
    }

    #[test]
    fn test_camera_cartridge_activates_feed() {
        let rom = rom_file("camera");
        let controller = SessionController::<MockEngine>::new();
        let bytes = vec![0u8; 64 * 64];
        let frame = SensorFrame {
            bytes: &bytes,
            width: 64,
            height: 64,
            row_stride: 64,
            rotation: Rotation::Deg0,
        };
        assert!(controller.update_camera_frame(&frame).is_err());

        controller.start(options(rom.path())).unwrap();
        assert!(controller.is_camera());
        assert!(controller.host_services().camera.is_active());
        let engine = controller.engine().unwrap();
        engine.wait_for_frames(2);
        assert!(engine.calls("camera_capture") >= 1);
        controller.update_camera_frame(&frame).unwrap();

        let mut out = [0xFFu8; CAMERA_PIXELS];
        controller.host_services().camera.capture(&mut out).unwrap();
        assert!(out.iter().all(|&v| v == 0));
        controller.stop();

        assert!(!controller.host_services().camera.is_active());
        assert!(matches!(
            controller.update_camera_frame(&frame),
            Err(SessionError::Peripheral(_))
        ));
    }

    #[test]
    fn test_peripheral_pass_through() {
        let rom = rom_file("tilt");
        let controller = SessionController::<MockEngine>::new();
        controller.start(options(rom.path())).unwrap();
        let engine = controller.engine().unwrap();

        controller.update_accelerometer(0.0, 0.0);
        assert_eq!(engine.accelerometer(), (0x81D0, 0x81D0));

        controller.set_focus(false);
        assert!(!controller.has_focus());
        assert!(!engine.focused());

        engine.queue_printer_strip(vec![1, 2, 3]);
        assert!(controller.printer_connected());
        assert_eq!(controller.take_printer_strip(), vec![1, 2, 3]);
        assert!(controller.take_printer_strip().is_empty());
        controller.reset_printer();
        assert_eq!(engine.calls("reset_printer"), 1);

        assert!(controller.provide_font_atlas(3, 3, &[0; 36]).is_err());
        controller.provide_font_atlas(16, 16, &[0; 16 * 16 * 4]).unwrap();
        assert!(controller.destroy_font_atlas());

        controller.stop();
    }

    #[test]
    fn test_print_job_driven_by_host() {
        let rom = rom_file("printer");
        let controller = SessionController::<MockEngine>::new();
        assert!(!controller.should_start_printing());
        assert!(controller.update_printer());

        controller.start(options(rom.path())).unwrap();
        let engine = controller.engine().unwrap();
        assert!(!controller.should_start_printing());

        engine.queue_print_job(vec![vec![1, 2], vec![3, 4]]);
        assert!(controller.should_start_printing());
        assert!(!controller.should_start_printing());
        assert!(controller.is_printing());

        let mut paper = Vec::new();
        let mut finished = controller.update_printer();
        paper.extend(controller.take_printer_strip());
        while !finished {
            finished = controller.update_printer();
            paper.extend(controller.take_printer_strip());
        }
        assert_eq!(paper, vec![1, 2, 3, 4]);
        assert!(!controller.is_printing());

        controller.stop();
    }

    #[test]
    fn test_check_rom() {
        let rom = rom_file("tetris");
        let controller = SessionController::<MockEngine>::new();
        assert!(controller.check_rom(rom.path()).is_ok());
        assert!(controller.check_rom(Path::new("/nonexistent.rom")).is_err());
        assert!(controller.last_error().is_some());
        assert!(!controller.gate.is_held());
    }
}
