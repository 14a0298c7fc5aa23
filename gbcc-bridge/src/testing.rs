//! Scripted engine for tests
//!
//! `MockEngine` keeps plain values behind mutexes and counts every call by
//! method name, so tests can assert on what the session layer drove.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tempfile::NamedTempFile;

use crate::domain::CAMERA_PIXELS;
use crate::engine::{Engine, EngineConfig, EngineError, HostServices, Key, MenuState};
use crate::infra::CancelToken;

/// Frame pacing of the mock worker
const FRAME_TIME: Duration = Duration::from_millis(1);

/// A readable ROM file whose name starts with `name`.
///
/// File names containing "camera" make the mock report a camera cartridge.
pub fn rom_file(name: &str) -> NamedTempFile {
    tempfile::Builder::new()
        .prefix(name)
        .suffix(".gb")
        .tempfile()
        .expect("create temp ROM")
}

#[derive(Default)]
pub struct MockEngine {
    calls: Mutex<HashMap<&'static str, usize>>,
    camera: bool,
    host: HostServices,

    config: Mutex<EngineConfig>,
    menu: Mutex<MenuState>,
    shader: Mutex<String>,
    save_dir: Mutex<String>,
    audio: Mutex<Option<(u32, u32)>>,
    window: Mutex<Option<(u32, u32)>>,
    pressed: Mutex<Vec<Key>>,
    saved: Mutex<Vec<u8>>,
    loaded: Mutex<Vec<u8>>,
    accelerometer: Mutex<(u16, u16)>,
    printer: Mutex<Option<Vec<u8>>>,
    print_job: Mutex<VecDeque<Vec<u8>>>,
    workers: Mutex<Vec<(ThreadId, Option<String>)>>,
    display_delay: Mutex<Duration>,

    focused: AtomicBool,
    freed: AtomicBool,
    print_requested: AtomicBool,
    turbo: AtomicBool,
    rumble: AtomicBool,
}

impl MockEngine {
    fn record(&self, name: &'static str) {
        *self.calls.lock().entry(name).or_insert(0) += 1;
    }

    pub fn calls(&self, name: &str) -> usize {
        self.calls.lock().get(name).copied().unwrap_or(0)
    }

    /// Block until the worker has run `frames` iterations.
    pub fn wait_for_frames(&self, frames: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.calls("run_frame") < frames {
            assert!(Instant::now() < deadline, "worker never ran {} frames", frames);
            thread::sleep(FRAME_TIME);
        }
    }

    /// Names of the distinct threads that ran frames.
    pub fn worker_threads(&self) -> Vec<Option<String>> {
        self.workers.lock().iter().map(|(_, name)| name.clone()).collect()
    }

    pub fn set_display_delay(&self, delay: Duration) {
        *self.display_delay.lock() = delay;
    }

    pub fn set_rumble(&self, active: bool) {
        self.rumble.store(active, Ordering::SeqCst);
    }

    pub fn queue_printer_strip(&self, strip: Vec<u8>) {
        *self.printer.lock() = Some(strip);
    }

    /// Connect the printer and start a job printing `strips` in order.
    pub fn queue_print_job(&self, strips: Vec<Vec<u8>>) {
        self.printer.lock().get_or_insert_with(Vec::new);
        self.print_job.lock().extend(strips);
        self.print_requested.store(true, Ordering::SeqCst);
    }

    pub fn audio_format(&self) -> Option<(u32, u32)> {
        *self.audio.lock()
    }

    pub fn save_directory(&self) -> String {
        self.save_dir.lock().clone()
    }

    pub fn window_size(&self) -> Option<(u32, u32)> {
        *self.window.lock()
    }

    pub fn saved_slots(&self) -> Vec<u8> {
        self.saved.lock().clone()
    }

    pub fn loaded_slots(&self) -> Vec<u8> {
        self.loaded.lock().clone()
    }

    pub fn accelerometer(&self) -> (u16, u16) {
        *self.accelerometer.lock()
    }

    pub fn focused(&self) -> bool {
        self.focused.load(Ordering::SeqCst)
    }
}

impl Engine for MockEngine {
    fn initialize(rom: &Path, host: HostServices) -> Result<Self, EngineError> {
        Self::validate_rom(rom)?;
        let camera = rom
            .file_name()
            .map(|name| name.to_string_lossy().contains("camera"))
            .unwrap_or(false);
        Ok(Self {
            camera,
            host,
            ..Self::default()
        })
    }

    fn validate_rom(rom: &Path) -> Result<(), EngineError> {
        if rom.is_file() {
            Ok(())
        } else {
            Err(EngineError::new(format!("Could not open {}", rom.display())))
        }
    }

    fn free(&self) {
        self.record("free");
        self.freed.store(true, Ordering::SeqCst);
    }

    fn run_frame(&self, cancel: &CancelToken) {
        self.record("run_frame");
        {
            let current = thread::current();
            let mut workers = self.workers.lock();
            if !workers.iter().any(|(id, _)| *id == current.id()) {
                workers.push((current.id(), current.name().map(str::to_string)));
            }
        }
        if self.camera {
            let mut image = [0u8; CAMERA_PIXELS];
            if self.host.camera.capture(&mut image).is_ok() {
                self.record("camera_capture");
            }
        }
        cancel.park_timeout(FRAME_TIME);
    }

    fn set_save_directory(&self, dir: &str) {
        *self.save_dir.lock() = dir.to_string();
    }

    fn set_focus(&self, focused: bool) {
        self.focused.store(focused, Ordering::SeqCst);
    }

    fn audio_init(&self, sample_rate: u32, samples_per_buffer: u32) {
        *self.audio.lock() = Some((sample_rate, samples_per_buffer));
    }

    fn audio_destroy(&self) {
        self.record("audio_destroy");
        *self.audio.lock() = None;
    }

    fn process_key(&self, key: Key, pressed: bool) {
        self.record("process_key");
        let mut keys = self.pressed.lock();
        keys.retain(|&held| held != key);
        if pressed {
            keys.push(key);
        }
    }

    fn is_pressed(&self, key: Key) -> bool {
        self.pressed.lock().contains(&key)
    }

    fn toggle_turbo(&self) -> bool {
        !self.turbo.fetch_xor(true, Ordering::SeqCst)
    }

    fn toggle_menu(&self) {
        let mut menu = self.menu.lock();
        menu.initialised = true;
        menu.visible = !menu.visible;
    }

    fn request_save_slot(&self, slot: u8) {
        self.saved.lock().push(slot);
    }

    fn request_load_slot(&self, slot: u8) {
        self.loaded.lock().push(slot);
    }

    fn apply_state_requests(&self) {
        self.record("apply_state_requests");
    }

    fn config(&self) -> EngineConfig {
        *self.config.lock()
    }

    fn set_config(&self, config: EngineConfig) {
        self.record("set_config");
        *self.config.lock() = config;
    }

    fn menu(&self) -> MenuState {
        *self.menu.lock()
    }

    fn set_menu(&self, menu: MenuState) {
        self.record("set_menu");
        *self.menu.lock() = menu;
    }

    fn shader_name(&self) -> String {
        self.shader.lock().clone()
    }

    fn select_shader(&self, name: &str) {
        *self.shader.lock() = name.to_string();
    }

    fn load_config(&self, path: &Path) -> Result<(), EngineError> {
        self.record("load_config");
        if path.is_file() {
            Ok(())
        } else {
            Err(EngineError::new(format!("no config at {}", path.display())))
        }
    }

    fn reset_cheats(&self) {
        self.record("reset_cheats");
    }

    fn init_window(&self) {
        self.record("init_window");
        if self.freed.load(Ordering::SeqCst) {
            self.record("display_after_free");
        }
    }

    fn destroy_window(&self) {
        self.record("destroy_window");
    }

    fn resize_window(&self, width: u32, height: u32) {
        *self.window.lock() = Some((width, height));
    }

    fn display_update(&self) {
        self.record("display_update");
        if self.freed.load(Ordering::SeqCst) {
            self.record("display_after_free");
        }
        let delay = *self.display_delay.lock();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }

    fn has_rumble(&self) -> bool {
        true
    }

    fn rumble_active(&self) -> bool {
        self.rumble.load(Ordering::SeqCst)
    }

    fn has_accelerometer(&self) -> bool {
        true
    }

    fn set_accelerometer(&self, x: u16, y: u16) {
        *self.accelerometer.lock() = (x, y);
    }

    fn is_camera(&self) -> bool {
        self.camera
    }

    fn turbo_engaged(&self) -> bool {
        self.turbo.load(Ordering::SeqCst)
    }

    fn error_occurred(&self) -> bool {
        false
    }

    fn flush_logs(&self) {
        self.record("flush_logs");
    }

    fn printer_connected(&self) -> bool {
        self.printer.lock().is_some()
    }

    fn should_start_printing(&self) -> bool {
        self.print_requested.swap(false, Ordering::SeqCst)
    }

    fn is_printing(&self) -> bool {
        let pending = self
            .printer
            .lock()
            .as_ref()
            .map(|strip| !strip.is_empty())
            .unwrap_or(false);
        pending || !self.print_job.lock().is_empty()
    }

    fn update_printer(&self) -> bool {
        let mut job = self.print_job.lock();
        if let Some(strip) = job.pop_front() {
            self.printer.lock().get_or_insert_with(Vec::new).extend(strip);
        }
        job.is_empty()
    }

    fn take_printer_strip(&self) -> Vec<u8> {
        self.printer.lock().as_mut().map(std::mem::take).unwrap_or_default()
    }

    fn reset_printer(&self) {
        self.record("reset_printer");
    }
}
