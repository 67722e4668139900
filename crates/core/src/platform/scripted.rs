use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use image::{imageops, Rgba, RgbaImage};

use crate::error::{AutomationError, Result};
use crate::types::*;
use super::Platform;

/// One recorded platform call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Attach,
    Activate(WindowId),
    Restore(WindowId),
    Capture(Option<WindowGeometry>),
    MovePointer(i32, i32),
    Click,
    Tap(Key),
    Chord(Shortcut),
    Clipboard(String),
    Kill(Vec<String>),
    Launch(PathBuf),
}

/// Mutable script behind a [`ScriptedPlatform`].
pub struct Script {
    pub windows: Vec<WindowInfo>,
    /// Outcome of successive `attach` calls; `attach_default` once drained.
    pub attach_plan: VecDeque<bool>,
    pub attach_default: bool,
    pub active_title: Option<String>,
    pub screen: RgbaImage,
    pub fail_input: bool,
    pub fail_launch: bool,
    /// Number of window enumerations so far.
    pub window_queries: usize,
    pub calls: Vec<Call>,
}

/// Deterministic platform for tests: windows, attach outcomes and the screen
/// are scripted up front, and every call is recorded. Clones share the
/// script, so a test can keep one handle after boxing the other.
#[derive(Clone)]
pub struct ScriptedPlatform {
    script: Arc<Mutex<Script>>,
}

impl ScriptedPlatform {
    /// A single visible 800x600 window at (100, 50) titled `title`, attachable,
    /// over a flat 1280x800 screen.
    pub fn with_window(title: &str) -> Self {
        let window = WindowInfo {
            id: 7,
            title: title.to_string(),
            geometry: WindowGeometry::new(100, 50, 800, 600),
            minimized: false,
            pid: Some(4242),
        };
        Self::from_script(Script {
            windows: vec![window],
            attach_plan: VecDeque::new(),
            attach_default: true,
            active_title: Some(title.to_string()),
            screen: RgbaImage::from_pixel(1280, 800, Rgba([230, 230, 230, 255])),
            fail_input: false,
            fail_launch: false,
            window_queries: 0,
            calls: Vec::new(),
        })
    }

    /// No windows at all and attach always failing.
    pub fn empty_desktop() -> Self {
        let p = Self::with_window("");
        {
            let mut s = p.script();
            s.windows.clear();
            s.attach_default = false;
            s.active_title = None;
        }
        p
    }

    pub fn from_script(script: Script) -> Self {
        Self { script: Arc::new(Mutex::new(script)) }
    }

    pub fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script().calls.clone()
    }

    fn record(&self, call: Call) {
        self.script().calls.push(call);
    }

    fn input(&self, call: Call) -> Result<()> {
        let mut s = self.script();
        s.calls.push(call);
        if s.fail_input {
            return Err(AutomationError::ActuationFailed("scripted input failure".into()));
        }
        Ok(())
    }
}

impl Platform for ScriptedPlatform {
    fn find_windows(&self, title: &str) -> Vec<WindowInfo> {
        let mut s = self.script();
        s.window_queries += 1;
        s.windows.iter().filter(|w| w.title.contains(title)).cloned().collect()
    }

    fn attach(&mut self, title: &str, _class: &str) -> Result<WindowInfo> {
        let mut s = self.script();
        s.calls.push(Call::Attach);
        let default = s.attach_default;
        let ok = s.attach_plan.pop_front().unwrap_or(default);
        let found = s.windows.iter().find(|w| w.title.contains(title)).cloned();
        match (ok, found) {
            (true, Some(w)) => Ok(w),
            _ => Err(AutomationError::WindowNotFound(title.to_string())),
        }
    }

    fn activate(&mut self, window: &WindowInfo) -> Result<()> {
        self.record(Call::Activate(window.id));
        Ok(())
    }

    fn restore(&mut self, window: &WindowInfo) -> Result<()> {
        let mut s = self.script();
        s.calls.push(Call::Restore(window.id));
        if let Some(w) = s.windows.iter_mut().find(|w| w.id == window.id) {
            w.minimized = false;
        }
        Ok(())
    }

    fn active_window_title(&self) -> Option<String> {
        self.script().active_title.clone()
    }

    fn capture(&mut self, region: Option<WindowGeometry>) -> Result<RgbaImage> {
        let mut s = self.script();
        s.calls.push(Call::Capture(region));
        let Some(g) = region else { return Ok(s.screen.clone()) };
        let x = g.left.max(0) as u32;
        let y = g.top.max(0) as u32;
        if x >= s.screen.width() || y >= s.screen.height() {
            return Err(AutomationError::Capture(format!("region {:?} is off screen", g)));
        }
        let w = g.width.min(s.screen.width() - x);
        let h = g.height.min(s.screen.height() - y);
        Ok(imageops::crop_imm(&s.screen, x, y, w, h).to_image())
    }

    fn move_pointer(&mut self, x: i32, y: i32, _duration: Duration) -> Result<()> {
        self.input(Call::MovePointer(x, y))
    }

    fn click(&mut self) -> Result<()> {
        self.input(Call::Click)
    }

    fn tap(&mut self, key: Key) -> Result<()> {
        self.input(Call::Tap(key))
    }

    fn chord(&mut self, shortcut: Shortcut) -> Result<()> {
        self.input(Call::Chord(shortcut))
    }

    fn set_clipboard(&mut self, text: &str) -> Result<()> {
        self.input(Call::Clipboard(text.to_string()))
    }

    fn kill_processes(&mut self, names: &[String]) -> usize {
        self.record(Call::Kill(names.to_vec()));
        0
    }

    fn launch(&mut self, executable: &Path) -> Result<()> {
        let mut s = self.script();
        s.calls.push(Call::Launch(executable.to_path_buf()));
        if s.fail_launch {
            return Err(AutomationError::ActuationFailed(format!("cannot start {}", executable.display())));
        }
        Ok(())
    }
}
