use std::fmt;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::error::AutomationError;

/// Window identifier (HWND on Windows, CGWindowID on macOS, X11 id elsewhere)
pub type WindowId = u64;

/// Screen-coordinate bounding box of the target application's window.
///
/// A snapshot: it goes stale as soon as the window moves, so callers refetch
/// through the geometry provider instead of holding it across long operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowGeometry {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl WindowGeometry {
    pub fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self { left, top, width, height }
    }

    pub fn right(&self) -> i32 {
        self.left + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.top + self.height as i32
    }

    pub fn center(&self) -> (i32, i32) {
        (self.left + self.width as i32 / 2, self.top + self.height as i32 / 2)
    }

    /// Half-open containment: the right/bottom edges are outside.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right() && y >= self.top && y < self.bottom()
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A window found through OS enumeration or accessibility attach.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowInfo {
    pub id: WindowId,
    pub title: String,
    pub geometry: WindowGeometry,
    pub minimized: bool,
    pub pid: Option<u32>,
}

/// Where a strategy is allowed to look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchRegion {
    FullScreen,
    Window(WindowGeometry),
}

impl fmt::Display for SearchRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchRegion::FullScreen => write!(f, "screen"),
            SearchRegion::Window(g) => write!(f, "window {}x{}+{}+{}", g.width, g.height, g.left, g.top),
        }
    }
}

/// Light/dark rendering mode of the target application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    /// Lookup order used everywhere: light first.
    pub const ALL: [Theme; 2] = [Theme::Light, Theme::Dark];

    pub fn dir_name(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Snapshot of one UI element under one theme. Read-only once loaded.
#[derive(Debug, Clone)]
pub struct ReferenceImage {
    pub name: String,
    pub theme: Theme,
    pub pixels: GrayImage,
}

/// Which strategy produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Template,
    Feature,
    Coarse,
    Coordinate,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Strategy::Template => "template",
            Strategy::Feature => "feature",
            Strategy::Coarse => "coarse",
            Strategy::Coordinate => "coordinate",
        };
        f.pad(s)
    }
}

/// A located region in absolute screen coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
    /// In [0, 1]. Coordinate heuristics report 1.0.
    pub confidence: f32,
    pub strategy: Strategy,
    pub theme: Option<Theme>,
}

impl MatchResult {
    pub fn center(&self) -> (i32, i32) {
        (self.left + self.width as i32 / 2, self.top + self.height as i32 / 2)
    }

    /// Shift a region-relative match into absolute screen space.
    pub fn offset(mut self, dx: i32, dy: i32) -> Self {
        self.left += dx;
        self.top += dy;
        self
    }
}

/// One addressee of a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionTarget {
    pub name: String,
}

impl ActionTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for ActionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Summary of a run. `succeeded + failed_targets.len() == processed` always.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub processed: usize,
    pub succeeded: usize,
    pub failed_targets: Vec<ActionTarget>,
    /// Set when a setup-phase failure stopped the run before any target.
    pub aborted: Option<AutomationError>,
    pub cancelled: bool,
}

impl BatchOutcome {
    /// Partial success is still success.
    pub fn is_success(&self) -> bool {
        self.succeeded > 0
    }

    pub fn record_success(&mut self) {
        self.processed += 1;
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, target: &ActionTarget) {
        self.processed += 1;
        self.failed_targets.push(target.clone());
    }
}

/// Session Manager lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unknown,
    Activating,
    Ready,
    Failed,
}

/// UI elements the actuator knows how to reach without a reference image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    SearchIcon,
    MessageInput,
    SendButton,
}

impl ElementKind {
    pub const ALL: [ElementKind; 3] = [ElementKind::SearchIcon, ElementKind::MessageInput, ElementKind::SendButton];

    /// Reference image name under `root/{theme}/`.
    pub fn reference_name(self) -> &'static str {
        match self {
            ElementKind::SearchIcon => "search_icon",
            ElementKind::MessageInput => "message_input",
            ElementKind::SendButton => "send_button",
        }
    }

    /// Fixed relative offset inside the window, where the layout is known.
    pub fn relative_offset(self) -> Option<(f64, f64)> {
        match self {
            ElementKind::SearchIcon => Some((0.02, 0.05)),
            ElementKind::MessageInput => Some((0.15, 0.92)),
            ElementKind::SendButton => None,
        }
    }
}

/// Keys the actuator sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Down,
    Backspace,
    Char(char),
}

/// Modifier used for application shortcuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Control,
    Meta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortcut {
    pub modifier: Modifier,
    pub key: Key,
}

impl Shortcut {
    /// Ctrl+key, or Cmd+key on macOS.
    pub fn primary(c: char) -> Self {
        let modifier = if cfg!(target_os = "macos") { Modifier::Meta } else { Modifier::Control };
        Self { modifier, key: Key::Char(c) }
    }
}

/// Structured log line delivered to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: &'static str,
    pub prefix: String,
    pub color: u8,
    pub timestamp: String,
    pub message: String,
}

/// Ordered events from the core to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Log(LogLine),
    /// Percent of the current run's targets processed.
    Progress(u8),
    /// One target finished, successfully or not.
    TargetResult(String, bool),
    Completed(bool),
}

/// Command from the presentation layer to the orchestrator worker.
#[derive(Debug)]
pub enum Command {
    SendOne(ActionTarget, String),
    SendBatch(Vec<ActionTarget>, String),
    Quit,
}
