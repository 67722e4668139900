pub mod native;
pub mod scripted;
pub mod stub;

use std::path::Path;
use std::time::Duration;

use image::RgbaImage;

use crate::error::Result;
use crate::types::*;
use crate::logger;

/// Everything the core needs from the operating system.
///
/// Implementations never interpret pixels; they only enumerate windows,
/// capture the screen, and dispatch input.
pub trait Platform: Send {
    /// Visible windows whose title contains `title`, via plain OS enumeration.
    fn find_windows(&self, title: &str) -> Vec<WindowInfo>;

    /// Attach through the accessibility/automation layer, matching title and
    /// window class, and bring the window to the foreground.
    fn attach(&mut self, title: &str, class: &str) -> Result<WindowInfo>;

    fn activate(&mut self, window: &WindowInfo) -> Result<()>;

    /// Un-minimize a window.
    fn restore(&mut self, window: &WindowInfo) -> Result<()>;

    fn active_window_title(&self) -> Option<String>;

    /// Capture the primary screen, or only `region` of it.
    fn capture(&mut self, region: Option<WindowGeometry>) -> Result<RgbaImage>;

    /// Move the pointer to absolute `(x, y)` over `duration`.
    fn move_pointer(&mut self, x: i32, y: i32, duration: Duration) -> Result<()>;

    fn click(&mut self) -> Result<()>;

    fn tap(&mut self, key: Key) -> Result<()>;

    fn chord(&mut self, shortcut: Shortcut) -> Result<()>;

    fn set_clipboard(&mut self, text: &str) -> Result<()>;

    /// Kill every process whose executable name is in `names`; returns how
    /// many were killed.
    fn kill_processes(&mut self, names: &[String]) -> usize;

    fn launch(&mut self, executable: &Path) -> Result<()>;
}

/// Create the platform appropriate for the current OS.
pub fn create_platform(force_stub: bool) -> Box<dyn Platform> {
    logger::register_core_prefixes();
    if force_stub {
        logger::register_prefix("stub", logger::COLOR_GRAY);
        return Box::new(stub::StubPlatform::new());
    }
    logger::register_prefix("desktop", logger::COLOR_GRAY);
    Box::new(native::NativePlatform::new())
}
