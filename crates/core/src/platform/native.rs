use std::path::Path;
use std::process::{Command as ProcessCommand, Stdio};
use std::time::Duration;

use enigo::{Button, Coordinate, Direction, Enigo, Keyboard, Mouse, Settings};
use image::{imageops, RgbaImage};
use sysinfo::{ProcessesToUpdate, System};

use crate::error::{AutomationError, Result};
use crate::logger;
use crate::sleep;
use crate::types::*;
use super::Platform;

const POINTER_STEPS: u32 = 12;

/// Real desktop: `xcap` for windows and pixels, `enigo` for input, `arboard`
/// for the clipboard, `sysinfo` for process control.
pub struct NativePlatform;

impl NativePlatform {
    pub fn new() -> Self {
        NativePlatform
    }
}

impl Default for NativePlatform {
    fn default() -> Self {
        Self::new()
    }
}

fn enigo() -> Result<Enigo> {
    Enigo::new(&Settings::default()).map_err(AutomationError::actuation)
}

fn enigo_key(key: Key) -> enigo::Key {
    match key {
        Key::Enter => enigo::Key::Return,
        Key::Down => enigo::Key::DownArrow,
        Key::Backspace => enigo::Key::Backspace,
        Key::Char(c) => enigo::Key::Unicode(c),
    }
}

fn window_info(w: &xcap::Window) -> Option<WindowInfo> {
    let title = w.title().ok()?;
    Some(WindowInfo {
        id: w.id().ok()? as WindowId,
        title,
        geometry: WindowGeometry::new(w.x().ok()?, w.y().ok()?, w.width().ok()?, w.height().ok()?),
        minimized: w.is_minimized().unwrap_or(false),
        pid: w.pid().ok(),
    })
}

impl Platform for NativePlatform {
    fn find_windows(&self, title: &str) -> Vec<WindowInfo> {
        let windows = match xcap::Window::all() {
            Ok(w) => w,
            Err(e) => {
                logger::warn_p("desktop", &format!("window enumeration failed: {}", e));
                return Vec::new();
            }
        };
        windows
            .iter()
            .filter_map(window_info)
            .filter(|w| w.title.contains(title))
            .collect()
    }

    fn attach(&mut self, title: &str, class: &str) -> Result<WindowInfo> {
        attach_native(self, title, class)
    }

    fn activate(&mut self, window: &WindowInfo) -> Result<()> {
        activate_native(window)
    }

    fn restore(&mut self, window: &WindowInfo) -> Result<()> {
        restore_native(window)
    }

    fn active_window_title(&self) -> Option<String> {
        xcap::Window::all()
            .ok()?
            .iter()
            .find(|w| w.is_focused().unwrap_or(false))
            .and_then(|w| w.title().ok())
    }

    fn capture(&mut self, region: Option<WindowGeometry>) -> Result<RgbaImage> {
        let monitors = xcap::Monitor::all().map_err(AutomationError::capture)?;
        let monitor = monitors
            .iter()
            .find(|m| m.is_primary().unwrap_or(false))
            .or_else(|| monitors.first())
            .ok_or_else(|| AutomationError::Capture("no monitor".into()))?;
        let image = monitor.capture_image().map_err(AutomationError::capture)?;

        let Some(region) = region else { return Ok(image) };

        // Region is absolute; the capture starts at the monitor origin.
        let mx = monitor.x().unwrap_or(0);
        let my = monitor.y().unwrap_or(0);
        let x = (region.left - mx).max(0) as u32;
        let y = (region.top - my).max(0) as u32;
        if x >= image.width() || y >= image.height() {
            return Err(AutomationError::Capture(format!("region {:?} is off-screen", region)));
        }
        let w = region.width.min(image.width() - x);
        let h = region.height.min(image.height() - y);
        Ok(imageops::crop_imm(&image, x, y, w, h).to_image())
    }

    fn move_pointer(&mut self, x: i32, y: i32, duration: Duration) -> Result<()> {
        let mut en = enigo()?;
        let (sx, sy) = en.location().unwrap_or((x, y));
        let step_ms = duration.as_millis() as u64 / POINTER_STEPS as u64;
        if step_ms > 0 {
            for i in 1..POINTER_STEPS {
                let t = i as f64 / POINTER_STEPS as f64;
                let px = sx + ((x - sx) as f64 * t).round() as i32;
                let py = sy + ((y - sy) as f64 * t).round() as i32;
                en.move_mouse(px, py, Coordinate::Abs).map_err(AutomationError::actuation)?;
                sleep::sleep_ms(step_ms);
            }
        }
        en.move_mouse(x, y, Coordinate::Abs).map_err(AutomationError::actuation)
    }

    fn click(&mut self) -> Result<()> {
        enigo()?.button(Button::Left, Direction::Click).map_err(AutomationError::actuation)
    }

    fn tap(&mut self, key: Key) -> Result<()> {
        enigo()?.key(enigo_key(key), Direction::Click).map_err(AutomationError::actuation)
    }

    fn chord(&mut self, shortcut: Shortcut) -> Result<()> {
        let modifier = match shortcut.modifier {
            Modifier::Control => enigo::Key::Control,
            Modifier::Meta => enigo::Key::Meta,
        };
        let mut en = enigo()?;
        en.key(modifier, Direction::Press).map_err(AutomationError::actuation)?;
        let pressed = en.key(enigo_key(shortcut.key), Direction::Click);
        // Always release the modifier, even when the key itself failed.
        let released = en.key(modifier, Direction::Release);
        pressed.and(released).map_err(AutomationError::actuation)
    }

    fn set_clipboard(&mut self, text: &str) -> Result<()> {
        let mut clipboard = arboard::Clipboard::new().map_err(AutomationError::actuation)?;
        clipboard.set_text(text.to_string()).map_err(AutomationError::actuation)
    }

    fn kill_processes(&mut self, names: &[String]) -> usize {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);
        let mut killed = 0;
        for (pid, process) in system.processes() {
            let name = process.name().to_string_lossy();
            if names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
                if process.kill() {
                    logger::info_p("desktop", &format!("killed {} (pid {})", name, pid));
                    killed += 1;
                } else {
                    logger::warn_p("desktop", &format!("could not kill {} (pid {})", name, pid));
                }
            }
        }
        killed
    }

    fn launch(&mut self, executable: &Path) -> Result<()> {
        ProcessCommand::new(executable)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
            .map_err(|e| AutomationError::SessionActivationFailed(format!("launch {}: {}", executable.display(), e)))
    }
}

#[cfg(target_os = "windows")]
mod win32 {
    use std::ffi::c_void;

    use windows::core::HSTRING;
    use windows::Win32::Foundation::{HWND, RECT};
    use windows::Win32::UI::WindowsAndMessaging::{
        FindWindowW, GetWindowRect, IsIconic, SetForegroundWindow, ShowWindow, SW_RESTORE,
    };

    use crate::error::{AutomationError, Result};
    use crate::types::*;

    fn hwnd(id: WindowId) -> HWND {
        HWND(id as usize as *mut c_void)
    }

    pub fn attach(title: &str, class: &str) -> Result<WindowInfo> {
        unsafe {
            let handle = FindWindowW(&HSTRING::from(class), &HSTRING::from(title))
                .map_err(|_| AutomationError::WindowNotFound(title.to_string()))?;
            if handle.0.is_null() {
                return Err(AutomationError::WindowNotFound(title.to_string()));
            }
            let minimized = IsIconic(handle).as_bool();
            if minimized {
                let _ = ShowWindow(handle, SW_RESTORE);
            }
            let _ = SetForegroundWindow(handle);

            let mut rect = RECT::default();
            GetWindowRect(handle, &mut rect).map_err(AutomationError::actuation)?;
            Ok(WindowInfo {
                id: handle.0 as usize as WindowId,
                title: title.to_string(),
                geometry: WindowGeometry::new(
                    rect.left,
                    rect.top,
                    (rect.right - rect.left).max(0) as u32,
                    (rect.bottom - rect.top).max(0) as u32,
                ),
                minimized: false,
                pid: None,
            })
        }
    }

    pub fn activate(id: WindowId) -> Result<()> {
        let ok = unsafe { SetForegroundWindow(hwnd(id)).as_bool() };
        if ok {
            Ok(())
        } else {
            Err(AutomationError::ActuationFailed(format!("SetForegroundWindow({:#x}) refused", id)))
        }
    }

    pub fn restore(id: WindowId) {
        unsafe {
            let _ = ShowWindow(hwnd(id), SW_RESTORE);
        }
    }
}

#[cfg(target_os = "windows")]
fn attach_native(_: &NativePlatform, title: &str, class: &str) -> Result<WindowInfo> {
    win32::attach(title, class)
}

#[cfg(target_os = "windows")]
fn activate_native(window: &WindowInfo) -> Result<()> {
    win32::activate(window.id)
}

#[cfg(target_os = "windows")]
fn restore_native(window: &WindowInfo) -> Result<()> {
    win32::restore(window.id);
    Ok(())
}

/// Bring the owning process to the front through System Events.
#[cfg(target_os = "macos")]
fn set_frontmost(pid: u32) -> Result<()> {
    let script = format!(
        "tell application \"System Events\" to set frontmost of first process whose unix id is {} to true",
        pid
    );
    let status = ProcessCommand::new("osascript")
        .arg("-e")
        .arg(&script)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(AutomationError::actuation)?;
    if status.success() {
        Ok(())
    } else {
        Err(AutomationError::ActuationFailed(format!("osascript exited with {}", status)))
    }
}

#[cfg(target_os = "macos")]
fn attach_native(platform: &NativePlatform, title: &str, _class: &str) -> Result<WindowInfo> {
    // Window classes don't exist on macOS; title plus owning process is enough.
    let window = platform
        .find_windows(title)
        .into_iter()
        .find(|w| w.pid.is_some())
        .ok_or_else(|| AutomationError::WindowNotFound(title.to_string()))?;
    activate_native(&window)?;
    Ok(window)
}

#[cfg(target_os = "macos")]
fn activate_native(window: &WindowInfo) -> Result<()> {
    match window.pid {
        Some(pid) => set_frontmost(pid),
        None => Err(AutomationError::ActuationFailed(format!("window {} has no owning pid", window.id))),
    }
}

#[cfg(target_os = "macos")]
fn restore_native(window: &WindowInfo) -> Result<()> {
    activate_native(window)
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn attach_native(_: &NativePlatform, title: &str, _class: &str) -> Result<WindowInfo> {
    Err(AutomationError::WindowNotFound(format!("{} (no accessibility attach on this platform)", title)))
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn activate_native(_window: &WindowInfo) -> Result<()> {
    // No portable focus API; callers click into the window instead.
    Ok(())
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn restore_native(_window: &WindowInfo) -> Result<()> {
    Ok(())
}
