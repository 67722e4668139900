use std::path::Path;
use std::time::Duration;

use image::{Rgba, RgbaImage};

use crate::error::Result;
use crate::types::*;
use crate::logger;
use super::Platform;

const SCREEN: WindowGeometry = WindowGeometry { left: 0, top: 0, width: 1920, height: 1080 };

/// Logs every call and pretends a maximized target window exists.
pub struct StubPlatform {
    window: WindowInfo,
}

impl StubPlatform {
    pub fn new() -> Self {
        Self {
            window: WindowInfo { id: 30001, title: "Stub".into(), geometry: SCREEN, minimized: false, pid: None },
        }
    }
}

impl Default for StubPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for StubPlatform {
    fn find_windows(&self, title: &str) -> Vec<WindowInfo> {
        logger::info_p("stub", &format!("find_windows(\"{}\")", title));
        vec![WindowInfo { title: title.to_string(), ..self.window.clone() }]
    }

    fn attach(&mut self, title: &str, class: &str) -> Result<WindowInfo> {
        logger::info_p("stub", &format!("attach(\"{}\", \"{}\")", title, class));
        Ok(WindowInfo { title: title.to_string(), ..self.window.clone() })
    }

    fn activate(&mut self, window: &WindowInfo) -> Result<()> {
        logger::info_p("stub", &format!("win({}).activate()", window.id));
        Ok(())
    }

    fn restore(&mut self, window: &WindowInfo) -> Result<()> {
        logger::info_p("stub", &format!("win({}).restore()", window.id));
        Ok(())
    }

    fn active_window_title(&self) -> Option<String> {
        Some(self.window.title.clone())
    }

    fn capture(&mut self, region: Option<WindowGeometry>) -> Result<RgbaImage> {
        logger::info_p("stub", &format!("capture({:?})", region));
        let g = region.unwrap_or(SCREEN);
        Ok(RgbaImage::from_pixel(g.width.max(1), g.height.max(1), Rgba([200, 200, 200, 255])))
    }

    fn move_pointer(&mut self, x: i32, y: i32, duration: Duration) -> Result<()> {
        logger::info_p("stub", &format!("move_pointer({}, {}, {:?})", x, y, duration));
        Ok(())
    }

    fn click(&mut self) -> Result<()> {
        logger::info_p("stub", "click()");
        Ok(())
    }

    fn tap(&mut self, key: Key) -> Result<()> {
        logger::info_p("stub", &format!("tap({:?})", key));
        Ok(())
    }

    fn chord(&mut self, shortcut: Shortcut) -> Result<()> {
        logger::info_p("stub", &format!("chord({:?}+{:?})", shortcut.modifier, shortcut.key));
        Ok(())
    }

    fn set_clipboard(&mut self, text: &str) -> Result<()> {
        logger::info_p("stub", &format!("set_clipboard(\"{}\")", text));
        Ok(())
    }

    fn kill_processes(&mut self, names: &[String]) -> usize {
        logger::info_p("stub", &format!("kill_processes({:?})", names));
        0
    }

    fn launch(&mut self, executable: &Path) -> Result<()> {
        logger::info_p("stub", &format!("launch({})", executable.display()));
        Ok(())
    }
}
