use std::time::Duration;

use rand::Rng;

use crate::driver::Driver;
use crate::error::Result;
use crate::locator::LocatorEngine;
use crate::logger;
use crate::matching::CoordinateHeuristic;
use crate::types::*;

/// Pause after a keyboard-shortcut fallback.
const SHORTCUT_SETTLE_SECS: f64 = 1.0;

/// Fallback tiers of a hybrid click, tried in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTier {
    Visual,
    Coordinate,
    Keyboard,
}

impl ClickTier {
    pub const ORDER: [ClickTier; 3] = [ClickTier::Visual, ClickTier::Coordinate, ClickTier::Keyboard];
}

/// Turns located regions and fixed offsets into synthetic input.
pub struct InputActuator {
    /// Settle delay after typing and after clicks.
    pub settle_secs: f64,
}

impl InputActuator {
    pub fn new(settle_secs: f64) -> Self {
        Self { settle_secs }
    }

    /// Animated move to the region's centre, click, then wait `settle_secs`.
    pub fn click(&self, driver: &mut Driver, region: &MatchResult, settle_secs: f64) -> Result<()> {
        self.click_at(driver, region.center(), settle_secs)
    }

    pub fn click_at(&self, driver: &mut Driver, (x, y): (i32, i32), settle_secs: f64) -> Result<()> {
        let travel = Duration::from_millis(rand::thread_rng().gen_range(200..=300));
        driver.platform.move_pointer(x, y, travel)?;
        driver.platform.click()?;
        driver.pause_secs(settle_secs);
        Ok(())
    }

    /// Click at a fractional offset of a freshly refreshed window.
    pub fn click_relative(&self, driver: &mut Driver, rel_x: f64, rel_y: f64) -> Result<()> {
        driver.refresh_geometry()?;
        let point = driver.geometry.to_absolute(rel_x, rel_y)?;
        self.click_at(driver, point, self.settle_secs)
    }

    /// Try each [`ClickTier`] until one acts. `true` means something was
    /// clicked or pressed, not that the right element received it.
    pub fn hybrid_click(
        &self,
        driver: &mut Driver,
        locator: &mut LocatorEngine,
        element: ElementKind,
        retries: Option<u32>,
    ) -> bool {
        let name = element.reference_name();
        logger::info_p("act", &format!("hybrid click on {}", name));

        for tier in ClickTier::ORDER {
            let acted = match tier {
                ClickTier::Visual => self.visual_tier(driver, locator, element, retries),
                ClickTier::Coordinate => self.coordinate_tier(driver, element),
                ClickTier::Keyboard => self.keyboard_tier(driver, element),
            };
            match acted {
                Ok(true) => {
                    logger::info_p("act", &format!("{} clicked via {:?} tier", name, tier));
                    return true;
                }
                Ok(false) => {}
                Err(e) => logger::warn_p("act", &format!("{:?} tier for {} failed: {}", tier, name, e)),
            }
        }

        logger::warn_p("act", &format!("every tier failed for {}", name));
        false
    }

    fn visual_tier(
        &self,
        driver: &mut Driver,
        locator: &mut LocatorEngine,
        element: ElementKind,
        retries: Option<u32>,
    ) -> Result<bool> {
        let m = locator.find(driver, element.reference_name(), None, retries)?;
        self.click(driver, &m, self.settle_secs)?;
        Ok(true)
    }

    fn coordinate_tier(&self, driver: &mut Driver, element: ElementKind) -> Result<bool> {
        let Some((rx, ry)) = element.relative_offset() else { return Ok(false) };
        let g = driver.refresh_geometry()?;
        let m = CoordinateHeuristic::new(rx, ry).locate(&g);
        self.click(driver, &m, self.settle_secs)?;
        Ok(true)
    }

    fn keyboard_tier(&self, driver: &mut Driver, element: ElementKind) -> Result<bool> {
        match element {
            ElementKind::SendButton => {
                driver.platform.tap(Key::Enter)?;
            }
            ElementKind::SearchIcon => {
                driver.platform.chord(Shortcut::primary('f'))?;
                driver.pause_secs(SHORTCUT_SETTLE_SECS);
            }
            ElementKind::MessageInput => return Ok(false),
        }
        Ok(true)
    }

    /// Replace the focused field's content with `text` via the clipboard.
    pub fn type_text(&self, driver: &mut Driver, text: &str) -> Result<()> {
        self.clear_field(driver)?;
        self.paste(driver, text)?;
        driver.pause_secs(self.settle_secs);
        Ok(())
    }

    pub fn clear_field(&self, driver: &mut Driver) -> Result<()> {
        driver.platform.chord(Shortcut::primary('a'))?;
        driver.platform.tap(Key::Backspace)
    }

    pub fn paste(&self, driver: &mut Driver, text: &str) -> Result<()> {
        driver.platform.set_clipboard(text)?;
        driver.platform.chord(Shortcut::primary('v'))
    }

    pub fn press(&self, driver: &mut Driver, key: Key) -> Result<()> {
        driver.platform.tap(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::scripted::{Call, ScriptedPlatform};
    use crate::reference::ReferenceStore;
    use crate::settings::AutomationConfig;
    use crate::sleep::RecordingPacer;

    fn setup() -> (ScriptedPlatform, Driver, LocatorEngine, tempfile::TempDir) {
        let platform = ScriptedPlatform::with_window("Chat");
        let driver = Driver::new(Box::new(platform.clone()), "Chat", Box::new(RecordingPacer::new()));
        let dir = tempfile::tempdir().unwrap();
        let locator = LocatorEngine::new(ReferenceStore::new(dir.path()), &AutomationConfig::default());
        (platform, driver, locator, dir)
    }

    #[test]
    fn missing_references_fall_back_to_coordinates() {
        let (platform, mut driver, mut locator, _dir) = setup();
        let actuator = InputActuator::new(0.5);

        assert!(actuator.hybrid_click(&mut driver, &mut locator, ElementKind::MessageInput, None));
        // 800x600 at (100, 50), offset (0.15, 0.92).
        assert_eq!(platform.calls(), [Call::MovePointer(220, 602), Call::Click]);
    }

    #[test]
    fn send_falls_back_to_enter() {
        let (platform, mut driver, mut locator, _dir) = setup();
        let actuator = InputActuator::new(0.5);

        assert!(actuator.hybrid_click(&mut driver, &mut locator, ElementKind::SendButton, None));
        assert_eq!(platform.calls(), [Call::Tap(Key::Enter)]);
    }

    #[test]
    fn search_falls_back_to_shortcut_when_window_is_gone() {
        let (platform, mut driver, mut locator, _dir) = setup();
        platform.script().windows.clear();
        let actuator = InputActuator::new(0.5);

        assert!(actuator.hybrid_click(&mut driver, &mut locator, ElementKind::SearchIcon, None));
        assert_eq!(platform.calls(), [Call::Chord(Shortcut::primary('f'))]);
    }

    #[test]
    fn input_with_no_window_reports_failure() {
        let (platform, mut driver, mut locator, _dir) = setup();
        platform.script().windows.clear();
        let actuator = InputActuator::new(0.5);

        assert!(!actuator.hybrid_click(&mut driver, &mut locator, ElementKind::MessageInput, None));
        assert!(platform.calls().is_empty());
    }

    #[test]
    fn type_text_clears_then_pastes() {
        let (platform, mut driver, _locator, _dir) = setup();
        InputActuator::new(0.5).type_text(&mut driver, "你好").unwrap();
        assert_eq!(
            platform.calls(),
            [
                Call::Chord(Shortcut::primary('a')),
                Call::Tap(Key::Backspace),
                Call::Clipboard("你好".into()),
                Call::Chord(Shortcut::primary('v')),
            ]
        );
    }
}
