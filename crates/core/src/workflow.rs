use crate::actuator::InputActuator;
use crate::driver::Driver;
use crate::error::Result;
use crate::locator::LocatorEngine;
use crate::logger;
use crate::settings::AutomationConfig;
use crate::types::*;

/// Confidence used when probing for the message input after opening a chat.
pub const PROBE_CONFIDENCE: f32 = 0.6;

const SEARCH_SHORTCUT_SETTLE_SECS: f64 = 1.0;
const CLEAR_SETTLE_SECS: f64 = 0.3;
const SEARCH_RESULTS_SECS: f64 = 2.0;
const SURFACE_OPEN_SECS: f64 = 1.5;
const ALTERNATE_SELECT_SECS: f64 = 0.5;
const AFTER_SEND_SECS: f64 = 1.0;

/// The per-target sequence the orchestrator drives.
pub trait Workflow: Send {
    /// Open the addressee's conversation. `Ok(false)` means the sequence ran
    /// but the surface could not be verified.
    fn open_surface(&mut self, driver: &mut Driver, target: &ActionTarget) -> Result<bool>;

    /// Type and send `message` into the open conversation.
    fn deliver(&mut self, driver: &mut Driver, message: &str) -> Result<()>;
}

/// Ways of confirming that a conversation opened. The first passing check wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceCheck {
    /// The message input is visible at [`PROBE_CONFIDENCE`].
    ElementProbe,
    /// The active window title contains the configured marker.
    WindowTitle,
    /// A hybrid click on the message input acted at all. Passes whenever the
    /// window is on screen.
    ForcedClick,
}

impl SurfaceCheck {
    pub const DEFAULT_ORDER: [SurfaceCheck; 3] =
        [SurfaceCheck::ElementProbe, SurfaceCheck::WindowTitle, SurfaceCheck::ForcedClick];
}

/// Search, select and message a contact in the chat client.
pub struct ChatWorkflow {
    pub locator: LocatorEngine,
    pub actuator: InputActuator,
    pub checks: Vec<SurfaceCheck>,
    title_marker: String,
}

impl ChatWorkflow {
    pub fn new(locator: LocatorEngine, config: &AutomationConfig) -> Self {
        Self {
            locator,
            actuator: InputActuator::new(config.input_pause_secs),
            checks: SurfaceCheck::DEFAULT_ORDER.to_vec(),
            title_marker: config.chat_title_marker.clone(),
        }
    }

    fn hybrid_click(&mut self, driver: &mut Driver, element: ElementKind, retries: Option<u32>) -> bool {
        self.actuator.hybrid_click(driver, &mut self.locator, element, retries)
    }

    fn check(&mut self, driver: &mut Driver, check: SurfaceCheck) -> bool {
        match check {
            SurfaceCheck::ElementProbe => self
                .locator
                .locate(driver, ElementKind::MessageInput.reference_name(), Some(PROBE_CONFIDENCE), None)
                .is_some(),
            SurfaceCheck::WindowTitle => driver
                .platform
                .active_window_title()
                .is_some_and(|t| t.contains(&self.title_marker)),
            SurfaceCheck::ForcedClick => self.hybrid_click(driver, ElementKind::MessageInput, Some(1)),
        }
    }

    pub fn verify_opened(&mut self, driver: &mut Driver) -> bool {
        let checks = self.checks.clone();
        for check in checks {
            if self.check(driver, check) {
                logger::info_p("act", &format!("conversation verified by {:?}", check));
                return true;
            }
        }
        false
    }

    fn select_first_result(&mut self, driver: &mut Driver) -> Result<bool> {
        self.actuator.press(driver, Key::Enter)?;
        driver.pause_secs(SURFACE_OPEN_SECS);
        Ok(self.verify_opened(driver))
    }
}

impl Workflow for ChatWorkflow {
    fn open_surface(&mut self, driver: &mut Driver, target: &ActionTarget) -> Result<bool> {
        logger::info_p("act", &format!("searching for {}", target));
        driver.refresh_geometry()?;

        if !self.hybrid_click(driver, ElementKind::SearchIcon, None) {
            logger::info_p("act", "search icon unreachable, using the search shortcut");
            driver.platform.chord(Shortcut::primary('f'))?;
            driver.pause_secs(SEARCH_SHORTCUT_SETTLE_SECS);
        }

        self.actuator.clear_field(driver)?;
        driver.pause_secs(CLEAR_SETTLE_SECS);
        self.actuator.paste(driver, &target.name)?;
        driver.pause_secs(SEARCH_RESULTS_SECS);

        if self.select_first_result(driver)? {
            return Ok(true);
        }

        logger::info_p("act", "first result did not open, trying the next one");
        self.actuator.press(driver, Key::Down)?;
        driver.pause_secs(ALTERNATE_SELECT_SECS);
        self.select_first_result(driver)
    }

    fn deliver(&mut self, driver: &mut Driver, message: &str) -> Result<()> {
        if !self.hybrid_click(driver, ElementKind::MessageInput, None) {
            let (rx, ry) = ElementKind::MessageInput.relative_offset().unwrap_or((0.5, 0.9));
            self.actuator.click_relative(driver, rx, ry)?;
        }

        self.actuator.type_text(driver, message)?;

        if !self.hybrid_click(driver, ElementKind::SendButton, None) {
            self.actuator.press(driver, Key::Enter)?;
        }
        driver.pause_secs(AFTER_SEND_SECS);
        logger::info_p("act", "message sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::scripted::{Call, ScriptedPlatform};
    use crate::reference::ReferenceStore;
    use crate::sleep::RecordingPacer;

    struct Rig {
        platform: ScriptedPlatform,
        driver: Driver,
        workflow: ChatWorkflow,
        _dir: tempfile::TempDir,
    }

    fn rig(active_title: &str) -> Rig {
        let config = AutomationConfig { window_title: "Chat".into(), ..AutomationConfig::default() };
        let platform = ScriptedPlatform::with_window("Chat");
        platform.script().active_title = Some(active_title.to_string());
        let driver = Driver::new(Box::new(platform.clone()), "Chat", Box::new(RecordingPacer::new()));
        let dir = tempfile::tempdir().unwrap();
        let locator = LocatorEngine::new(ReferenceStore::new(dir.path()), &config);
        Rig { platform, driver, workflow: ChatWorkflow::new(locator, &config), _dir: dir }
    }

    #[test]
    fn title_marker_verifies_without_alternate_selection() {
        let mut r = rig("聊天 - Alice");
        assert!(r.workflow.open_surface(&mut r.driver, &ActionTarget::new("Alice")).unwrap());

        let calls = r.platform.calls();
        assert!(calls.contains(&Call::Clipboard("Alice".into())));
        assert!(!calls.contains(&Call::Tap(Key::Down)));
        // Search icon reached through its fixed offset: (100 + 16, 50 + 30).
        assert_eq!(calls[0], Call::MovePointer(116, 80));
    }

    #[test]
    fn unverified_surface_tries_the_next_result() {
        let mut r = rig("Chat");
        r.workflow.checks = vec![SurfaceCheck::WindowTitle];
        assert!(!r.workflow.open_surface(&mut r.driver, &ActionTarget::new("Bob")).unwrap());

        let keys: Vec<_> = r
            .platform
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Tap(Key::Enter) | Call::Tap(Key::Down)))
            .collect();
        assert_eq!(keys, [Call::Tap(Key::Enter), Call::Tap(Key::Down), Call::Tap(Key::Enter)]);
    }

    #[test]
    fn forced_click_passes_whenever_the_window_is_up() {
        let mut r = rig("Chat");
        assert!(r.workflow.verify_opened(&mut r.driver));
    }

    #[test]
    fn deliver_pastes_then_sends_with_enter() {
        let mut r = rig("Chat");
        r.workflow.deliver(&mut r.driver, "hello").unwrap();

        let calls = r.platform.calls();
        let paste = calls.iter().position(|c| *c == Call::Clipboard("hello".into())).unwrap();
        assert_eq!(calls.last(), Some(&Call::Tap(Key::Enter)));
        assert!(paste < calls.len() - 1);
    }
}
