use std::path::PathBuf;

use crate::driver::Driver;
use crate::error::{AutomationError, Result};
use crate::logger;
use crate::settings::AutomationConfig;
use crate::types::*;

/// Wait after killing stray processes before relaunching.
pub const KILL_SETTLE_SECS: f64 = 3.0;
/// Attach attempts after a relaunch, and the pause between them.
pub const RELAUNCH_ATTACH_ATTEMPTS: u32 = 3;
pub const RELAUNCH_ATTACH_BACKOFF_SECS: f64 = 2.0;
/// Pause after each window-management call.
const WINDOW_SETTLE_SECS: f64 = 1.0;
const CLICK_SETTLE_SECS: f64 = 0.5;

/// Keeps the target application running and in the foreground.
pub trait Session: Send {
    fn state(&self) -> SessionState;

    /// Walk the activation cascade. `Err` is always
    /// [`AutomationError::SessionActivationFailed`] and leaves the state at
    /// [`SessionState::Failed`].
    fn ensure_ready(&mut self, driver: &mut Driver) -> Result<()>;
}

/// Activation tiers, tried in this order. Each failure cascades to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationTier {
    /// Attach to a running window through the accessibility layer.
    Attach,
    /// Kill strays, launch, wait for login, attach again.
    Relaunch,
    /// Plain window enumeration, restore, click the centre.
    WindowFallback,
    /// Start the process and give up; the user has to log in.
    BareLaunch,
}

impl ActivationTier {
    pub const ORDER: [ActivationTier; 4] = [
        ActivationTier::Attach,
        ActivationTier::Relaunch,
        ActivationTier::WindowFallback,
        ActivationTier::BareLaunch,
    ];
}

pub struct SessionManager {
    state: SessionState,
    window_title: String,
    window_class: String,
    executable: PathBuf,
    process_names: Vec<String>,
    login_wait_secs: u64,
}

impl SessionManager {
    pub fn new(config: &AutomationConfig) -> Self {
        Self {
            state: SessionState::Unknown,
            window_title: config.window_title.clone(),
            window_class: config.window_class.clone(),
            executable: config.executable_path.clone(),
            process_names: config.process_names.clone(),
            login_wait_secs: config.login_wait_secs,
        }
    }

    fn run_tier(&self, tier: ActivationTier, driver: &mut Driver) -> Result<()> {
        match tier {
            ActivationTier::Attach => self.attach(driver),
            ActivationTier::Relaunch => self.relaunch(driver),
            ActivationTier::WindowFallback => self.window_fallback(driver),
            ActivationTier::BareLaunch => self.bare_launch(driver),
        }
    }

    fn attach(&self, driver: &mut Driver) -> Result<()> {
        let window = driver.platform.attach(&self.window_title, &self.window_class)?;
        self.focus(driver, &window)
    }

    fn focus(&self, driver: &mut Driver, window: &WindowInfo) -> Result<()> {
        if window.minimized {
            driver.platform.restore(window)?;
        }
        driver.platform.activate(window)?;
        driver.pause_secs(WINDOW_SETTLE_SECS);
        if driver.refresh_geometry().is_err() {
            driver.geometry.set(window.geometry);
        }
        Ok(())
    }

    fn relaunch(&self, driver: &mut Driver) -> Result<()> {
        let killed = driver.platform.kill_processes(&self.process_names);
        logger::info_p("session", &format!("killed {} stray process(es)", killed));
        driver.pause_secs(KILL_SETTLE_SECS);

        driver.platform.launch(&self.executable)?;
        logger::info_p("session", &format!("log in within {} seconds", self.login_wait_secs));
        driver.pause_secs(self.login_wait_secs as f64);

        let mut last = AutomationError::WindowNotFound(self.window_title.clone());
        for attempt in 1..=RELAUNCH_ATTACH_ATTEMPTS {
            match driver.platform.attach(&self.window_title, &self.window_class) {
                Ok(window) => return self.focus(driver, &window),
                Err(e) => {
                    logger::info_p("session", &format!("attach {}/{} after launch: {}", attempt, RELAUNCH_ATTACH_ATTEMPTS, e));
                    last = e;
                }
            }
            if attempt < RELAUNCH_ATTACH_ATTEMPTS {
                driver.pause_secs(RELAUNCH_ATTACH_BACKOFF_SECS);
            }
        }
        Err(last)
    }

    fn window_fallback(&self, driver: &mut Driver) -> Result<()> {
        let window = driver
            .platform
            .find_windows(&self.window_title)
            .into_iter()
            .next()
            .ok_or_else(|| AutomationError::WindowNotFound(self.window_title.clone()))?;

        driver.platform.activate(&window)?;
        driver.pause_secs(WINDOW_SETTLE_SECS);
        if window.minimized {
            driver.platform.restore(&window)?;
            driver.pause_secs(WINDOW_SETTLE_SECS);
        }

        let g = driver.refresh_geometry()?;
        let (x, y) = g.center();
        driver.platform.move_pointer(x, y, std::time::Duration::ZERO)?;
        driver.platform.click()?;
        driver.pause_secs(CLICK_SETTLE_SECS);
        Ok(())
    }

    fn bare_launch(&self, driver: &mut Driver) -> Result<()> {
        match driver.platform.launch(&self.executable) {
            Ok(()) => Err(AutomationError::SessionActivationFailed(
                "application started, manual login required".into(),
            )),
            Err(e) => Err(AutomationError::SessionActivationFailed(format!(
                "cannot start {}: {}",
                self.executable.display(),
                e
            ))),
        }
    }
}

impl Session for SessionManager {
    fn state(&self) -> SessionState {
        self.state
    }

    fn ensure_ready(&mut self, driver: &mut Driver) -> Result<()> {
        self.state = SessionState::Activating;
        logger::info_p("session", "activating target window");

        let mut last = None;
        for tier in ActivationTier::ORDER {
            match self.run_tier(tier, driver) {
                Ok(()) => {
                    logger::info_p("session", &format!("ready via {:?} tier", tier));
                    self.state = SessionState::Ready;
                    return Ok(());
                }
                Err(e) => {
                    logger::warn_p("session", &format!("{:?} tier failed: {}", tier, e));
                    last = Some(e);
                }
            }
        }

        self.state = SessionState::Failed;
        Err(match last {
            Some(AutomationError::SessionActivationFailed(reason)) => AutomationError::SessionActivationFailed(reason),
            Some(e) => AutomationError::SessionActivationFailed(e.to_string()),
            None => AutomationError::SessionActivationFailed("no activation tier ran".into()),
        })
    }
}
