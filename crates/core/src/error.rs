use thiserror::Error;

/// Failures surfaced by the automation core.
///
/// `WindowNotFound`, `LocateTimeout` and `ActuationFailed` are recovered per
/// target; `EmptyTargets` and `SessionActivationFailed` at run start are the
/// only run-fatal conditions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AutomationError {
    #[error("no window titled \"{0}\" is visible")]
    WindowNotFound(String),

    #[error("no reference image for \"{0}\" in either theme")]
    MissingReference(String),

    #[error("could not locate \"{element}\" after {attempts} attempt(s)")]
    LocateTimeout { element: String, attempts: u32 },

    #[error("session activation failed: {0}")]
    SessionActivationFailed(String),

    #[error("input dispatch failed: {0}")]
    ActuationFailed(String),

    #[error("failed to read reference image {path}: {reason}")]
    ReferenceIo { path: String, reason: String },

    #[error("screen capture failed: {0}")]
    Capture(String),

    #[error("target list is empty")]
    EmptyTargets,

    #[error("run cancelled")]
    Cancelled,
}

impl AutomationError {
    pub fn actuation(e: impl std::fmt::Display) -> Self {
        AutomationError::ActuationFailed(e.to_string())
    }

    pub fn capture(e: impl std::fmt::Display) -> Self {
        AutomationError::Capture(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AutomationError>;
