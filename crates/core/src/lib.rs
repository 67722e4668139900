pub mod actuator;
pub mod contacts;
pub mod driver;
pub mod error;
pub mod geometry;
pub mod locator;
pub mod logger;
pub mod matching;
pub mod orchestrator;
pub mod platform;
pub mod reference;
pub mod session;
pub mod settings;
pub mod sleep;
pub mod types;
pub mod workflow;

pub use error::{AutomationError, Result};
