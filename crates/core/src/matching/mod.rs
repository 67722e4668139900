//! Match strategies, cheapest first.
//!
//! Every visual strategy answers the same question against an already
//! captured [`Screenshot`]: where is this reference, if anywhere? "Not found"
//! is `None`, never an error.

pub mod coordinate;
pub mod feature;
pub mod template;

use crate::driver::Screenshot;
use crate::types::{MatchResult, ReferenceImage, Strategy};

pub use coordinate::CoordinateHeuristic;
pub use feature::FeatureMatcher;
pub use template::TemplateMatcher;

pub trait MatchStrategy: Send {
    fn kind(&self) -> Strategy;

    /// Locate `reference` in `screen`. Results are in absolute screen
    /// coordinates (offset by the screenshot's origin).
    fn locate(&self, screen: &Screenshot, reference: &ReferenceImage, confidence: f32) -> Option<MatchResult>;
}
