//! Composes the match strategies into one ranked attempt sequence per element.
//!
//! Hybrid step: every theme variant (light first), each strategy in order
//! (template, then feature) against one full-screen capture. Coarse step:
//! `retries` rounds of single-scale matching against the full screen and
//! then the window region, with a fixed backoff between rounds.

use std::time::Duration;

use crate::driver::{Driver, Screenshot};
use crate::error::{AutomationError, Result};
use crate::logger;
use crate::matching::{FeatureMatcher, MatchStrategy, TemplateMatcher};
use crate::reference::ReferenceStore;
use crate::settings::AutomationConfig;
use crate::types::*;

/// Pause between coarse attempts.
pub const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Matches scoring less than this above the threshold are re-validated
/// against freshly refreshed geometry.
pub const BORDERLINE_MARGIN: f32 = 0.1;

pub struct LocatorEngine {
    store: ReferenceStore,
    hybrid_strategies: Vec<Box<dyn MatchStrategy>>,
    coarse: Box<dyn MatchStrategy>,
    pub hybrid: bool,
    pub confidence: f32,
    pub retries: u32,
}

impl LocatorEngine {
    pub fn new(store: ReferenceStore, config: &AutomationConfig) -> Self {
        Self::with_strategies(
            store,
            vec![Box::new(TemplateMatcher::multi_scale()), Box::new(FeatureMatcher::new())],
            Box::new(TemplateMatcher::coarse()),
            config,
        )
    }

    pub fn with_strategies(
        store: ReferenceStore,
        hybrid_strategies: Vec<Box<dyn MatchStrategy>>,
        coarse: Box<dyn MatchStrategy>,
        config: &AutomationConfig,
    ) -> Self {
        Self {
            store,
            hybrid_strategies,
            coarse,
            hybrid: config.hybrid_mode,
            confidence: config.confidence,
            retries: config.retry_count.max(1),
        }
    }

    /// Like [`find`](Self::find), with every failure logged and folded into `None`.
    pub fn locate(
        &mut self,
        driver: &mut Driver,
        element: &str,
        confidence: Option<f32>,
        retries: Option<u32>,
    ) -> Option<MatchResult> {
        match self.find(driver, element, confidence, retries) {
            Ok(m) => Some(m),
            Err(e) => {
                logger::warn_p("locate", &e.to_string());
                None
            }
        }
    }

    /// Locate `element`, falling back from hybrid matching to the coarse
    /// retry loop. A missing reference fails at once without retrying.
    pub fn find(
        &mut self,
        driver: &mut Driver,
        element: &str,
        confidence: Option<f32>,
        retries: Option<u32>,
    ) -> Result<MatchResult> {
        let variants = self.store.variants(element)?;
        let confidence = confidence.unwrap_or(self.confidence);
        let retries = retries.unwrap_or(self.retries).max(1);

        if self.hybrid {
            match driver.screenshot(SearchRegion::FullScreen) {
                Ok(screen) => {
                    if let Some(m) = self.hybrid_pass(driver, &screen, &variants, confidence) {
                        return Ok(m);
                    }
                }
                Err(e) => logger::warn_p("locate", &format!("hybrid capture failed: {}", e)),
            }
        }

        for attempt in 1..=retries {
            if let Some(m) = self.coarse_pass(driver, &variants, confidence) {
                return Ok(m);
            }
            logger::info_p("locate", &format!("attempt {}/{} for {} found nothing", attempt, retries, element));
            if attempt < retries {
                driver.pause(RETRY_BACKOFF);
            }
        }

        Err(AutomationError::LocateTimeout { element: element.to_string(), attempts: retries })
    }

    fn hybrid_pass(
        &self,
        driver: &mut Driver,
        screen: &Screenshot,
        variants: &[ReferenceImage],
        confidence: f32,
    ) -> Option<MatchResult> {
        for reference in variants {
            for strategy in &self.hybrid_strategies {
                let Some(m) = strategy.locate(screen, reference, confidence) else { continue };
                if let Some(m) = validate(driver, m, confidence, false) {
                    log_hit(reference, &m, SearchRegion::FullScreen);
                    return Some(m);
                }
            }
        }
        None
    }

    fn coarse_pass(&self, driver: &mut Driver, variants: &[ReferenceImage], confidence: f32) -> Option<MatchResult> {
        let mut regions = vec![SearchRegion::FullScreen];
        let refreshed = driver.refresh_geometry().ok();
        if let Some(g) = refreshed {
            regions.push(SearchRegion::Window(g));
        }

        for region in regions {
            let screen = match driver.screenshot(region) {
                Ok(s) => s,
                Err(e) => {
                    logger::warn_p("locate", &format!("capture of {} failed: {}", region, e));
                    continue;
                }
            };
            for reference in variants {
                let Some(m) = self.coarse.locate(&screen, reference, confidence) else { continue };
                if let Some(m) = validate(driver, m, confidence, refreshed.is_some()) {
                    log_hit(reference, &m, region);
                    return Some(m);
                }
            }
        }
        None
    }
}

/// Accept a match whose centre lies inside the window. Borderline or
/// out-of-bounds matches get one geometry refresh before the verdict, unless
/// the caller has just refreshed (`fresh`). With no window known at all the
/// match is taken as-is.
fn validate(driver: &mut Driver, m: MatchResult, confidence: f32, fresh: bool) -> Option<MatchResult> {
    let (cx, cy) = m.center();
    let known = driver.geometry.current();
    let inside = known.map(|g| g.contains(cx, cy));
    if inside == Some(true) && m.confidence >= confidence + BORDERLINE_MARGIN {
        return Some(m);
    }

    let geometry = if fresh {
        known
    } else {
        match driver.refresh_geometry() {
            Ok(g) => Some(g),
            Err(_) => known,
        }
    };
    match geometry {
        None => Some(m),
        Some(g) if g.contains(cx, cy) => Some(m),
        Some(g) => {
            logger::warn_p(
                "locate",
                &format!("rejecting {} match at ({}, {}): outside window {:?}", m.strategy, cx, cy, g),
            );
            None
        }
    }
}

fn log_hit(reference: &ReferenceImage, m: &MatchResult, region: SearchRegion) {
    logger::info_p(
        "locate",
        &format!(
            "{} found via {} ({} theme, {}) at {:?} confidence {:.2}",
            reference.name, m.strategy, reference.theme, region, m.center(), m.confidence
        ),
    );
}
