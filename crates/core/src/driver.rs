use std::time::Duration;

use image::{imageops, GrayImage};

use crate::error::Result;
use crate::geometry::GeometryProvider;
use crate::platform::Platform;
use crate::sleep::Pacer;
use crate::types::*;

/// Grayscale capture plus the absolute position of its top-left pixel.
pub struct Screenshot {
    pub image: GrayImage,
    pub origin: (i32, i32),
}

/// The single worker's handle on the desktop: OS access, the last known
/// window geometry, and the pacer every delay goes through.
pub struct Driver {
    pub platform: Box<dyn Platform>,
    pub geometry: GeometryProvider,
    pub pacer: Box<dyn Pacer>,
}

impl Driver {
    pub fn new(platform: Box<dyn Platform>, window_title: &str, pacer: Box<dyn Pacer>) -> Self {
        Self { platform, geometry: GeometryProvider::new(window_title), pacer }
    }

    pub fn refresh_geometry(&mut self) -> Result<WindowGeometry> {
        self.geometry.refresh(self.platform.as_ref())
    }

    /// Capture `region` and convert to single-channel intensity.
    pub fn screenshot(&mut self, region: SearchRegion) -> Result<Screenshot> {
        let (rect, origin) = match region {
            SearchRegion::FullScreen => (None, (0, 0)),
            SearchRegion::Window(g) => (Some(g), (g.left.max(0), g.top.max(0))),
        };
        let rgba = self.platform.capture(rect)?;
        Ok(Screenshot { image: imageops::grayscale(&rgba), origin })
    }

    pub fn pause_secs(&self, secs: f64) {
        self.pacer.pause_secs(secs);
    }

    pub fn pause(&self, duration: Duration) {
        self.pacer.pause(duration);
    }
}
