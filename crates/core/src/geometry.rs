use crate::error::{AutomationError, Result};
use crate::platform::Platform;
use crate::types::WindowGeometry;

/// Resolves the target window's bounds and maps relative offsets onto them.
///
/// Holds only the most recent refresh; nothing here decides when that value
/// is stale. Callers refresh after activation, restore, or anything else that
/// can move the window.
#[derive(Debug, Clone)]
pub struct GeometryProvider {
    title: String,
    current: Option<WindowGeometry>,
}

impl GeometryProvider {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), current: None }
    }

    /// Query the OS for the first window whose title matches.
    pub fn refresh(&mut self, platform: &dyn Platform) -> Result<WindowGeometry> {
        let found = platform
            .find_windows(&self.title)
            .into_iter()
            .map(|w| w.geometry)
            .find(|g| !g.is_empty());
        match found {
            Some(g) => {
                self.current = Some(g);
                Ok(g)
            }
            None => {
                self.current = None;
                Err(AutomationError::WindowNotFound(self.title.clone()))
            }
        }
    }

    /// Record geometry obtained some other way (accessibility attach).
    pub fn set(&mut self, geometry: WindowGeometry) {
        self.current = Some(geometry);
    }

    pub fn current(&self) -> Option<WindowGeometry> {
        self.current
    }

    /// Map `(rel_x, rel_y)` in [0, 1] onto the last refreshed window.
    pub fn to_absolute(&self, rel_x: f64, rel_y: f64) -> Result<(i32, i32)> {
        let g = self.current.ok_or_else(|| AutomationError::WindowNotFound(self.title.clone()))?;
        Ok(relative_point(&g, rel_x, rel_y))
    }
}

pub fn relative_point(g: &WindowGeometry, rel_x: f64, rel_y: f64) -> (i32, i32) {
    let rx = rel_x.clamp(0.0, 1.0);
    let ry = rel_y.clamp(0.0, 1.0);
    (
        g.left + (g.width as f64 * rx) as i32,
        g.top + (g.height as f64 * ry) as i32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::stub::StubPlatform;

    #[test]
    fn to_absolute_needs_a_refresh_first() {
        let geo = GeometryProvider::new("Chat");
        assert!(matches!(geo.to_absolute(0.5, 0.5), Err(AutomationError::WindowNotFound(_))));
    }

    #[test]
    fn relative_offsets_truncate_like_pixel_math() {
        let mut geo = GeometryProvider::new("Chat");
        geo.set(WindowGeometry::new(100, 50, 800, 600));
        assert_eq!(geo.to_absolute(0.15, 0.92).unwrap(), (220, 602));
        assert_eq!(geo.to_absolute(0.0, 0.0).unwrap(), (100, 50));
    }

    #[test]
    fn refresh_uses_platform_enumeration() {
        let mut geo = GeometryProvider::new("Chat");
        let g = geo.refresh(&StubPlatform::new()).unwrap();
        assert_eq!(g, WindowGeometry::new(0, 0, 1920, 1080));
        assert_eq!(geo.current(), Some(g));
    }
}
