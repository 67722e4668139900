use crate::geometry::relative_point;
use crate::types::{MatchResult, Strategy, WindowGeometry};

/// Last-resort locator for elements with a fixed place in the layout. Does no
/// visual search at all.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateHeuristic {
    pub rel_x: f64,
    pub rel_y: f64,
}

impl CoordinateHeuristic {
    pub fn new(rel_x: f64, rel_y: f64) -> Self {
        Self { rel_x, rel_y }
    }

    /// A single-pixel region at the offset, always accepted.
    pub fn locate(&self, geometry: &WindowGeometry) -> MatchResult {
        let (x, y) = relative_point(geometry, self.rel_x, self.rel_y);
        MatchResult {
            left: x,
            top: y,
            width: 1,
            height: 1,
            confidence: 1.0,
            strategy: Strategy::Coordinate,
            theme: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_is_the_offset_point() {
        let g = WindowGeometry::new(10, 20, 1000, 500);
        let m = CoordinateHeuristic::new(0.5, 0.5).locate(&g);
        assert_eq!(m.center(), (510, 270));
        assert!(g.contains(m.center().0, m.center().1));
    }
}
