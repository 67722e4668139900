//! Keypoint matching for references that are partially occluded, rotated, or
//! rendered at a scale the template scales don't cover.
//!
//! Oriented FAST keypoints over a small image pyramid, 256-bit rotated BRIEF
//! descriptors, brute-force Hamming matching with a cross-check, and a RANSAC
//! homography from reference space to screen space.

use image::imageops::{self, FilterType};
use image::GrayImage;
use imageproc::corners::corners_fast9;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::Projection;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::driver::Screenshot;
use crate::types::{MatchResult, ReferenceImage, Strategy};
use super::MatchStrategy;

/// Correspondences kept, and required, for acceptance.
pub const MIN_MATCHES: usize = 10;
/// Mean Hamming distance of the kept correspondences must be below this.
pub const MAX_MEAN_DISTANCE: f32 = 50.0;
/// RANSAC inlier threshold, in screen pixels.
pub const REPROJECTION_THRESHOLD: f32 = 5.0;

const DESCRIPTOR_BITS: usize = 256;
const PATCH_RADIUS: i32 = 13;
const BORDER: u32 = 20;
const FAST_THRESHOLD: u8 = 20;
const MAX_FEATURES: usize = 500;
const PYRAMID_LEVELS: u32 = 4;
const PYRAMID_SCALE: f32 = 1.2;
const RANSAC_ITERATIONS: usize = 500;
const PATTERN_SEED: u64 = 0x0b_1e_c7;
const RANSAC_SEED: u64 = 0x5eed;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    /// Level-0 coordinates.
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor(pub [u64; 4]);

impl Descriptor {
    pub fn distance(&self, other: &Descriptor) -> u32 {
        self.0.iter().zip(other.0.iter()).map(|(a, b)| (a ^ b).count_ones()).sum()
    }
}

/// `query` indexes the screenshot's descriptors, `train` the reference's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorMatch {
    pub query: usize,
    pub train: usize,
    pub distance: u32,
}

pub struct Features {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<Descriptor>,
}

/// Oriented FAST + rotated BRIEF extractor with a fixed sampling pattern.
pub struct OrbExtractor {
    pattern: Vec<[(i32, i32); 2]>,
}

impl OrbExtractor {
    pub fn new() -> Self {
        let mut rng = StdRng::seed_from_u64(PATTERN_SEED);
        let mut point = || (rng.gen_range(-PATCH_RADIUS..=PATCH_RADIUS), rng.gen_range(-PATCH_RADIUS..=PATCH_RADIUS));
        let pattern = (0..DESCRIPTOR_BITS).map(|_| [point(), point()]).collect();
        Self { pattern }
    }

    pub fn extract(&self, image: &GrayImage) -> Features {
        let mut keypoints = Vec::new();
        let mut descriptors = Vec::new();
        let per_level = MAX_FEATURES / PYRAMID_LEVELS as usize;

        for level in 0..PYRAMID_LEVELS {
            let scale = PYRAMID_SCALE.powi(level as i32);
            let w = (image.width() as f32 / scale) as u32;
            let h = (image.height() as f32 / scale) as u32;
            if w <= 2 * BORDER || h <= 2 * BORDER {
                break;
            }
            let level_img = if level == 0 {
                image.clone()
            } else {
                imageops::resize(image, w, h, FilterType::Triangle)
            };
            let smooth = gaussian_blur_f32(&level_img, 2.0);

            let mut corners: Vec<_> = corners_fast9(&level_img, FAST_THRESHOLD)
                .into_iter()
                .filter(|c| c.x >= BORDER && c.y >= BORDER && c.x < w - BORDER && c.y < h - BORDER)
                .collect();
            corners.sort_by(|a, b| b.score.total_cmp(&a.score).then((a.y, a.x).cmp(&(b.y, b.x))));
            corners.truncate(per_level);

            for c in corners {
                let angle = orientation(&level_img, c.x as i32, c.y as i32);
                descriptors.push(self.describe(&smooth, c.x as i32, c.y as i32, angle));
                keypoints.push(Keypoint { x: c.x as f32 * scale, y: c.y as f32 * scale, angle, score: c.score });
            }
        }

        Features { keypoints, descriptors }
    }

    fn describe(&self, smooth: &GrayImage, cx: i32, cy: i32, angle: f32) -> Descriptor {
        let (sin, cos) = angle.sin_cos();
        let sample = |(dx, dy): (i32, i32)| {
            let rx = (dx as f32 * cos - dy as f32 * sin).round() as i32;
            let ry = (dx as f32 * sin + dy as f32 * cos).round() as i32;
            smooth.get_pixel((cx + rx) as u32, (cy + ry) as u32)[0]
        };
        let mut bits = [0u64; 4];
        for (i, [p, q]) in self.pattern.iter().enumerate() {
            if sample(*p) < sample(*q) {
                bits[i / 64] |= 1u64 << (i % 64);
            }
        }
        Descriptor(bits)
    }
}

impl Default for OrbExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Intensity-centroid orientation over a disc around the keypoint.
fn orientation(img: &GrayImage, cx: i32, cy: i32) -> f32 {
    let (mut m10, mut m01) = (0f32, 0f32);
    for dy in -PATCH_RADIUS..=PATCH_RADIUS {
        for dx in -PATCH_RADIUS..=PATCH_RADIUS {
            if dx * dx + dy * dy > PATCH_RADIUS * PATCH_RADIUS {
                continue;
            }
            let v = img.get_pixel((cx + dx) as u32, (cy + dy) as u32)[0] as f32;
            m10 += dx as f32 * v;
            m01 += dy as f32 * v;
        }
    }
    m01.atan2(m10)
}

fn nearest(from: &Descriptor, pool: &[Descriptor]) -> Option<(usize, u32)> {
    pool.iter()
        .enumerate()
        .map(|(i, d)| (i, from.distance(d)))
        .min_by_key(|&(i, d)| (d, i))
}

/// Brute-force Hamming matching, keeping only pairs that are each other's
/// nearest neighbour. Sorted by ascending distance.
pub fn cross_check_matches(query: &[Descriptor], train: &[Descriptor]) -> Vec<DescriptorMatch> {
    let mut matches: Vec<_> = query
        .iter()
        .enumerate()
        .filter_map(|(qi, q)| {
            let (ti, distance) = nearest(q, train)?;
            let (back, _) = nearest(&train[ti], query)?;
            (back == qi).then_some(DescriptorMatch { query: qi, train: ti, distance })
        })
        .collect();
    matches.sort_by_key(|m| (m.distance, m.query, m.train));
    matches
}

/// The [`MIN_MATCHES`] best correspondences, if there are enough of them and
/// they are tight enough.
pub fn select_correspondences(matches: &[DescriptorMatch]) -> Option<Vec<DescriptorMatch>> {
    if matches.len() < MIN_MATCHES {
        return None;
    }
    let mut best = matches.to_vec();
    best.sort_by_key(|m| (m.distance, m.query, m.train));
    best.truncate(MIN_MATCHES);

    let mean = best.iter().map(|m| m.distance as f32).sum::<f32>() / best.len() as f32;
    (mean < MAX_MEAN_DISTANCE).then_some(best)
}

/// RANSAC over minimal 4-point samples. Needs at least four inliers.
pub fn estimate_homography(src: &[(f32, f32)], dst: &[(f32, f32)], threshold: f32) -> Option<Projection> {
    let n = src.len().min(dst.len());
    if n < 4 {
        return None;
    }
    let mut rng = StdRng::seed_from_u64(RANSAC_SEED);
    let limit = threshold * threshold;
    let mut best: Option<(Projection, usize)> = None;

    for _ in 0..RANSAC_ITERATIONS {
        let idx = rand::seq::index::sample(&mut rng, n, 4);
        let from = [src[idx.index(0)], src[idx.index(1)], src[idx.index(2)], src[idx.index(3)]];
        let to = [dst[idx.index(0)], dst[idx.index(1)], dst[idx.index(2)], dst[idx.index(3)]];
        let Some(h) = Projection::from_control_points(from, to) else { continue };

        let inliers = src
            .iter()
            .zip(dst)
            .filter(|&(s, d)| {
                let (px, py) = h * *s;
                let (ex, ey) = (px - d.0, py - d.1);
                ex * ex + ey * ey < limit
            })
            .count();
        if best.as_ref().map_or(true, |(_, b)| inliers > *b) {
            best = Some((h, inliers));
            if inliers == n {
                break;
            }
        }
    }

    best.filter(|(_, inliers)| *inliers >= 4).map(|(h, _)| h)
}

/// Axis-aligned bounding box of the reference's corners pushed through `h`.
pub fn project_bounds(h: &Projection, width: u32, height: u32) -> Option<(i32, i32, u32, u32)> {
    let (w, ht) = ((width.max(1) - 1) as f32, (height.max(1) - 1) as f32);
    let corners = [(0.0, 0.0), (0.0, ht), (w, ht), (w, 0.0)].map(|c| *h * c);
    if corners.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
        return None;
    }
    // Snap to the pixel grid before taking extremes.
    let min_x = corners.iter().map(|c| c.0.round()).fold(f32::INFINITY, f32::min);
    let min_y = corners.iter().map(|c| c.1.round()).fold(f32::INFINITY, f32::min);
    let max_x = corners.iter().map(|c| c.0.round()).fold(f32::NEG_INFINITY, f32::max);
    let max_y = corners.iter().map(|c| c.1.round()).fold(f32::NEG_INFINITY, f32::max);
    let bw = (max_x - min_x) as i64 + 1;
    let bh = (max_y - min_y) as i64 + 1;
    if bw <= 1 || bh <= 1 || bw > u32::MAX as i64 || bh > u32::MAX as i64 {
        return None;
    }
    Some((min_x as i32, min_y as i32, bw as u32, bh as u32))
}

/// Keypoint/homography matcher. Ignores the caller's confidence threshold:
/// acceptance is fixed by [`MIN_MATCHES`] and [`MAX_MEAN_DISTANCE`].
pub struct FeatureMatcher {
    extractor: OrbExtractor,
}

impl FeatureMatcher {
    pub fn new() -> Self {
        Self { extractor: OrbExtractor::new() }
    }
}

impl Default for FeatureMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchStrategy for FeatureMatcher {
    fn kind(&self) -> Strategy {
        Strategy::Feature
    }

    fn locate(&self, screen: &Screenshot, reference: &ReferenceImage, _confidence: f32) -> Option<MatchResult> {
        let scene = self.extractor.extract(&screen.image);
        let model = self.extractor.extract(&reference.pixels);
        if scene.descriptors.is_empty() || model.descriptors.is_empty() {
            return None;
        }

        let matches = cross_check_matches(&scene.descriptors, &model.descriptors);
        let good = select_correspondences(&matches)?;

        let src: Vec<_> = good.iter().map(|m| (model.keypoints[m.train].x, model.keypoints[m.train].y)).collect();
        let dst: Vec<_> = good.iter().map(|m| (scene.keypoints[m.query].x, scene.keypoints[m.query].y)).collect();
        let h = estimate_homography(&src, &dst, REPROJECTION_THRESHOLD)?;
        let (left, top, width, height) = project_bounds(&h, reference.pixels.width(), reference.pixels.height())?;

        let mean = good.iter().map(|m| m.distance as f32).sum::<f32>() / good.len() as f32;
        let (ox, oy) = screen.origin;
        let found = MatchResult {
            left,
            top,
            width,
            height,
            confidence: (1.0 - mean / DESCRIPTOR_BITS as f32).clamp(0.0, 1.0),
            strategy: Strategy::Feature,
            theme: Some(reference.theme),
        };
        Some(found.offset(ox, oy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Theme;
    use image::Luma;

    /// Random flat blocks of `size` pixels: sharp corners at every junction.
    fn blocks(w: u32, h: u32, size: u32, seed: u64) -> GrayImage {
        let mut rng = StdRng::seed_from_u64(seed);
        let cols = w.div_ceil(size);
        let values: Vec<u8> = (0..cols * h.div_ceil(size)).map(|_| rng.gen()).collect();
        GrayImage::from_fn(w, h, |x, y| Luma([values[((y / size) * cols + x / size) as usize]]))
    }

    fn reference(pixels: GrayImage) -> ReferenceImage {
        ReferenceImage { name: "search_icon".into(), theme: Theme::Light, pixels }
    }

    fn matches_with(distances: &[u32]) -> Vec<DescriptorMatch> {
        distances
            .iter()
            .enumerate()
            .map(|(i, &distance)| DescriptorMatch { query: i, train: i, distance })
            .collect()
    }

    #[test]
    fn fewer_than_ten_matches_are_rejected() {
        assert!(select_correspondences(&matches_with(&[0; 9])).is_none());
    }

    #[test]
    fn loose_matches_are_rejected() {
        assert!(select_correspondences(&matches_with(&[50; 12])).is_none());
        assert!(select_correspondences(&matches_with(&[49; 12])).is_some());
    }

    #[test]
    fn only_the_ten_closest_count() {
        let mut distances = vec![10; 10];
        distances.extend([200, 250, 255]);
        let kept = select_correspondences(&matches_with(&distances)).unwrap();
        assert_eq!(kept.len(), MIN_MATCHES);
        assert!(kept.iter().all(|m| m.distance == 10));
    }

    #[test]
    fn cross_check_drops_one_sided_pairs() {
        let a = Descriptor([0, 0, 0, 0]);
        let b = Descriptor([u64::MAX, 0, 0, 0]);
        let near_a = Descriptor([1, 0, 0, 0]);
        // Both query descriptors prefer train[0]; only the closer one survives.
        let m = cross_check_matches(&[a, near_a], &[a, b]);
        assert_eq!(m, vec![DescriptorMatch { query: 0, train: 0, distance: 0 }]);
    }

    #[test]
    fn homography_recovers_translation() {
        let src: Vec<(f32, f32)> = (0..10).map(|i| ((i * 7 % 30) as f32, (i * 11 % 25) as f32)).collect();
        let dst: Vec<(f32, f32)> = src.iter().map(|&(x, y)| (x + 100.0, y + 40.0)).collect();
        let h = estimate_homography(&src, &dst, REPROJECTION_THRESHOLD).unwrap();
        assert_eq!(project_bounds(&h, 30, 20), Some((100, 40, 30, 20)));
    }

    #[test]
    fn homography_needs_four_points() {
        let pts = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)];
        assert!(estimate_homography(&pts, &pts, REPROJECTION_THRESHOLD).is_none());
    }

    #[test]
    fn flat_images_have_no_features() {
        let flat = GrayImage::from_pixel(120, 120, Luma([128]));
        let f = OrbExtractor::new().extract(&flat);
        assert!(f.keypoints.is_empty());
        assert_eq!(f.keypoints.len(), f.descriptors.len());
    }

    #[test]
    fn locates_a_pasted_patch() {
        let patch = blocks(120, 120, 8, 11);
        let mut screen = GrayImage::from_pixel(400, 300, Luma([128]));
        imageops::replace(&mut screen, &patch, 150, 90);
        let shot = Screenshot { image: screen, origin: (0, 0) };

        let m = FeatureMatcher::new().locate(&shot, &reference(patch), 0.7).unwrap();
        let close = |got: i64, want: i64| (got - want).abs() <= 2;
        assert!(close(m.left as i64, 150) && close(m.top as i64, 90), "{:?}", m);
        assert!(close(m.width as i64, 120) && close(m.height as i64, 120), "{:?}", m);
        assert_eq!(m.strategy, Strategy::Feature);
        assert!(m.confidence > 1.0 - MAX_MEAN_DISTANCE / DESCRIPTOR_BITS as f32);
    }

    #[test]
    fn unrelated_texture_is_not_a_match() {
        let shot = Screenshot { image: blocks(400, 300, 11, 23), origin: (0, 0) };
        assert!(FeatureMatcher::new().locate(&shot, &reference(blocks(120, 120, 8, 11)), 0.7).is_none());
    }
}
