use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::integral_image::{integral_image, integral_squared_image};
use imageproc::template_matching::{find_extremes, match_template, MatchTemplateMethod};

use crate::driver::Screenshot;
use crate::types::{MatchResult, ReferenceImage, Strategy};
use super::MatchStrategy;

/// Scale factors tried by the multi-scale matcher.
pub const SCALES: [f32; 7] = [0.7, 0.8, 0.9, 1.0, 1.1, 1.2, 1.3];

/// Resized references smaller than this on either side are skipped.
pub const MIN_SIDE: u32 = 20;

/// Best correlation peak over all evaluated scales, in screenshot pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredMatch {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub score: f32,
    pub scale: f32,
}

/// Reference sizes the matcher will actually evaluate for a reference of
/// `width`x`height` against a `screen` of the given size.
pub fn evaluated_sizes(width: u32, height: u32, screen: (u32, u32), scales: &[f32]) -> Vec<(f32, u32, u32)> {
    scales
        .iter()
        .filter_map(|&scale| {
            let w = (width as f32 * scale) as u32;
            let h = (height as f32 * scale) as u32;
            if w < MIN_SIDE || h < MIN_SIDE || w > screen.0 || h > screen.1 {
                None
            } else {
                Some((scale, w, h))
            }
        })
        .collect()
}

type Integral = ImageBuffer<Luma<u64>, Vec<u64>>;

/// Per-window pixel sums and squared sums of a screenshot, computed once and
/// shared by every scale.
pub struct WindowSums {
    sums: Integral,
    squares: Integral,
}

impl WindowSums {
    pub fn new(image: &GrayImage) -> Self {
        Self {
            sums: integral_image::<_, u64>(image),
            squares: integral_squared_image::<_, u64>(image),
        }
    }

    /// (sum, squared sum) of the `w`x`h` window with top-left corner (x, y).
    fn window(&self, x: u32, y: u32, w: u32, h: u32) -> (i128, i128) {
        let rect = |img: &Integral| {
            let at = |x: u32, y: u32| img.get_pixel(x, y)[0] as i128;
            at(x + w, y + h) - at(x, y + h) - at(x + w, y) + at(x, y)
        };
        (rect(&self.sums), rect(&self.squares))
    }
}

/// Zero-mean normalized cross-correlation of `template` at every offset of
/// `screen`, in [-1, 1]. Windows or templates without variance score 0.
pub fn zero_mean_scores(screen: &GrayImage, sums: &WindowSums, template: &GrayImage) -> ImageBuffer<Luma<f32>, Vec<f32>> {
    let (tw, th) = template.dimensions();
    let n = (tw * th) as i128;
    let (t_sum, t_sq) = template.pixels().fold((0i128, 0i128), |(s, sq), p| {
        let v = p[0] as i128;
        (s + v, sq + v * v)
    });
    let t_var = (n * t_sq - t_sum * t_sum) as f64;

    let products = match_template(screen, template, MatchTemplateMethod::CrossCorrelation);
    ImageBuffer::from_fn(products.width(), products.height(), |x, y| {
        let (i_sum, i_sq) = sums.window(x, y, tw, th);
        let i_var = (n * i_sq - i_sum * i_sum) as f64;
        if i_var <= 0.0 || t_var <= 0.0 {
            return Luma([0.0]);
        }
        let cross = products.get_pixel(x, y)[0] as f64;
        let score = (n as f64 * cross - (i_sum * t_sum) as f64) / (i_var * t_var).sqrt();
        Luma([score.clamp(-1.0, 1.0) as f32])
    })
}

/// Zero-mean normalized cross-correlation of `reference` at each scale; the
/// highest peak wins, earlier scales winning ties.
pub fn best_match(screen: &GrayImage, reference: &GrayImage, scales: &[f32]) -> Option<ScoredMatch> {
    let sizes = evaluated_sizes(reference.width(), reference.height(), screen.dimensions(), scales);
    if sizes.is_empty() {
        return None;
    }
    let sums = WindowSums::new(screen);
    let mut best: Option<ScoredMatch> = None;

    for (scale, w, h) in sizes {
        let resized;
        let template = if (w, h) == reference.dimensions() {
            reference
        } else {
            resized = imageops::resize(reference, w, h, FilterType::Triangle);
            &resized
        };

        let scores = zero_mean_scores(screen, &sums, template);
        let peak = find_extremes(&scores);
        if !peak.max_value.is_finite() {
            continue;
        }
        if best.map_or(true, |b| peak.max_value > b.score) {
            let (x, y) = peak.max_value_location;
            best = Some(ScoredMatch { x, y, width: w, height: h, score: peak.max_value, scale });
        }
    }

    best
}

/// Pixel-correlation matcher. With [`SCALES`] it is the multi-scale template
/// matcher; with a single 1.0 scale it is the coarse fallback locate.
pub struct TemplateMatcher {
    scales: Vec<f32>,
    kind: Strategy,
}

impl TemplateMatcher {
    pub fn multi_scale() -> Self {
        Self { scales: SCALES.to_vec(), kind: Strategy::Template }
    }

    pub fn coarse() -> Self {
        Self { scales: vec![1.0], kind: Strategy::Coarse }
    }
}

impl MatchStrategy for TemplateMatcher {
    fn kind(&self) -> Strategy {
        self.kind
    }

    fn locate(&self, screen: &Screenshot, reference: &ReferenceImage, confidence: f32) -> Option<MatchResult> {
        let m = best_match(&screen.image, &reference.pixels, &self.scales)?;
        if m.score <= confidence {
            return None;
        }
        let (ox, oy) = screen.origin;
        let found = MatchResult {
            left: m.x as i32,
            top: m.y as i32,
            width: m.width,
            height: m.height,
            confidence: m.score.clamp(0.0, 1.0),
            strategy: self.kind,
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

    /// A checkerboard-ish patch with enough structure to peak sharply.
    fn patch(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            let v = ((x / 4 + y / 3) % 2) as u8 * 180 + ((x * 7 + y * 13) % 50) as u8;
            Luma([v])
        })
    }

    fn screen_with(patch: &GrayImage, at: (u32, u32)) -> GrayImage {
        let mut screen = GrayImage::from_fn(160, 120, |x, y| Luma([((x * 3 + y * 5) % 17) as u8 + 20]));
        imageops::replace(&mut screen, patch, at.0 as i64, at.1 as i64);
        screen
    }

    #[test]
    fn finds_exact_patch_at_scale_one() {
        let p = patch(30, 24);
        let screen = screen_with(&p, (70, 40));
        let m = best_match(&screen, &p, &[1.0]).unwrap();
        assert_eq!((m.x, m.y), (70, 40));
        assert!(m.score > 0.99);
    }

    #[test]
    fn repeated_calls_are_identical() {
        let p = patch(30, 30);
        let screen = screen_with(&p, (12, 50));
        let first = best_match(&screen, &p, &SCALES);
        let second = best_match(&screen, &p, &SCALES);
        assert_eq!(first, second);
    }

    #[test]
    fn sizes_below_floor_are_never_evaluated() {
        for (w, h) in [(20, 20), (25, 60), (28, 28), (100, 22), (14, 200), (29, 29)] {
            for (_, sw, sh) in evaluated_sizes(w, h, (1920, 1080), &SCALES) {
                assert!(sw >= MIN_SIDE && sh >= MIN_SIDE, "{}x{} evaluated {}x{}", w, h, sw, sh);
            }
        }
        // 24px at 0.7 and 0.8 falls below 20px.
        let scales: Vec<f32> = evaluated_sizes(24, 24, (1920, 1080), &SCALES).iter().map(|s| s.0).collect();
        assert_eq!(scales, [0.9, 1.0, 1.1, 1.2, 1.3]);
    }

    #[test]
    fn tiny_reference_yields_nothing() {
        let p = patch(12, 12);
        let screen = screen_with(&p, (5, 5));
        assert!(best_match(&screen, &p, &SCALES).is_none());
    }

    #[test]
    fn locate_applies_threshold_and_origin() {
        let p = patch(30, 24);
        let shot = Screenshot { image: screen_with(&p, (70, 40)), origin: (1000, 200) };
        let reference = ReferenceImage { name: "send_button".into(), theme: Theme::Dark, pixels: p };

        let m = TemplateMatcher::coarse().locate(&shot, &reference, 0.7).unwrap();
        assert_eq!((m.left, m.top, m.width, m.height), (1070, 240, 30, 24));
        assert_eq!(m.strategy, Strategy::Coarse);
        assert_eq!(m.theme, Some(Theme::Dark));

        let absent = ReferenceImage {
            pixels: GrayImage::from_fn(30, 24, |x, y| Luma([if (x + y) % 2 == 0 { 250 } else { 5 }])),
            ..reference
        };
        assert!(TemplateMatcher::coarse().locate(&shot, &absent, 0.99).is_none());
    }

    /// Dark glyph on a light panel, like a toolbar icon.
    fn glyph() -> GrayImage {
        GrayImage::from_fn(30, 30, |x, y| {
            let stroke = ((8..22).contains(&x) && (12..18).contains(&y)) || ((12..18).contains(&x) && (8..22).contains(&y));
            Luma([if stroke { 40 } else { 235 }])
        })
    }

    #[test]
    fn flat_panel_does_not_match_a_glyph() {
        let shot = Screenshot { image: GrayImage::from_pixel(200, 150, Luma([240])), origin: (0, 0) };
        let reference = ReferenceImage { name: "search_icon".into(), theme: Theme::Light, pixels: glyph() };

        assert!(TemplateMatcher::multi_scale().locate(&shot, &reference, 0.7).is_none());
        assert!(TemplateMatcher::coarse().locate(&shot, &reference, 0.6).is_none());
    }

    #[test]
    fn glyph_on_a_panel_is_found() {
        let mut screen = GrayImage::from_pixel(200, 150, Luma([240]));
        imageops::replace(&mut screen, &glyph(), 90, 60);
        let shot = Screenshot { image: screen, origin: (0, 0) };
        let reference = ReferenceImage { name: "search_icon".into(), theme: Theme::Light, pixels: glyph() };

        let m = TemplateMatcher::coarse().locate(&shot, &reference, 0.7).unwrap();
        assert_eq!((m.left, m.top), (90, 60));
        assert!(m.confidence > 0.99);
    }

    #[test]
    fn window_sums_cover_the_window_only() {
        let img = GrayImage::from_fn(6, 5, |x, y| Luma([(x + 10 * y) as u8]));
        let sums = WindowSums::new(&img);
        // Rows 1..3, columns 2..5: 12+13+14 + 22+23+24.
        assert_eq!(sums.window(2, 1, 3, 2).0, 108);
    }
}
