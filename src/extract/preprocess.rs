//! Grayscale page preprocessing for OCR input.
//!
//! Four independently toggleable stages composed by [`PagePreprocessor`]:
//! denoise → deskew → adaptive threshold → sharpen. Every stage maps a
//! `GrayImage` to a `GrayImage` of identical dimensions, so stages can be
//! reordered, swapped or dropped without touching their neighbors.

use image::{GrayImage, Luma};
use tracing::debug;

/// Pixels darker than this count as foreground ink.
const INK_THRESHOLD: u8 = 128;

/// Rotations below this angle (degrees) are not worth resampling for.
const MIN_DESKEW_DEG: f32 = 0.1;

/// One preprocessing step. Implementations must preserve image dimensions.
pub trait PreprocessStage: Send + Sync {
    fn name(&self) -> &'static str;
    fn apply(&self, image: GrayImage) -> GrayImage;
}

/// Stage toggles; all stages enabled by default.
#[derive(Debug, Clone)]
pub struct PreprocessOptions {
    pub denoise: bool,
    pub deskew: bool,
    pub threshold: bool,
    pub sharpen: bool,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            denoise: true,
            deskew: true,
            threshold: true,
            sharpen: true,
        }
    }
}

/// Ordered stage pipeline over grayscale page images.
pub struct PagePreprocessor {
    stages: Vec<Box<dyn PreprocessStage>>,
}

impl Default for PagePreprocessor {
    fn default() -> Self {
        Self::from_options(&PreprocessOptions::default())
    }
}

impl PagePreprocessor {
    pub fn new(stages: Vec<Box<dyn PreprocessStage>>) -> Self {
        Self { stages }
    }

    pub fn from_options(options: &PreprocessOptions) -> Self {
        let mut stages: Vec<Box<dyn PreprocessStage>> = Vec::new();
        if options.denoise {
            stages.push(Box::new(MedianDenoise));
        }
        if options.deskew {
            stages.push(Box::new(Deskew::default()));
        }
        if options.threshold {
            stages.push(Box::new(AdaptiveThreshold::default()));
        }
        if options.sharpen {
            stages.push(Box::new(Sharpen));
        }
        Self { stages }
    }

    pub fn run(&self, mut image: GrayImage) -> GrayImage {
        let dims = (image.width(), image.height());
        for stage in &self.stages {
            image = stage.apply(image);
            debug_assert_eq!((image.width(), image.height()), dims);
        }
        debug!(
            stages = self.stages.len(),
            dims = format!("{}x{}", dims.0, dims.1),
            "Page preprocessed"
        );
        image
    }
}

// ── MedianDenoise ─────────────────────────────────────────

/// 3x3 median filter — removes salt-and-pepper scanner noise while keeping
/// glyph edges intact.
pub struct MedianDenoise;

impl PreprocessStage for MedianDenoise {
    fn name(&self) -> &'static str {
        "denoise"
    }

    fn apply(&self, image: GrayImage) -> GrayImage {
        let (w, h) = (image.width(), image.height());
        let mut out = GrayImage::new(w, h);
        let mut window = [0u8; 9];

        for y in 0..h {
            for x in 0..w {
                let mut i = 0;
                for dy in -1i32..=1 {
                    for dx in -1i32..=1 {
                        let sx = clamp_coord(x as i32 + dx, w);
                        let sy = clamp_coord(y as i32 + dy, h);
                        window[i] = image.get_pixel(sx, sy).0[0];
                        i += 1;
                    }
                }
                window.sort_unstable();
                out.put_pixel(x, y, Luma([window[4]]));
            }
        }
        out
    }
}

// ── Deskew ────────────────────────────────────────────────

/// Straightens scans by the principal axis of the foreground pixels.
///
/// The axis of the foreground covariance is the minimum-area-rectangle
/// orientation for elongated text content; the angle is normalized into
/// (−45°, 45°] and the rotation runs about the image center with
/// border-replicated sampling. A page with no foreground ink is returned
/// unchanged.
pub struct Deskew {
    ink_threshold: u8,
}

impl Default for Deskew {
    fn default() -> Self {
        Self {
            ink_threshold: INK_THRESHOLD,
        }
    }
}

impl PreprocessStage for Deskew {
    fn name(&self) -> &'static str {
        "deskew"
    }

    fn apply(&self, image: GrayImage) -> GrayImage {
        let angle = match foreground_angle(&image, self.ink_threshold) {
            Some(a) if a.abs() >= MIN_DESKEW_DEG => a,
            _ => return image,
        };
        debug!(angle, "Deskewing page");
        rotate_about_center(&image, -angle)
    }
}

/// Orientation of the foreground pixel cloud, normalized to (−45°, 45°].
/// `None` when the page has no foreground pixels.
pub fn foreground_angle(image: &GrayImage, ink_threshold: u8) -> Option<f32> {
    let mut n = 0u64;
    let mut sum_x = 0f64;
    let mut sum_y = 0f64;
    for (x, y, p) in image.enumerate_pixels() {
        if p.0[0] < ink_threshold {
            n += 1;
            sum_x += x as f64;
            sum_y += y as f64;
        }
    }
    if n == 0 {
        return None;
    }

    let mean_x = sum_x / n as f64;
    let mean_y = sum_y / n as f64;
    let mut sxx = 0f64;
    let mut syy = 0f64;
    let mut sxy = 0f64;
    for (x, y, p) in image.enumerate_pixels() {
        if p.0[0] < ink_threshold {
            let dx = x as f64 - mean_x;
            let dy = y as f64 - mean_y;
            sxx += dx * dx;
            syy += dy * dy;
            sxy += dx * dy;
        }
    }

    let mut angle = (0.5 * (2.0 * sxy).atan2(sxx - syy)).to_degrees() as f32;
    while angle <= -45.0 {
        angle += 90.0;
    }
    while angle > 45.0 {
        angle -= 90.0;
    }
    Some(angle)
}

/// Rotate about the image center, same output dimensions, border pixels
/// replicated for samples that fall outside the source.
fn rotate_about_center(image: &GrayImage, angle_deg: f32) -> GrayImage {
    let (w, h) = (image.width(), image.height());
    let cx = (w as f32 - 1.0) / 2.0;
    let cy = (h as f32 - 1.0) / 2.0;
    let rad = angle_deg.to_radians();
    let (sin, cos) = rad.sin_cos();

    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            // Inverse mapping: where in the source does this pixel come from?
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            let sx = cos * dx + sin * dy + cx;
            let sy = -sin * dx + cos * dy + cy;
            let sx = clamp_coord(sx.round() as i32, w);
            let sy = clamp_coord(sy.round() as i32, h);
            out.put_pixel(x, y, *image.get_pixel(sx, sy));
        }
    }
    out
}

// ── AdaptiveThreshold ─────────────────────────────────────

/// Local-mean binarization: a pixel is foreground when it is darker than its
/// neighborhood mean by more than `offset`. Handles uneven scan lighting
/// that a global threshold cannot.
pub struct AdaptiveThreshold {
    pub window: u32,
    pub offset: i32,
}

impl Default for AdaptiveThreshold {
    fn default() -> Self {
        Self {
            window: 15,
            offset: 10,
        }
    }
}

impl PreprocessStage for AdaptiveThreshold {
    fn name(&self) -> &'static str {
        "threshold"
    }

    fn apply(&self, image: GrayImage) -> GrayImage {
        let (w, h) = (image.width(), image.height());
        if w == 0 || h == 0 {
            return image;
        }

        // Integral image for O(1) window means.
        let iw = (w + 1) as usize;
        let mut integral = vec![0u64; iw * (h as usize + 1)];
        for y in 0..h as usize {
            let mut row_sum = 0u64;
            for x in 0..w as usize {
                row_sum += image.get_pixel(x as u32, y as u32).0[0] as u64;
                integral[(y + 1) * iw + (x + 1)] = integral[y * iw + (x + 1)] + row_sum;
            }
        }

        let r = (self.window / 2) as i64;
        let mut out = GrayImage::new(w, h);
        for y in 0..h as i64 {
            for x in 0..w as i64 {
                let x0 = (x - r).max(0) as usize;
                let y0 = (y - r).max(0) as usize;
                let x1 = ((x + r + 1).min(w as i64)) as usize;
                let y1 = ((y + r + 1).min(h as i64)) as usize;
                let area = ((x1 - x0) * (y1 - y0)) as u64;

                let sum = integral[y1 * iw + x1] + integral[y0 * iw + x0]
                    - integral[y0 * iw + x1]
                    - integral[y1 * iw + x0];
                let mean = (sum / area) as i32;
                let value = image.get_pixel(x as u32, y as u32).0[0] as i32;
                let bin = if value < mean - self.offset { 0 } else { 255 };
                out.put_pixel(x as u32, y as u32, Luma([bin]));
            }
        }
        out
    }
}

// ── Sharpen ───────────────────────────────────────────────

/// 3x3 unsharp kernel `[0,-1,0; -1,5,-1; 0,-1,0]` — crisps glyph edges after
/// binarization softening.
pub struct Sharpen;

impl PreprocessStage for Sharpen {
    fn name(&self) -> &'static str {
        "sharpen"
    }

    fn apply(&self, image: GrayImage) -> GrayImage {
        let (w, h) = (image.width(), image.height());
        let mut out = GrayImage::new(w, h);

        for y in 0..h {
            for x in 0..w {
                let center = image.get_pixel(x, y).0[0] as i32;
                let up = sample(&image, x as i32, y as i32 - 1) as i32;
                let down = sample(&image, x as i32, y as i32 + 1) as i32;
                let left = sample(&image, x as i32 - 1, y as i32) as i32;
                let right = sample(&image, x as i32 + 1, y as i32) as i32;

                let value = (5 * center - up - down - left - right).clamp(0, 255) as u8;
                out.put_pixel(x, y, Luma([value]));
            }
        }
        out
    }
}

fn sample(image: &GrayImage, x: i32, y: i32) -> u8 {
    let sx = clamp_coord(x, image.width());
    let sy = clamp_coord(y, image.height());
    image.get_pixel(sx, sy).0[0]
}

fn clamp_coord(v: i32, len: u32) -> u32 {
    v.clamp(0, len.saturating_sub(1) as i32) as u32
}
