//! Raster comparison: change mask, score and marker placement.

pub mod overlay;

use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::morphology;

pub use overlay::build_overlay_svg;

/// Result of comparing two rendered pages.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    /// The rasters differ in dimensions and cannot be compared.
    IncompatibleSize {
        set_a: (u32, u32),
        set_b: (u32, u32),
    },
    Compared(PageDiff),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageDiff {
    pub width: u32,
    pub height: u32,
    /// Percentage of changed pixels after mask cleanup, in `[0, 100]`.
    pub score: f64,
    /// Centres of the bounding boxes of changed regions.
    pub markers: Vec<(f64, f64)>,
}

impl PageDiff {
    pub fn has_diffs(&self) -> bool {
        self.score > 0.0
    }
}

/// Compares two rasters of one page.
pub fn compare_rasters(set_a: &RgbImage, set_b: &RgbImage, threshold: u8) -> Comparison {
    if set_a.dimensions() != set_b.dimensions() {
        return Comparison::IncompatibleSize {
            set_a: set_a.dimensions(),
            set_b: set_b.dimensions(),
        };
    }

    let (width, height) = set_a.dimensions();
    if width == 0 || height == 0 {
        return Comparison::Compared(PageDiff {
            width,
            height,
            score: 0.0,
            markers: Vec::new(),
        });
    }

    let mask = change_mask(set_a, set_b, threshold);
    Comparison::Compared(PageDiff {
        width,
        height,
        score: change_score(&mask),
        markers: marker_centres(&mask),
    })
}

/// Binary mask of pixels whose absolute difference exceeds `threshold`,
/// opened once and closed twice with a 3×3 square.
pub fn change_mask(set_a: &RgbImage, set_b: &RgbImage, threshold: u8) -> GrayImage {
    let (width, height) = set_a.dimensions();
    let mut mask = GrayImage::new(width, height);

    for (x, y, out) in mask.enumerate_pixels_mut() {
        let a = set_a.get_pixel(x, y).0;
        let b = set_b.get_pixel(x, y).0;
        let delta = [a[0].abs_diff(b[0]), a[1].abs_diff(b[1]), a[2].abs_diff(b[2])];
        if luma(delta) > threshold {
            *out = Luma([255]);
        }
    }

    let opened = morphology::open(&mask, Norm::LInf, 1);
    morphology::close(&opened, Norm::LInf, 2)
}

/// Rec. 601 luma, rounded.
fn luma([r, g, b]: [u8; 3]) -> u8 {
    let weighted = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
    ((weighted + 500) / 1000) as u8
}

pub fn change_score(mask: &GrayImage) -> f64 {
    let total = u64::from(mask.width()) * u64::from(mask.height());
    if total == 0 {
        return 0.0;
    }
    let changed = mask.pixels().filter(|p| p.0[0] > 0).count() as u64;
    changed as f64 / total as f64 * 100.0
}

/// Bounding-box centres of the outermost contours in the mask.
pub fn marker_centres(mask: &GrayImage) -> Vec<(f64, f64)> {
    find_contours::<u32>(mask)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .filter_map(|contour| {
            let min_x = contour.points.iter().map(|p| p.x).min()?;
            let max_x = contour.points.iter().map(|p| p.x).max()?;
            let min_y = contour.points.iter().map(|p| p.y).min()?;
            let max_y = contour.points.iter().map(|p| p.y).max()?;
            let w = f64::from(max_x - min_x + 1);
            let h = f64::from(max_y - min_y + 1);
            Some((f64::from(min_x) + w / 2.0, f64::from(min_y) + h / 2.0))
        })
        .collect()
}
