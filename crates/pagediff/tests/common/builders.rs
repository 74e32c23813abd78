//! Builders for synthetic page rasters and pipeline configs.

#![allow(dead_code)]

use image::{Rgb, RgbImage};

use pagediff::PipelineConfig;

pub const PAGE_WIDTH: u32 = 100;
pub const PAGE_HEIGHT: u32 = 100;

/// A white page of the default test size.
pub fn blank_page() -> RgbImage {
    blank_page_sized(PAGE_WIDTH, PAGE_HEIGHT)
}

pub fn blank_page_sized(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([255, 255, 255]))
}

/// A white page with a filled black square at (`x`, `y`).
pub fn page_with_box(x: u32, y: u32, size: u32) -> RgbImage {
    let mut page = blank_page();
    for py in y..(y + size).min(PAGE_HEIGHT) {
        for px in x..(x + size).min(PAGE_WIDTH) {
            page.put_pixel(px, py, Rgb([0, 0, 0]));
        }
    }
    page
}

/// `count` identical blank pages.
pub fn blank_pages(count: usize) -> Vec<RgbImage> {
    (0..count).map(|_| blank_page()).collect()
}

/// Builder for `PipelineConfig` with small, test-friendly values.
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    pub fn page_batch_size(mut self, size: u32) -> Self {
        self.config.page_batch_size = size;
        self
    }

    pub fn stale_page_timeout_secs(mut self, secs: u64) -> Self {
        self.config.stale_page_timeout_secs = secs;
        self
    }

    pub fn marker_radius(mut self, radius: u32) -> Self {
        self.config.marker_radius = radius;
        self
    }

    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

impl Default for PipelineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
