use crate::config::{Config, DispatchConfig, RenderConfig};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub render_dpi: u32,
    pub diff_threshold: u8,
    pub marker_radius: u32,
    pub page_batch_size: u32,
    pub stale_page_timeout_secs: u64,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            render_dpi: config.render.dpi,
            diff_threshold: config.render.diff_threshold,
            marker_radius: config.render.marker_radius,
            page_batch_size: config.dispatch.page_batch_size,
            stale_page_timeout_secs: config.dispatch.stale_page_timeout_secs,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let render = RenderConfig::default();
        let dispatch = DispatchConfig::default();
        Self {
            render_dpi: render.dpi,
            diff_threshold: render.diff_threshold,
            marker_radius: render.marker_radius,
            page_batch_size: dispatch.page_batch_size,
            stale_page_timeout_secs: dispatch.stale_page_timeout_secs,
        }
    }
}
