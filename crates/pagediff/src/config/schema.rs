use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    pub data_directory: String,
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub text_extraction: TextExtractionConfig,
}

impl Config {
    /// A config with every default and the given data directory.
    pub fn with_data_directory<S: Into<String>>(data_directory: S) -> Self {
        Self {
            version: "1.0".to_string(),
            data_directory: data_directory.into(),
            database_path: None,
            worker_count: default_worker_count(),
            render: RenderConfig::default(),
            dispatch: DispatchConfig::default(),
            text_extraction: TextExtractionConfig::default(),
        }
    }

    pub fn data_directory(&self) -> PathBuf {
        expand_home(&self.data_directory)
    }

    /// Explicit database path, or `pagediff.db` inside the data directory.
    pub fn database_path(&self) -> PathBuf {
        match &self.database_path {
            Some(path) => expand_home(path),
            None => crate::db::default_database_path(&self.data_directory()),
        }
    }
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    #[serde(default = "default_diff_threshold")]
    pub diff_threshold: u8,
    #[serde(default = "default_marker_radius")]
    pub marker_radius: u32,
}

fn default_dpi() -> u32 {
    150
}

fn default_diff_threshold() -> u8 {
    5
}

fn default_marker_radius() -> u32 {
    30
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            dpi: default_dpi(),
            diff_threshold: default_diff_threshold(),
            marker_radius: default_marker_radius(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Maximum pages of one job in flight at any time.
    #[serde(default = "default_page_batch_size")]
    pub page_batch_size: u32,
    #[serde(default = "default_task_lease_secs")]
    pub task_lease_secs: u64,
    #[serde(default = "default_stale_page_timeout_secs")]
    pub stale_page_timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Finished task rows older than this are pruned by the worker sweep.
    #[serde(default = "default_task_retention_secs")]
    pub task_retention_secs: u64,
}

fn default_page_batch_size() -> u32 {
    50
}

fn default_task_lease_secs() -> u64 {
    600
}

fn default_stale_page_timeout_secs() -> u64 {
    900
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_task_retention_secs() -> u64 {
    86_400
}

impl DispatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            page_batch_size: default_page_batch_size(),
            task_lease_secs: default_task_lease_secs(),
            stale_page_timeout_secs: default_stale_page_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            task_retention_secs: default_task_retention_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextExtractionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_text_url")]
    pub url: String,
    #[serde(default = "default_text_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_text_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_text_url() -> String {
    "http://tika:9998/tika".to_string()
}

fn default_text_timeout_secs() -> u64 {
    60
}

fn default_text_connect_timeout_secs() -> u64 {
    10
}

impl Default for TextExtractionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_text_url(),
            timeout_secs: default_text_timeout_secs(),
            connect_timeout_secs: default_text_connect_timeout_secs(),
        }
    }
}

/// `~/.pagediff/config.json`, when a home directory is known.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".pagediff").join("config.json"))
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
