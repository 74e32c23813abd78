pub mod loader;
pub mod schema;

pub use loader::{apply_env_overrides, load_config, load_config_from_str};
pub use schema::{
    default_config_path, Config, DispatchConfig, RenderConfig, TextExtractionConfig,
};
