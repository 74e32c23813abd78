use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

const ENV_DATA_DIRECTORY: &str = "PAGEDIFF_DATA_DIRECTORY";
const ENV_DATABASE_PATH: &str = "PAGEDIFF_DATABASE_PATH";
const ENV_RENDER_DPI: &str = "PAGEDIFF_RENDER_DPI";
const ENV_DIFF_THRESHOLD: &str = "PAGEDIFF_DIFF_THRESHOLD";
const ENV_TEXT_URL: &str = "PAGEDIFF_TEXT_URL";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

/// Applies `PAGEDIFF_*` environment overrides and re-validates.
pub fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
    apply_overrides_from(config, |name| std::env::var(name).ok())
}

fn apply_overrides_from<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENV_DATA_DIRECTORY) {
        config.data_directory = value;
    }
    if let Some(value) = lookup(ENV_DATABASE_PATH) {
        config.database_path = Some(value);
    }
    if let Some(value) = lookup(ENV_RENDER_DPI) {
        config.render.dpi = parse_env(ENV_RENDER_DPI, &value)?;
    }
    if let Some(value) = lookup(ENV_DIFF_THRESHOLD) {
        config.render.diff_threshold = parse_env(ENV_DIFF_THRESHOLD, &value)?;
    }
    if let Some(value) = lookup(ENV_TEXT_URL) {
        config.text_extraction.url = value;
    }

    validate_config(config)
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.data_directory.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "data_directory must not be empty".to_string(),
        });
    }

    if !(36..=1200).contains(&config.render.dpi) {
        return Err(ConfigError::Validation {
            message: format!("render.dpi must be between 36 and 1200, got {}", config.render.dpi),
        });
    }

    if config.dispatch.page_batch_size == 0 {
        return Err(ConfigError::Validation {
            message: "dispatch.page_batch_size must be at least 1".to_string(),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    Ok(())
}
