use std::path::{Path, PathBuf};

use crate::config::schema::ClientConfig;
use crate::error::ConfigError;

const CONFIG_DIR_NAME: &str = "parqueue";
const CONFIG_FILE_NAME: &str = "config.json";
const MIN_TICK_INTERVAL_MS: u64 = 10;

/// Location of the per-user config file, if the platform has a config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ClientConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<ClientConfig, ConfigError> {
    let config: ClientConfig = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

pub fn validate_config(config: &ClientConfig) -> Result<(), ConfigError> {
    let base_url = config.base_url.trim();
    if base_url.is_empty() {
        return Err(ConfigError::Validation {
            message: "baseUrl must not be empty".to_string(),
        });
    }
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ConfigError::Validation {
            message: format!("baseUrl must be an http(s) URL, got '{}'", base_url),
        });
    }

    if config.tick_interval_ms < MIN_TICK_INTERVAL_MS {
        return Err(ConfigError::Validation {
            message: format!(
                "tickIntervalMs must be at least {}, got {}",
                MIN_TICK_INTERVAL_MS, config.tick_interval_ms
            ),
        });
    }

    if config.connect_timeout_secs == 0 || config.history_timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "timeouts must be greater than zero".to_string(),
        });
    }
    if config.conversion_timeout_secs == Some(0) {
        return Err(ConfigError::Validation {
            message: "conversionTimeoutSecs must be greater than zero or null".to_string(),
        });
    }

    if config.accepted_extensions.is_empty() {
        return Err(ConfigError::Validation {
            message: "acceptedExtensions must list at least one extension".to_string(),
        });
    }

    if config.event_capacity == 0 {
        return Err(ConfigError::Validation {
            message: "eventCapacity must be greater than zero".to_string(),
        });
    }

    Ok(())
}
