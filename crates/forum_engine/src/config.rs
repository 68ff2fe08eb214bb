use std::fs;
use std::path::Path;

use forum_core::BotConfig;
use forum_logging::forum_info;

use crate::scheduler::SchedulerSettings;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {message}")]
    Parse { path: String, message: String },
}

/// Reads a RON-encoded [`BotConfig`]. Missing fields take their defaults.
pub fn load_config(path: &Path) -> Result<BotConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config: BotConfig = ron::from_str(&content).map_err(|err| ConfigError::Parse {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    forum_info!(
        "Loaded config for {} against {} from {:?}",
        config.username,
        config.base_url,
        path
    );
    Ok(config)
}

/// Scheduler settings with the fixed class delays and the configured forum origin.
pub fn scheduler_settings(config: &BotConfig) -> SchedulerSettings {
    SchedulerSettings::with_base_url(config.base_url.clone())
}
