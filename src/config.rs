//! Application configuration.
//!
//! Gesture thresholds and the per-stream speed tables come from a toml
//! file under the home directory; a default file is written on first run
//! so there is always something to edit.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::gesture::{GestureConfig, SpeedTables, StreamType};

const CONFIG_DIR: &str = ".gimbalctl";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Complete runtime configuration. Sections missing from the file fall
/// back to their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Stream channel this client instance controls
    pub stream: StreamType,
    /// Minimum ms between outbound zoom step commands
    pub wheel_throttle_ms: u64,
    pub gesture: GestureConfig,
    pub speeds: SpeedTables,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            stream: StreamType::Heat,
            wheel_throttle_ms: 50,
            gesture: GestureConfig::default(),
            speeds: SpeedTables::default(),
        }
    }
}

impl AppConfig {
    pub fn config_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| {
            warn!("Could not determine home directory, using current directory");
            PathBuf::from(".")
        });
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    /// Write the default configuration if no file exists yet.
    pub async fn ensure_default(path: &PathBuf) -> Result<(), ConfigError> {
        if tokio::fs::try_exists(path).await? {
            return Ok(());
        }

        info!("Creating default configuration at {}", path.display());
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = toml::to_string_pretty(&AppConfig::default())?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    pub async fn load(path: &PathBuf) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = AppConfig::default();
        let content = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            stream = "day"

            [gesture]
            move_threshold = 30
            "#,
        )
        .unwrap();

        assert_eq!(parsed.stream, StreamType::Day);
        assert_eq!(parsed.gesture.move_threshold, 30);
        assert_eq!(parsed.gesture.pan_update_interval, 120);
        assert_eq!(parsed.wheel_throttle_ms, 50);
        assert_eq!(parsed.speeds, SpeedTables::default());
    }

    #[test]
    fn explicit_speed_table_overrides_default() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [[speeds.heat]]
            max_rotation_speed = 0.3

            [[speeds.day]]
            "#,
        )
        .unwrap();

        assert_eq!(parsed.speeds.heat.len(), 1);
        assert_eq!(parsed.speeds.heat[0].max_rotation_speed, 0.3);
        assert_eq!(parsed.speeds.day.len(), 1);
    }
}
