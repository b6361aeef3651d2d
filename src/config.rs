use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::seat::STAIRS_TAG;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

fn default_tag() -> String {
    STAIRS_TAG.to_string()
}

fn default_reach_squared() -> f64 {
    // 2 blocks, rounded up
    (2.0_f64).powi(2) + 1.0
}

fn default_mount_offset() -> [f64; 3] {
    [0.5, 0.3, 0.5]
}

fn default_fallback_clearance() -> f64 {
    1.05
}

fn default_event_capacity() -> usize {
    64
}

/// Tunables for sitting and standing up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatConfig {
    /// Material tag a block needs to count as a seat
    #[serde(default = "default_tag")]
    pub tag: String,

    /// Maximum squared distance between player and seat block
    #[serde(default = "default_reach_squared")]
    pub reach_squared: f64,

    /// Where the proxy is spawned, relative to the block corner
    #[serde(default = "default_mount_offset")]
    pub mount_offset: [f64; 3],

    /// Height added to the player's position when there is no stored pose to return to
    #[serde(default = "default_fallback_clearance")]
    pub fallback_clearance: f64,
}

impl Default for SeatConfig {
    fn default() -> Self {
        Self {
            tag: default_tag(),
            reach_squared: default_reach_squared(),
            mount_offset: default_mount_offset(),
            fallback_clearance: default_fallback_clearance(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Also write logs to a file in the data directory
    #[serde(default)]
    pub file: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub seats: SeatConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Buffered seat events per subscriber before they start lagging
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seats: SeatConfig::default(),
            logging: LoggingConfig::default(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl Config {
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        use directories::ProjectDirs;
        let proj_dirs = ProjectDirs::from("", "", "chairs").ok_or(ConfigError::NoConfigDir)?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load the config, falling back to defaults when there is no file.
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let result = match path {
            Some(path) => Self::load_from(path),
            None => Self::load(),
        };

        match result {
            Err(ConfigError::NotFound(path)) => {
                info!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(ConfigError::NoConfigDir) => {
                warn!("No config directory available, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(&self)?;
        fs::write(path, content)?;
        info!("Saved config to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.seats.tag, "stairs");
        assert_eq!(config.seats.reach_squared, 5.0);
        assert_eq!(config.seats.mount_offset, [0.5, 0.3, 0.5]);
        assert_eq!(config.seats.fallback_clearance, 1.05);
        assert!(!config.logging.file);
    }

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_override() {
        let config = Config::from_toml_str(
            r#"
            event_capacity = 8

            [seats]
            reach_squared = 9.0
            tag = "benches"

            [logging]
            file = true
            "#,
        )
        .unwrap();
        assert_eq!(config.event_capacity, 8);
        assert_eq!(config.seats.reach_squared, 9.0);
        assert_eq!(config.seats.tag, "benches");
        assert_eq!(config.seats.mount_offset, [0.5, 0.3, 0.5]);
        assert!(config.logging.file);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(matches!(
            Config::from_toml_str("[seats]\nreach_squared = \"far\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join(format!("chairs-missing-{}.toml", uuid::Uuid::new_v4()));
        assert!(matches!(Config::load_from(&path), Err(ConfigError::NotFound(_))));
        assert_eq!(Config::load_or_default(Some(&path)).unwrap(), Config::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = std::env::temp_dir().join(format!("chairs-config-{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.toml");

        let mut config = Config::default();
        config.seats.fallback_clearance = 2.0;
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
        std::fs::remove_dir_all(dir).unwrap();
    }
}
