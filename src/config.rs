use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::logging::LogConfig;
use crate::models::Settings;
use crate::stats::AnalyticsConfig;

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application metadata
    pub metadata: ConfigMetadata,

    /// Where and how records are persisted
    #[serde(default)]
    pub storage: StorageSettings,

    /// Analytics thresholds
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Logging setup
    #[serde(default)]
    pub logging: LogConfig,

    /// Profile used when the data directory has no settings yet
    #[serde(default)]
    pub default_settings: Settings,
}

/// Configuration metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// Storage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory holding `records.json` and `settings.json`
    pub data_dir: PathBuf,

    /// Quiet period before pending changes are written
    pub debounce_ms: u64,
}

impl StorageSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            data_dir: AppConfig::config_dir().join("data"),
            debounce_ms: 500,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let now = Utc::now();
        AppConfig {
            metadata: ConfigMetadata {
                version: "1.0".to_string(),
                created_at: now,
                updated_at: now,
            },
            storage: StorageSettings::default(),
            analytics: AnalyticsConfig::default(),
            logging: LogConfig::default(),
            default_settings: Settings::default(),
        }
    }
}

/// Configuration management implementation
impl AppConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        config
            .default_settings
            .validate()
            .with_context(|| "Invalid default_settings in configuration")?;

        debug!(path = %path.as_ref().display(), "Loaded configuration");
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// `~/.weightrs`, or `./.weightrs` without a home directory
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".weightrs")
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load from `path`, falling back to defaults when the file is absent
    ///
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load_from_file(path)
        } else {
            debug!(path = %path.as_ref().display(), "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();
        match Self::load_or_default_from(&config_path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, path = %config_path.display(), "Using default configuration");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogLevel;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.metadata.version, "1.0");
        assert_eq!(config.storage.debounce(), Duration::from_millis(500));
        assert!(config.storage.data_dir.ends_with(".weightrs/data"));
        assert_eq!(config.default_settings, Settings::default());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.storage.debounce_ms = 50;
        config.analytics.spike_threshold = dec!(0.4);
        config.logging.level = LogLevel::Debug;
        config.default_settings.goal_weight = dec!(68.5);
        config.save_to_file(&config_path).unwrap();

        let loaded = AppConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.storage.debounce_ms, 50);
        assert_eq!(loaded.analytics.spike_threshold, dec!(0.4));
        assert_eq!(loaded.logging.level, LogLevel::Debug);
        assert_eq!(loaded.default_settings.goal_weight, dec!(68.5));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
[metadata]
version = "1.0"
created_at = "2024-01-01T00:00:00Z"
updated_at = "2024-01-01T00:00:00Z"

[storage]
data_dir = "/tmp/weights"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from_file(&config_path).unwrap();
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/weights"));
        assert_eq!(config.storage.debounce_ms, 500);
        assert_eq!(config.analytics, AnalyticsConfig::default());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig::load_or_default_from(temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.storage.debounce_ms, 500);

        let broken = temp_dir.path().join("broken.toml");
        fs::write(&broken, "not = [valid").unwrap();
        assert!(AppConfig::load_or_default_from(&broken).is_err());
    }
}
