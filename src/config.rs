use crate::dbus::{SERVICE_NAME, SERVICE_PATH};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;
use zbus::names::WellKnownName;
use zvariant::ObjectPath;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to find config directory")]
    NoConfigDir,

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Which message bus to connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    /// The system-wide bus (default for the service)
    #[default]
    System,
    /// The per-login session bus (development and tests)
    Session,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Bus connection and naming
    #[serde(default)]
    pub bus: BusConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BusConfig {
    #[serde(default)]
    pub kind: BusKind,

    /// Well-known name claimed as primary owner
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Path the interface object is exported at
    #[serde(default = "default_object_path")]
    pub object_path: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            kind: BusKind::default(),
            service_name: default_service_name(),
            object_path: default_object_path(),
        }
    }
}

fn default_service_name() -> String {
    SERVICE_NAME.to_string()
}

fn default_object_path() -> String {
    SERVICE_PATH.to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        ProjectDirs::from("org", "chromium", "update-engine-dbus")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from the default location, or defaults if there is none
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load and validate config from an explicit path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        WellKnownName::try_from(self.bus.service_name.as_str()).map_err(|e| {
            ConfigError::ValidationError(format!(
                "service_name {:?} is not a valid bus name: {}",
                self.bus.service_name, e
            ))
        })?;

        ObjectPath::try_from(self.bus.object_path.as_str()).map_err(|e| {
            ConfigError::ValidationError(format!(
                "object_path {:?} is not a valid object path: {}",
                self.bus.object_path, e
            ))
        })?;

        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    /// Save config to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

/// Show current configuration
pub fn show() -> anyhow::Result<()> {
    let config = Config::load()?;
    let path = Config::config_path()?;

    println!("Config file: {}\n", path.display());
    println!("{}", toml::to_string_pretty(&config)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bus.kind, BusKind::System);
        assert_eq!(config.bus.service_name, "org.chromium.UpdateEngine");
        assert_eq!(config.bus.object_path, "/org/chromium/UpdateEngine");
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str("[bus]\nkind = \"session\"\n").unwrap();
        assert_eq!(config.bus.kind, BusKind::Session);
        assert_eq!(config.bus.service_name, SERVICE_NAME);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.bus.kind, BusKind::System);
        assert_eq!(config.bus.object_path, SERVICE_PATH);
    }

    #[test]
    fn test_unknown_bus_kind_rejected() {
        assert!(toml::from_str::<Config>("[bus]\nkind = \"starter\"\n").is_err());
    }

    #[test]
    fn test_invalid_service_name_rejected() {
        let mut config = Config::default();
        config.bus.service_name = "not a bus name".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_invalid_object_path_rejected() {
        let mut config = Config::default();
        config.bus.object_path = "org/chromium".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut config = Config::default();
        config.logging.level = "loud".into();
        assert!(config.validate().is_err());
        config.logging.level = "DEBUG".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.bus.kind = BusKind::Session;
        config.bus.service_name = "org.example.Updater".into();
        config.logging.level = "debug".into();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.bus.kind, BusKind::Session);
        assert_eq!(loaded.bus.service_name, "org.example.Updater");
        assert_eq!(loaded.logging.level, "debug");
    }

    #[test]
    fn test_load_from_rejects_invalid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[bus]\nobject_path = \"relative\"\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ValidationError(_))
        ));

        fs::write(&path, "[bus\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ParseError(_))
        ));
    }
}
