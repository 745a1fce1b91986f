//! Service configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Control API settings.
    pub server: ServerConfig,
    /// Storage settings.
    pub storage: StorageConfig,
    /// Tracking and sync settings.
    pub tracking: TrackingConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        // Create parent directories if needed
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        errors.extend(self.server.validate());
        errors.extend(self.storage.validate());
        errors.extend(self.tracking.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Control API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8085").
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8085".to_string(),
        }
    }
}

impl ServerConfig {
    /// Validate server configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.bind.is_empty() {
            errors.push(ValidationError {
                field: "server.bind".to_string(),
                message: "bind address cannot be empty".to_string(),
            });
        } else {
            let parts: Vec<&str> = self.bind.rsplitn(2, ':').collect();
            if parts.len() != 2 {
                errors.push(ValidationError {
                    field: "server.bind".to_string(),
                    message: format!(
                        "invalid bind address '{}': expected format 'host:port'",
                        self.bind
                    ),
                });
            } else if parts[0].parse::<u16>().is_err() {
                errors.push(ValidationError {
                    field: "server.bind".to_string(),
                    message: format!("invalid port '{}': must be a number 1-65535", parts[0]),
                });
            }
        }

        errors
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: tracklog_store::default_db_path(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.path".to_string(),
                message: "database path cannot be empty".to_string(),
            });
        }

        errors
    }
}

/// Tracking and sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Identifier of the tracked subject, set by the external setup flow.
    pub subject_id: String,
    /// Base URL of the remote sink. When unset, drain passes report zero
    /// attempts instead of sending doomed requests.
    pub base_url: Option<String>,
    /// Seconds between capture ticks.
    pub sample_interval: u64,
    /// Seconds the location provider is given to produce a fix.
    pub fix_timeout: u64,
    /// Milliseconds between delivery attempts within a drain pass.
    pub sync_pace_ms: u64,
    /// Days synced events are retained before being purged.
    pub retention_days: u64,
    /// HTTP connect and read timeout in seconds.
    pub http_timeout: u64,
    /// Seconds between reachability probes.
    pub probe_interval: u64,
    /// Seconds between periodic background drains (0 disables the sweep).
    pub sweep_interval: u64,
    /// Reverse-geocoding endpoint; unset leaves place names at the sentinel.
    pub geocoder_url: Option<String>,
    /// Fixed coordinates for deployments without a live fix source.
    pub fixed_position: Option<FixedPosition>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            subject_id: "unknown".to_string(),
            base_url: None,
            sample_interval: 10,
            fix_timeout: 15,
            sync_pace_ms: 1000,
            retention_days: 30,
            http_timeout: 10,
            probe_interval: 5,
            sweep_interval: 0,
            geocoder_url: None,
            fixed_position: None,
        }
    }
}

impl TrackingConfig {
    /// Validate tracking configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.subject_id.is_empty() {
            errors.push(ValidationError {
                field: "tracking.subject_id".to_string(),
                message: "subject id cannot be empty".to_string(),
            });
        }

        if let Some(url) = &self.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                errors.push(ValidationError {
                    field: "tracking.base_url".to_string(),
                    message: format!("invalid base URL '{}': expected http(s) scheme", url),
                });
            }
        }

        if self.sample_interval == 0 {
            errors.push(ValidationError {
                field: "tracking.sample_interval".to_string(),
                message: "sample interval must be at least 1 second".to_string(),
            });
        }

        if self.sync_pace_ms == 0 {
            errors.push(ValidationError {
                field: "tracking.sync_pace_ms".to_string(),
                message: "sync pacing must be at least 1 millisecond".to_string(),
            });
        }

        if self.retention_days == 0 {
            errors.push(ValidationError {
                field: "tracking.retention_days".to_string(),
                message: "retention window must be at least 1 day".to_string(),
            });
        }

        if self.http_timeout == 0 {
            errors.push(ValidationError {
                field: "tracking.http_timeout".to_string(),
                message: "http timeout must be at least 1 second".to_string(),
            });
        }

        errors
    }
}

/// A fixed provider position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FixedPosition {
    pub latitude: f64,
    pub longitude: f64,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `server.bind` or `tracking.base_url`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tracklog")
        .join("service.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server.bind, "127.0.0.1:8085");
        assert_eq!(config.tracking.sample_interval, 10);
        assert_eq!(config.tracking.retention_days, 30);
        assert!(config.tracking.base_url.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_tracking_defaults_from_empty_toml() {
        let config: TrackingConfig = toml::from_str("").unwrap();
        assert_eq!(config.subject_id, "unknown");
        assert_eq!(config.sync_pace_ms, 1000);
        assert_eq!(config.http_timeout, 10);
        assert_eq!(config.sweep_interval, 0);
    }

    #[test]
    fn test_tracking_config_serde() {
        let toml = r#"
            subject_id = "42"
            base_url = "https://tracker.example.com"
            sample_interval = 30

            [fixed_position]
            latitude = 51.5
            longitude = -0.12
        "#;
        let config: TrackingConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.subject_id, "42");
        assert_eq!(
            config.base_url.as_deref(),
            Some("https://tracker.example.com")
        );
        assert_eq!(config.sample_interval, 30);
        let fixed = config.fixed_position.unwrap();
        assert_eq!(fixed.latitude, 51.5);
    }

    #[test]
    fn test_validate_rejects_bad_bind() {
        let mut config = Config::default();
        config.server.bind = "no-port".to_string();
        assert!(config.validate().is_err());

        config.server.bind = "127.0.0.1:notaport".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let mut config = Config::default();
        config.tracking.base_url = Some("ftp://tracker.example.com".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tracking.base_url"));
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        let mut config = Config::default();
        config.tracking.sample_interval = 0;
        config.tracking.retention_days = 0;
        match config.validate().unwrap_err() {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("service.toml");

        let mut config = Config::default();
        config.server.bind = "0.0.0.0:9090".to_string();
        config.tracking.subject_id = "42".to_string();
        config.tracking.base_url = Some("https://tracker.example.com/".to_string());

        config.save(&config_path).unwrap();
        let loaded = Config::load(&config_path).unwrap();

        assert_eq!(loaded.server.bind, "0.0.0.0:9090");
        assert_eq!(loaded.tracking.subject_id, "42");
        assert_eq!(
            loaded.tracking.base_url.as_deref(),
            Some("https://tracker.example.com/")
        );
    }
}
