//! Controller and demo configuration.

use super::state::CameraSelector;
use crate::device::MockCameraConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for a [`PreviewController`](super::PreviewController).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// How long open and close wait for the device permit, in milliseconds.
    pub lock_timeout_ms: u64,
    /// How long shutdown waits for a pending open to resolve, in milliseconds.
    pub shutdown_timeout_ms: u64,
    /// Camera opened until the selector is changed.
    pub default_selector: CameraSelector,
    /// Name of the background thread.
    pub worker_name: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 2500,
            shutdown_timeout_ms: 10_000,
            default_selector: CameraSelector::Forward,
            worker_name: "camera-background".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Creates a configuration with the given permit timeout.
    pub fn with_lock_timeout(timeout: Duration) -> Self {
        Self {
            lock_timeout_ms: timeout.as_millis().try_into().unwrap_or(u64::MAX),
            ..Default::default()
        }
    }

    /// Permit timeout as a duration.
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Upper bound on how long shutdown waits for a pending open.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lock_timeout_ms == 0 {
            return Err(ConfigError::InvalidLockTimeout);
        }
        if self.shutdown_timeout_ms == 0 {
            return Err(ConfigError::InvalidShutdownTimeout);
        }
        if self.worker_name.is_empty() {
            return Err(ConfigError::InvalidWorkerName);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("lock timeout must be greater than zero")]
    InvalidLockTimeout,
    #[error("shutdown timeout must be greater than zero")]
    InvalidShutdownTimeout,
    #[error("worker thread name must not be empty")]
    InvalidWorkerName,
    #[error("invalid preview target dimensions")]
    InvalidDimensions,
    #[error("duplicate camera id: {0}")]
    DuplicateCamera(String),
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub target: TargetConfig,
    /// Mock cameras; empty means the two default mock cameras.
    #[serde(default)]
    pub cameras: Vec<MockCameraConfig>,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Preview surface dimensions used by the demo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Metrics output configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetricsConfig {
    /// Metrics server port (0 to disable).
    pub port: u16,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.controller.validate()?;
        if self.target.width == 0 || self.target.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        for (i, camera) in self.cameras.iter().enumerate() {
            if self.cameras[..i].iter().any(|other| other.id == camera.id) {
                return Err(ConfigError::DuplicateCamera(camera.id.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::OpenBehavior;
    use crate::negotiation::Size;

    #[test]
    fn test_default_config_valid() {
        let config = ControllerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lock_timeout(), Duration::from_millis(2500));
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(10));
        assert_eq!(config.default_selector, CameraSelector::Forward);
    }

    #[test]
    fn test_zero_timeout_invalid() {
        let config = ControllerConfig::with_lock_timeout(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLockTimeout)
        ));

        let config = ControllerConfig {
            shutdown_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidShutdownTimeout)
        ));
    }

    #[test]
    fn test_parse_file_config() {
        let config = FileConfig::from_toml(
            r#"
            [controller]
            lock_timeout_ms = 500
            default_selector = "primary"

            [target]
            width = 720
            height = 1280

            [[cameras]]
            id = "back"
            sizes = [{ width = 1920, height = 1080 }, { width = 1280, height = 720 }]

            [[cameras]]
            id = "front"
            behavior = { error = 4 }
            "#,
        )
        .unwrap();

        assert_eq!(config.controller.lock_timeout(), Duration::from_millis(500));
        assert_eq!(config.controller.default_selector, CameraSelector::Primary);
        assert_eq!(config.target.height, 1280);
        assert_eq!(config.cameras.len(), 2);
        assert_eq!(config.cameras[0].sizes[1], Size::new(1280, 720));
        assert_eq!(config.cameras[1].behavior, OpenBehavior::Error(4));
        assert_eq!(config.cameras[1].sizes.len(), 4);
        assert_eq!(config.metrics.port, 0);
    }

    #[test]
    fn test_duplicate_camera_rejected() {
        let result = FileConfig::from_toml(
            r#"
            [[cameras]]
            id = "0"
            [[cameras]]
            id = "0"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::DuplicateCamera(id)) if id == "0"));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            FileConfig::from_toml("controller = 3"),
            Err(ConfigError::ParseError(_))
        ));
    }
}
