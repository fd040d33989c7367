//! Configuration loading traits and types.
//!
//! This module provides the top-level `CardfeedConfig` file layout and a
//! standardized way to load TOML configuration files.
//!
//! # Usage
//!
//! ```rust,no_run
//! use cardfeed_common::config::{load_config, ConfigError};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = load_config(Path::new("/etc/cardfeed/cardfeed.toml"))?;
//!     println!("Driver: {}", config.hardware.driver);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::consts::{DEFAULT_SERVICE_NAME, MAX_TIMEOUT_S, POLL_PAUSE_DEFAULT};
use crate::control_unit::config::{CaptureConfig, MotionConfig, TimeoutConfig};
use crate::hal::config::HardwareConfig;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_string()
}

/// Common fields for logging and identification.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "cardfeed-desk-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: default_service_name(),
        }
    }
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Seconds from the config file as a `Duration`, clamped to `[0, MAX_TIMEOUT_S]`.
///
/// Never panics; `NaN` maps to zero.
pub fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.clamp(0.0, MAX_TIMEOUT_S)).unwrap_or_default()
}

fn default_true() -> bool {
    true
}

fn default_disabled_poll() -> f64 {
    POLL_PAUSE_DEFAULT
}

/// `[supervisor]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Run the control loop as soon as the supervisor starts.
    #[serde(default = "default_true")]
    pub start_enabled: bool,

    /// Sleep between loop heads while disabled [s].
    #[serde(default = "default_disabled_poll")]
    pub disabled_poll: f64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            start_enabled: true,
            disabled_poll: default_disabled_poll(),
        }
    }
}

impl SupervisorConfig {
    pub fn disabled_poll(&self) -> Duration {
        seconds(self.disabled_poll)
    }
}

/// Complete configuration file.
///
/// Every section is optional; an empty file yields the calibrated defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CardfeedConfig {
    #[serde(default)]
    pub shared: SharedConfig,
    #[serde(default)]
    pub hardware: HardwareConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

impl CardfeedConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.hardware
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        self.motion.validate().map_err(ConfigError::ValidationError)?;
        self.timeouts
            .validate()
            .map_err(ConfigError::ValidationError)?;
        self.capture
            .validate()
            .map_err(ConfigError::ValidationError)?;
        let poll = self.supervisor.disabled_poll;
        if !poll.is_finite() || poll <= 0.0 || poll > MAX_TIMEOUT_S {
            return Err(ConfigError::ValidationError(format!(
                "supervisor.disabled_poll must be in (0, {MAX_TIMEOUT_S}], got {}",
                self.supervisor.disabled_poll
            )));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// Blanket-implemented for any `serde::de::DeserializeOwned` type.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

/// Load and validate a `CardfeedConfig` from `path`.
pub fn load_config(path: &Path) -> Result<CardfeedConfig, ConfigError> {
    let config = CardfeedConfig::load(path)?;
    config.validate()?;
    tracing::debug!(
        "Loaded configuration from {:?}: driver={}, service={}",
        path,
        config.hardware.driver,
        config.shared.service_name
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_log_level_default() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }

    #[test]
    fn test_log_level_serialization() {
        #[derive(Serialize)]
        struct TestWrapper {
            level: LogLevel,
        }

        let wrapper = TestWrapper {
            level: LogLevel::Trace,
        };
        assert!(toml::to_string(&wrapper).unwrap().contains("trace"));

        let wrapper = TestWrapper {
            level: LogLevel::Warn,
        };
        assert!(toml::to_string(&wrapper).unwrap().contains("warn"));
    }

    #[test]
    fn test_empty_service_name_rejected() {
        let shared = SharedConfig {
            log_level: LogLevel::Info,
            service_name: String::new(),
        };
        assert!(matches!(
            shared.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = CardfeedConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.supervisor.start_enabled);
    }

    #[test]
    fn test_load_missing_file() {
        let result = CardfeedConfig::load(Path::new("/nonexistent/cardfeed.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound)));
    }

    #[test]
    fn test_load_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[shared\nlog_level = ").unwrap();
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_unknown_section_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[scanner]\nspeed = 3").unwrap();
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_disabled_poll_must_be_positive() {
        let mut config = CardfeedConfig::default();
        config.supervisor.disabled_poll = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
