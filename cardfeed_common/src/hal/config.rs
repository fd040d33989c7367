//! HAL configuration types.
//!
//! This module contains configuration types for the hardware layer:
//! - `HardwareConfig` - driver selection and the `[hardware]` section
//! - `PinMap` - logical signal → BCM GPIO binding, immutable after load
//! - `SensorLogic` - occupancy sensor polarity
//! - `CameraConfig` - still-capture command

use crate::config::seconds;
use crate::consts::{
    CAPTURE_TIMEOUT_DEFAULT, DEFAULT_PIN_DIR, DEFAULT_PIN_LED, DEFAULT_PIN_MODE,
    DEFAULT_PIN_SENSORS, DEFAULT_PIN_SLEEP, DEFAULT_PIN_STEP, DEFAULT_SYSFS_ROOT, MAX_TIMEOUT_S,
    SENSOR_COUNT,
};
use crate::hal::driver::HalError;
use crate::hal::types::Sensor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

fn default_driver() -> String {
    "gpio".to_string()
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from(DEFAULT_SYSFS_ROOT)
}

/// `[hardware]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareConfig {
    /// Driver name ("gpio" or "simulation").
    #[serde(default = "default_driver")]
    pub driver: String,

    /// sysfs GPIO root directory.
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: PathBuf,

    /// Offset added to BCM numbers to get sysfs GPIO numbers
    /// (e.g. 512 on kernels that number the SoC chip from 512).
    #[serde(default)]
    pub gpio_base: u32,

    /// Occupancy sensor polarity.
    #[serde(default)]
    pub sensor_logic: SensorLogic,

    /// Swap the direction pin level.
    #[serde(default)]
    pub invert_direction: bool,

    /// Pin assignment.
    #[serde(default)]
    pub pins: PinMap,

    /// Still-capture command.
    #[serde(default)]
    pub camera: CameraConfig,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            driver: default_driver(),
            sysfs_root: default_sysfs_root(),
            gpio_base: 0,
            sensor_logic: SensorLogic::default(),
            invert_direction: false,
            pins: PinMap::default(),
            camera: CameraConfig::default(),
        }
    }
}

impl HardwareConfig {
    /// Validate the hardware section.
    ///
    /// # Validation Rules
    /// 1. `driver` is not empty
    /// 2. All pins are distinct
    /// 3. `camera.command` is not empty, `camera.timeout_s` in (0, `MAX_TIMEOUT_S`]
    pub fn validate(&self) -> Result<(), HalError> {
        if self.driver.is_empty() {
            return Err(HalError::ConfigError("driver cannot be empty".to_string()));
        }

        self.pins.validate()?;

        if self.camera.command.is_empty() {
            return Err(HalError::ConfigError(
                "camera.command cannot be empty".to_string(),
            ));
        }
        let timeout = self.camera.timeout_s;
        if !(timeout > 0.0 && timeout <= MAX_TIMEOUT_S) {
            return Err(HalError::ConfigError(format!(
                "camera.timeout_s must be in (0, {MAX_TIMEOUT_S}], got {}",
                self.camera.timeout_s
            )));
        }
        Ok(())
    }
}

// ─── PinMap ─────────────────────────────────────────────────────────

/// Binding of logical signals to BCM GPIO numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinMap {
    /// Stepper direction output.
    pub dir: u32,
    /// Stepper step output.
    pub step: u32,
    /// Micro-step mode outputs (M0, M1, M2).
    pub mode: [u32; 3],
    /// Occupancy sensor inputs, s0..s3.
    pub sensors: [u32; SENSOR_COUNT],
    /// Stepper driver sleep output (high = awake).
    pub sleep: u32,
    /// Illumination LED output.
    pub led: u32,
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            dir: DEFAULT_PIN_DIR,
            step: DEFAULT_PIN_STEP,
            mode: DEFAULT_PIN_MODE,
            sensors: DEFAULT_PIN_SENSORS,
            sleep: DEFAULT_PIN_SLEEP,
            led: DEFAULT_PIN_LED,
        }
    }
}

impl PinMap {
    /// Input pin of an occupancy sensor.
    #[inline]
    pub fn sensor(&self, sensor: Sensor) -> u32 {
        self.sensors[sensor.index()]
    }

    /// Every pin with its role name, outputs first.
    pub fn named(&self) -> Vec<(String, u32)> {
        let mut pins = vec![
            ("dir".to_string(), self.dir),
            ("step".to_string(), self.step),
            ("sleep".to_string(), self.sleep),
            ("led".to_string(), self.led),
        ];
        for (idx, pin) in self.mode.iter().enumerate() {
            pins.push((format!("mode{idx}"), *pin));
        }
        for sensor in Sensor::ALL {
            pins.push((sensor.to_string(), self.sensor(sensor)));
        }
        pins
    }

    /// Reject a pin bound to more than one role.
    pub fn validate(&self) -> Result<(), HalError> {
        let mut seen: HashMap<u32, String> = HashMap::new();
        for (role, pin) in self.named() {
            if let Some(previous) = seen.insert(pin, role.clone()) {
                return Err(HalError::ConfigError(format!(
                    "GPIO {pin} assigned to both {previous} and {role}"
                )));
            }
        }
        Ok(())
    }
}

// ─── SensorLogic ────────────────────────────────────────────────────

/// Occupancy sensor polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SensorLogic {
    /// Normally Open: input high when a card is present.
    #[default]
    #[serde(rename = "NO")]
    NO,
    /// Normally Closed: input low when a card is present.
    #[serde(rename = "NC")]
    NC,
}

impl SensorLogic {
    /// Interpret a raw input level.
    #[inline]
    pub const fn occupied(self, level: bool) -> bool {
        match self {
            Self::NO => level,
            Self::NC => !level,
        }
    }
}

// ─── CameraConfig ───────────────────────────────────────────────────

fn default_camera_command() -> String {
    "libcamera-still".to_string()
}

fn default_camera_args() -> Vec<String> {
    ["-n", "-t", "1", "-e", "jpg", "-o", "-"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_camera_timeout() -> f64 {
    CAPTURE_TIMEOUT_DEFAULT
}

/// External still-capture command writing one encoded image to stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_camera_command")]
    pub command: String,
    #[serde(default = "default_camera_args")]
    pub args: Vec<String>,
    /// Kill the command after this many seconds.
    #[serde(default = "default_camera_timeout")]
    pub timeout_s: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            command: default_camera_command(),
            args: default_camera_args(),
            timeout_s: default_camera_timeout(),
        }
    }
}

impl CameraConfig {
    #[inline]
    pub fn timeout(&self) -> Duration {
        seconds(self.timeout_s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_hardware_config_is_valid() {
        let config = HardwareConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pins.sensor(Sensor::S2), 20);
    }

    #[test]
    fn duplicate_pin_rejected() {
        let mut config = HardwareConfig::default();
        config.pins.led = config.pins.sensors[0];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("s0"));
        assert!(err.to_string().contains("led"));
    }

    #[test]
    fn sensor_logic_inverts_for_nc() {
        assert!(SensorLogic::NO.occupied(true));
        assert!(!SensorLogic::NC.occupied(true));
        assert!(SensorLogic::NC.occupied(false));
    }

    #[test]
    fn partial_pin_table_keeps_defaults() {
        let config: HardwareConfig = toml::from_str(
            r#"
driver = "simulation"
sensor_logic = "NC"

[pins]
led = 5
"#,
        )
        .unwrap();
        assert_eq!(config.driver, "simulation");
        assert_eq!(config.sensor_logic, SensorLogic::NC);
        assert_eq!(config.pins.led, 5);
        assert_eq!(config.pins.step, DEFAULT_PIN_STEP);
        assert_eq!(config.camera.command, "libcamera-still");
    }

    #[test]
    fn non_positive_camera_timeout_rejected() {
        let mut config = HardwareConfig::default();
        config.camera.timeout_s = 0.0;
        assert!(matches!(config.validate(), Err(HalError::ConfigError(_))));
        config.camera.timeout_s = 1e20;
        assert!(matches!(config.validate(), Err(HalError::ConfigError(_))));
    }
}
