//! Prelude module for common re-exports.
//!
//! ```rust
//! use cardfeed_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    CardfeedConfig, ConfigError, ConfigLoader, LogLevel, SharedConfig, SupervisorConfig,
    load_config,
};
pub use crate::control_unit::config::{CaptureConfig, MotionConfig, Region, TimeoutConfig};
pub use crate::hal::config::{CameraConfig, HardwareConfig, PinMap, SensorLogic};

// ─── Hardware ───────────────────────────────────────────────────────
pub use crate::hal::driver::{Actuator, CaptureDevice, HalError, SensorPanel};
pub use crate::hal::types::{
    Direction, DynamicImage, MarkerLocation, MoveSpec, Sensor, SensorMask, StepProfile,
};

// ─── Phase ──────────────────────────────────────────────────────────
pub use crate::control_unit::state::Phase;

// ─── Constants ──────────────────────────────────────────────────────
pub use crate::consts::{DEFAULT_CONFIG_PATH, SENSOR_COUNT};
