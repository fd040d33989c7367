//! System-wide constants for the cardfeed workspace.
//!
//! Single source of truth for default pins, timings and paths.
//! Configuration defaults and drivers import from here.

use static_assertions::const_assert;

/// Number of occupancy sensors along the transport path (s0..s3).
pub const SENSOR_COUNT: usize = 4;

// SensorMask packs one bit per sensor into a u8.
const_assert!(SENSOR_COUNT <= 8);

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/cardfeed/cardfeed.toml";

/// Default service name used in logs.
pub const DEFAULT_SERVICE_NAME: &str = "cardfeed";

// ─── GPIO (BCM numbering) ───────────────────────────────────────────

/// Stepper direction pin.
pub const DEFAULT_PIN_DIR: u32 = 4;
/// Stepper step pin.
pub const DEFAULT_PIN_STEP: u32 = 17;
/// Stepper micro-step mode pins (M0, M1, M2).
pub const DEFAULT_PIN_MODE: [u32; 3] = [22, 27, 18];
/// Occupancy sensor pins, s0..s3 in feed order.
pub const DEFAULT_PIN_SENSORS: [u32; SENSOR_COUNT] = [16, 19, 20, 21];
/// Stepper driver sleep pin (high = awake, holding torque).
pub const DEFAULT_PIN_SLEEP: u32 = 23;
/// Illumination LED pin.
pub const DEFAULT_PIN_LED: u32 = 12;

/// Default sysfs GPIO root.
pub const DEFAULT_SYSFS_ROOT: &str = "/sys/class/gpio";

// ─── Motion ─────────────────────────────────────────────────────────

/// Default delay between step edges [µs].
pub const DEFAULT_STEP_DELAY_US: u64 = 300;

/// Step delay for the fast pull-through after collection [µs].
pub const PULL_THROUGH_STEP_DELAY_US: u64 = 80;

// ─── Timeouts [s] ───────────────────────────────────────────────────

/// Feeding loop timeout.
pub const FEED_TIMEOUT_DEFAULT: f64 = 5.0;
/// Aligning loop timeout.
pub const ALIGN_TIMEOUT_DEFAULT: f64 = 5.0;
/// Positioning phases timeout.
pub const POSITION_TIMEOUT_DEFAULT: f64 = 10.0;
/// Collecting loop timeout.
pub const COLLECT_TIMEOUT_DEFAULT: f64 = 5.0;
/// Ejecting motion timeout.
pub const EJECT_MOTION_TIMEOUT_DEFAULT: f64 = 5.0;
/// Wait for the user to take an ejected card.
pub const EJECT_REMOVAL_TIMEOUT_DEFAULT: f64 = 60.0;
/// Wait for the accept/reject decision.
pub const FEEDBACK_TIMEOUT_DEFAULT: f64 = 120.0;
/// Pause between idle / error / removal sensor polls.
pub const POLL_PAUSE_DEFAULT: f64 = 0.1;

/// Camera command timeout.
pub const CAPTURE_TIMEOUT_DEFAULT: f64 = 10.0;

/// Upper bound for every configured timeout and pause (one day).
pub const MAX_TIMEOUT_S: f64 = 86_400.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pins_are_unique() {
        let mut pins = vec![DEFAULT_PIN_DIR, DEFAULT_PIN_STEP, DEFAULT_PIN_SLEEP, DEFAULT_PIN_LED];
        pins.extend_from_slice(&DEFAULT_PIN_MODE);
        pins.extend_from_slice(&DEFAULT_PIN_SENSORS);
        let count = pins.len();
        pins.sort_unstable();
        pins.dedup();
        assert_eq!(pins.len(), count);
    }

    #[test]
    fn removal_wait_outlasts_motion_timeouts() {
        assert!(EJECT_REMOVAL_TIMEOUT_DEFAULT > EJECT_MOTION_TIMEOUT_DEFAULT);
        assert!(FEEDBACK_TIMEOUT_DEFAULT > POSITION_TIMEOUT_DEFAULT);
    }
}
