//! Hardware capability traits and error types.
//!
//! This module defines:
//! - `SensorPanel` - binary occupancy sensors along the transport path
//! - `Actuator` - the stepper-driven transport
//! - `CaptureDevice` - still camera, illumination and marker location
//! - `HalError` - error type for all hardware operations
//!
//! The control unit is generic over these traits; `cardfeed_hal` provides a
//! GPIO-backed implementation and a deterministic simulation.
//!
//! # Blocking Contracts
//!
//! | Operation | Blocks for |
//! |-----------|------------|
//! | `occupied()` | one input read |
//! | `advance()` | the physical duration of the motion |
//! | `capture_still()` | one exposure, bounded by the camera timeout |
//! | `locate_marker()` | CPU-bound decode of one region |

use crate::hal::types::{
    Direction, DynamicImage, MarkerLocation, MoveSpec, Sensor, SensorMask, StepProfile,
};
use std::time::Duration;
use thiserror::Error;

/// Error types for hardware operations.
#[derive(Debug, Clone, Error)]
pub enum HalError {
    /// Driver initialization failed
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// GPIO access failed
    #[error("GPIO {pin}: {reason}")]
    Gpio { pin: u32, reason: String },

    /// Actuator could not complete a motion
    #[error("Actuator fault: {0}")]
    ActuatorFault(String),

    /// Capture device failed to produce an image
    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    /// Driver not found
    #[error("Driver not found: {0}")]
    DriverNotFound(String),
}

/// Binary occupancy sensors along the transport path.
///
/// All reads are instantaneous; no debouncing or history.
pub trait SensorPanel: Send {
    /// Whether the card currently covers `sensor`.
    fn occupied(&self, sensor: Sensor) -> bool;

    /// Whether every sensor in `set` is occupied.
    fn all_occupied(&self, set: SensorMask) -> bool {
        set.sensors().all(|s| self.occupied(s))
    }

    /// Whether no sensor in `set` is occupied.
    fn none_occupied(&self, set: SensorMask) -> bool {
        set.sensors().all(|s| !self.occupied(s))
    }

    /// Read every sensor once.
    fn snapshot(&self) -> SensorMask {
        SensorMask::all()
            .sensors()
            .filter(|s| self.occupied(*s))
            .fold(SensorMask::empty(), |acc, s| acc | s.mask())
    }
}

/// The stepper-driven card transport.
pub trait Actuator: Send {
    /// Advance the transport by `steps` at `profile` resolution.
    ///
    /// Blocks until the motion completes. Each step takes two `step_delay`s.
    fn advance(
        &mut self,
        direction: Direction,
        profile: StepProfile,
        steps: u32,
        step_delay: Duration,
    ) -> Result<(), HalError>;

    /// Engage (`true`) or release (`false`) holding torque.
    fn set_holding(&mut self, engaged: bool) -> Result<(), HalError>;

    /// Execute a configured move.
    fn run(&mut self, direction: Direction, spec: &MoveSpec) -> Result<(), HalError> {
        self.advance(direction, spec.profile, spec.steps, spec.step_delay())
    }
}

/// Still camera with card illumination and orientation-marker location.
pub trait CaptureDevice: Send {
    /// Capture one still image.
    fn capture_still(&mut self) -> Result<DynamicImage, HalError>;

    /// Locate an orientation marker within `region`.
    ///
    /// Returns `None` when no marker can be found and decoded.
    fn locate_marker(&self, region: &DynamicImage) -> Option<MarkerLocation>;

    /// Switch the illumination indicator.
    fn set_illumination(&mut self, on: bool) -> Result<(), HalError>;
}

impl<T: SensorPanel + ?Sized> SensorPanel for Box<T> {
    fn occupied(&self, sensor: Sensor) -> bool {
        (**self).occupied(sensor)
    }
}

impl<T: Actuator + ?Sized> Actuator for Box<T> {
    fn advance(
        &mut self,
        direction: Direction,
        profile: StepProfile,
        steps: u32,
        step_delay: Duration,
    ) -> Result<(), HalError> {
        (**self).advance(direction, profile, steps, step_delay)
    }

    fn set_holding(&mut self, engaged: bool) -> Result<(), HalError> {
        (**self).set_holding(engaged)
    }
}

impl<T: CaptureDevice + ?Sized> CaptureDevice for Box<T> {
    fn capture_still(&mut self) -> Result<DynamicImage, HalError> {
        (**self).capture_still()
    }

    fn locate_marker(&self, region: &DynamicImage) -> Option<MarkerLocation> {
        (**self).locate_marker(region)
    }

    fn set_illumination(&mut self, on: bool) -> Result<(), HalError> {
        (**self).set_illumination(on)
    }
}
