//! # Cardfeed HAL Library
//!
//! Hardware drivers implementing the capability traits defined in
//! `cardfeed_common::hal::driver`.
//!
//! # Module Structure
//!
//! - [`driver_registry`] - Driver factory registration, builds a [`Rig`]
//! - [`drivers`] - Driver implementations (`gpio`, `simulation`)
//! - [`marker`] - QR orientation-marker location
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                    cardfeed_hal (single crate)                 │
//! │  ┌──────────────────┐        ┌──────────────────────────────┐  │
//! │  │  DriverRegistry  │──────► │  Rig                         │  │
//! │  │  "gpio"          │        │   sensors:  dyn SensorPanel  │  │
//! │  │  "simulation"    │        │   actuator: dyn Actuator     │  │
//! │  └──────────────────┘        │   camera:   dyn CaptureDevice│  │
//! │                              └──────────────────────────────┘  │
//! └────────────────────────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod driver_registry;
pub mod drivers;
pub mod marker;

// Re-export key types for convenience
pub use crate::driver_registry::{DriverRegistry, Rig, RigFactory};
