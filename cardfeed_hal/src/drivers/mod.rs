//! Driver implementations.
//!
//! - [`gpio`] - Linux sysfs GPIO sensors and stepper, external still-capture command
//! - [`simulation`] - Deterministic software transport for development and testing
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement the capability traits from `cardfeed_common::hal::driver`
//! 3. Provide a `create_rig` factory and register it in `register_all_drivers()`

pub mod gpio;
pub mod simulation;

use crate::driver_registry::DriverRegistry;

/// Register all built-in drivers.
pub fn register_all_drivers(registry: &mut DriverRegistry) {
    for (name, factory) in [
        (gpio::DRIVER_NAME, gpio::create_rig as crate::driver_registry::RigFactory),
        (simulation::DRIVER_NAME, simulation::create_rig),
    ] {
        if let Err(e) = registry.register(name, factory) {
            tracing::warn!("Skipping driver registration: {}", e);
        }
    }
}
