//! Driver registry for hardware drivers.
//!
//! Provides a `DriverRegistry` struct for registering and retrieving rig
//! factories. Constructor-injected; no global state.

use cardfeed_common::config::CardfeedConfig;
use cardfeed_common::hal::driver::{Actuator, CaptureDevice, HalError, SensorPanel};
use std::collections::HashMap;
use std::fmt;

use crate::drivers::register_all_drivers;

/// One instance of each hardware capability, produced by a driver.
pub struct Rig {
    /// Name of the driver that built this rig.
    pub driver: &'static str,
    /// Occupancy sensors.
    pub sensors: Box<dyn SensorPanel>,
    /// Transport stepper.
    pub actuator: Box<dyn Actuator>,
    /// Camera and illumination.
    pub camera: Box<dyn CaptureDevice>,
}

impl fmt::Debug for Rig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rig").field("driver", &self.driver).finish_non_exhaustive()
    }
}

/// Factory function type for building a rig from configuration.
pub type RigFactory = fn(&CardfeedConfig) -> Result<Rig, HalError>;

/// Registry of available drivers.
///
/// Constructed at startup, populated via `register()`, consulted once to
/// build the rig. Testable in isolation.
pub struct DriverRegistry {
    factories: HashMap<&'static str, RigFactory>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry holding every built-in driver.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        register_all_drivers(&mut registry);
        registry
    }

    /// Register a driver factory.
    ///
    /// # Errors
    /// Returns `HalError::InitFailed` if a driver with the same name is already registered.
    pub fn register(&mut self, name: &'static str, factory: RigFactory) -> Result<(), HalError> {
        if self.factories.contains_key(name) {
            return Err(HalError::InitFailed(format!(
                "Driver '{name}' is already registered"
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Get a driver factory by name.
    pub fn get_factory(&self, name: &str) -> Option<RigFactory> {
        self.factories.get(name).copied()
    }

    /// Whether a driver with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Build a rig with the named driver.
    ///
    /// # Errors
    /// Returns `HalError::DriverNotFound` if no driver with the given name is
    /// registered, or the driver's own initialization error.
    pub fn create_rig(&self, name: &str, config: &CardfeedConfig) -> Result<Rig, HalError> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| HalError::DriverNotFound(name.to_string()))?;
        factory(config)
    }

    /// List all registered driver names, sorted.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing_factory(_config: &CardfeedConfig) -> Result<Rig, HalError> {
        Err(HalError::InitFailed("no hardware".to_string()))
    }

    #[test]
    fn builtin_drivers_registered() {
        let reg = DriverRegistry::with_builtin();
        assert_eq!(reg.list_drivers(), vec!["gpio", "simulation"]);
    }

    #[test]
    fn registry_driver_not_found() {
        let reg = DriverRegistry::new();
        let result = reg.create_rig("nonexistent", &CardfeedConfig::default());
        assert!(matches!(result, Err(HalError::DriverNotFound(_))));
    }

    #[test]
    fn registry_duplicate_rejected() {
        let mut reg = DriverRegistry::new();
        reg.register("test", failing_factory).unwrap();
        assert!(reg.register("test", failing_factory).is_err());
    }

    #[test]
    fn factory_error_propagates() {
        let mut reg = DriverRegistry::new();
        reg.register("test", failing_factory).unwrap();
        let result = reg.create_rig("test", &CardfeedConfig::default());
        assert!(matches!(result, Err(HalError::InitFailed(_))));
    }

    #[test]
    fn simulation_rig_builds() {
        let reg = DriverRegistry::with_builtin();
        let rig = reg
            .create_rig("simulation", &CardfeedConfig::default())
            .expect("simulation needs no hardware");
        assert_eq!(rig.driver, "simulation");
        assert!(rig.sensors.snapshot().is_empty());
    }
}
