//! Simulation driver module.
//!
//! This module provides a software simulation driver for development and testing
//! without physical hardware: a single-card track model behind `SensorPanel` and
//! `Actuator`, and a camera that paints a marker into a chosen capture region.

mod camera;
mod track;

pub use camera::{
    CameraHandle, MarkerPlacement, SIM_FRAME_HEIGHT, SIM_FRAME_WIDTH, SIM_MARKER_PAYLOAD,
    SimCamera,
};
pub use track::{
    MOVE_LOG_CAPACITY, MoveRecord, SimActuator, SimSensorPanel, SimTransport, TrackGeometry,
    TrackHandle,
};

use crate::driver_registry::Rig;
use cardfeed_common::config::CardfeedConfig;
use cardfeed_common::hal::driver::HalError;
use tracing::info;

/// Registry name of this driver.
pub const DRIVER_NAME: &str = "simulation";

/// Operator-side handles of a simulated rig.
#[derive(Debug, Clone)]
pub struct SimulationHandles {
    /// Card placement, sensor overrides, move log.
    pub track: TrackHandle,
    /// Marker placement and capture faults.
    pub camera: CameraHandle,
}

/// Simulated rig builder.
pub struct SimulationRig;

impl SimulationRig {
    /// Build a rig on the default track geometry, keeping the handles.
    pub fn build(config: &CardfeedConfig) -> (Rig, SimulationHandles) {
        Self::build_with(config, TrackGeometry::default())
    }

    /// Build a rig on a custom track geometry, keeping the handles.
    pub fn build_with(
        config: &CardfeedConfig,
        geometry: TrackGeometry,
    ) -> (Rig, SimulationHandles) {
        let transport = SimTransport::new(geometry);
        let camera = SimCamera::new(config.capture);
        let handles = SimulationHandles {
            track: transport.handle(),
            camera: camera.handle(),
        };
        let rig = Rig {
            driver: DRIVER_NAME,
            sensors: Box::new(transport.sensors()),
            actuator: Box::new(transport.actuator()),
            camera: Box::new(camera),
        };
        (rig, handles)
    }
}

/// Factory function to create a simulated rig.
///
/// Moves take their physical duration so the control loop runs at hardware
/// speed; nothing drives the handles, so the track stays empty.
pub fn create_rig(config: &CardfeedConfig) -> Result<Rig, HalError> {
    let (rig, handles) = SimulationRig::build(config);
    handles.track.set_pace(true);
    info!("Simulation rig created (geometry {:?})", handles.track.geometry());
    Ok(rig)
}
