//! GPIO driver module.
//!
//! Linux sysfs GPIO for the occupancy sensors, a step/dir stepper driver and
//! the illumination LED; stills come from an external capture command.

mod camera;
mod sensors;
mod stepper;
mod sysfs;

pub use camera::CommandCamera;
pub use sensors::GpioSensorPanel;
pub use stepper::StepperActuator;
pub use sysfs::{PinMode, SysfsPin};

use crate::driver_registry::Rig;
use cardfeed_common::config::CardfeedConfig;
use cardfeed_common::hal::driver::HalError;
use tracing::{info, warn};

/// Registry name of this driver.
pub const DRIVER_NAME: &str = "gpio";

/// Factory function to create a GPIO-backed rig.
pub fn create_rig(config: &CardfeedConfig) -> Result<Rig, HalError> {
    let hw = &config.hardware;
    if !hw.sysfs_root.is_dir() {
        return Err(HalError::InitFailed(format!(
            "sysfs GPIO root {} not found",
            hw.sysfs_root.display()
        )));
    }
    if !detect_rt_mode() {
        warn!("Not running under a real-time scheduler; step timing may jitter");
    }

    let sensors = GpioSensorPanel::open(hw)?;
    let actuator = StepperActuator::open(hw)?;
    let camera = CommandCamera::open(hw)?;
    info!(
        "GPIO rig created: sensors {:?} ({:?}), camera `{}`",
        hw.pins.sensors, hw.sensor_logic, hw.camera.command
    );

    Ok(Rig {
        driver: DRIVER_NAME,
        sensors: Box::new(sensors),
        actuator: Box::new(actuator),
        camera: Box::new(camera),
    })
}

/// Detect if running in real-time mode by checking scheduler policy.
fn detect_rt_mode() -> bool {
    #[cfg(target_os = "linux")]
    {
        use libc::{SCHED_FIFO, SCHED_RR, sched_getscheduler};
        // SAFETY: sched_getscheduler(0) only queries the calling thread.
        let policy = unsafe { sched_getscheduler(0) };
        policy == SCHED_FIFO || policy == SCHED_RR
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}
