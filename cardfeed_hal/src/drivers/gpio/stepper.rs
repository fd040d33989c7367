//! Step/dir stepper on sysfs GPIO (DRV8825 / A4988 class drivers).

use super::sysfs::{PinMode, SysfsPin};
use cardfeed_common::hal::config::HardwareConfig;
use cardfeed_common::hal::driver::{Actuator, HalError};
use cardfeed_common::hal::types::{Direction, StepProfile};
use std::thread;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Bit-banged step/dir stepper.
///
/// The driver's SLEEP input doubles as holding torque: high keeps the coils
/// energised, low lets the transport roll free.
#[derive(Debug)]
pub struct StepperActuator {
    dir: SysfsPin,
    step: SysfsPin,
    mode: [SysfsPin; 3],
    sleep: SysfsPin,
    invert_direction: bool,
    profile: Option<StepProfile>,
    holding: bool,
}

impl StepperActuator {
    /// Open every stepper output, all driven low (driver asleep).
    pub fn open(hw: &HardwareConfig) -> Result<Self, HalError> {
        let out = |bcm| SysfsPin::open(&hw.sysfs_root, hw.gpio_base, bcm, PinMode::OutputLow);
        let pins = &hw.pins;
        Ok(Self {
            dir: out(pins.dir)?,
            step: out(pins.step)?,
            mode: [out(pins.mode[0])?, out(pins.mode[1])?, out(pins.mode[2])?],
            sleep: out(pins.sleep)?,
            invert_direction: hw.invert_direction,
            profile: None,
            holding: false,
        })
    }

    fn select_profile(&mut self, profile: StepProfile) -> Result<(), HalError> {
        if self.profile == Some(profile) {
            return Ok(());
        }
        for (pin, level) in self.mode.iter_mut().zip(profile.mode_levels()) {
            pin.write(level)?;
        }
        trace!("Step profile {}", profile);
        self.profile = Some(profile);
        Ok(())
    }

    fn pulse(&mut self, step_delay: Duration) -> Result<(), HalError> {
        self.step.write(true)?;
        thread::sleep(step_delay);
        self.step.write(false)?;
        thread::sleep(step_delay);
        Ok(())
    }
}

impl Actuator for StepperActuator {
    fn advance(
        &mut self,
        direction: Direction,
        profile: StepProfile,
        steps: u32,
        step_delay: Duration,
    ) -> Result<(), HalError> {
        let fault = |e: HalError| HalError::ActuatorFault(e.to_string());

        if !self.holding {
            self.set_holding(true)?;
        }
        self.select_profile(profile).map_err(fault)?;
        // Forward is the driver's counter-clockwise, i.e. DIR low.
        let level = (direction == Direction::Backward) ^ self.invert_direction;
        self.dir.write(level).map_err(fault)?;

        debug!("Stepper {:?} {} x{}", direction, profile, steps);
        for _ in 0..steps {
            self.pulse(step_delay).map_err(fault)?;
        }
        Ok(())
    }

    fn set_holding(&mut self, engaged: bool) -> Result<(), HalError> {
        self.sleep
            .write(engaged)
            .map_err(|e| HalError::ActuatorFault(e.to_string()))?;
        self.holding = engaged;
        Ok(())
    }
}

impl Drop for StepperActuator {
    fn drop(&mut self) {
        if let Err(e) = self.sleep.write(false) {
            warn!("Failed to release stepper on shutdown: {}", e);
        }
    }
}
