//! Occupancy sensors on sysfs GPIO inputs.

use super::sysfs::{PinMode, SysfsPin};
use cardfeed_common::hal::config::{HardwareConfig, SensorLogic};
use cardfeed_common::hal::driver::{HalError, SensorPanel};
use cardfeed_common::hal::types::Sensor;
use tracing::warn;

/// Four digital occupancy inputs with configured polarity.
#[derive(Debug)]
pub struct GpioSensorPanel {
    pins: [SysfsPin; 4],
    logic: SensorLogic,
}

impl GpioSensorPanel {
    /// Open every sensor input.
    pub fn open(hw: &HardwareConfig) -> Result<Self, HalError> {
        let input = |s: Sensor| {
            SysfsPin::open(&hw.sysfs_root, hw.gpio_base, hw.pins.sensor(s), PinMode::Input)
        };
        Ok(Self {
            pins: [
                input(Sensor::S0)?,
                input(Sensor::S1)?,
                input(Sensor::S2)?,
                input(Sensor::S3)?,
            ],
            logic: hw.sensor_logic,
        })
    }
}

impl SensorPanel for GpioSensorPanel {
    /// An unreadable input counts as occupied: loops waiting for a clear
    /// path then run into their watchdog instead of moving a card blind.
    fn occupied(&self, sensor: Sensor) -> bool {
        match self.pins[sensor.index()].read() {
            Ok(level) => self.logic.occupied(level),
            Err(e) => {
                warn!("Sensor {} unreadable, assuming occupied: {}", sensor, e);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardfeed_common::hal::types::SensorMask;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn fake_inputs(root: &Path, hw: &HardwareConfig, levels: [&str; 4]) {
        for (pin, value) in hw.pins.sensors.iter().zip(levels) {
            let dir = root.join(format!("gpio{pin}"));
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("direction"), "in").unwrap();
            fs::write(dir.join("value"), value).unwrap();
        }
    }

    #[test]
    fn normally_open_reads_high_as_occupied() {
        let tmp = TempDir::new().unwrap();
        let hw = HardwareConfig {
            sysfs_root: tmp.path().to_path_buf(),
            ..HardwareConfig::default()
        };
        fake_inputs(tmp.path(), &hw, ["1", "1", "0", "0"]);
        let panel = GpioSensorPanel::open(&hw).unwrap();
        assert_eq!(panel.snapshot(), SensorMask::ENTRY);
    }

    #[test]
    fn normally_closed_inverts() {
        let tmp = TempDir::new().unwrap();
        let hw = HardwareConfig {
            sysfs_root: tmp.path().to_path_buf(),
            sensor_logic: SensorLogic::NC,
            ..HardwareConfig::default()
        };
        fake_inputs(tmp.path(), &hw, ["1", "1", "0", "0"]);
        let panel = GpioSensorPanel::open(&hw).unwrap();
        assert_eq!(panel.snapshot(), SensorMask::S2 | SensorMask::S3);
    }

    #[test]
    fn unreadable_input_counts_as_occupied() {
        let tmp = TempDir::new().unwrap();
        let hw = HardwareConfig {
            sysfs_root: tmp.path().to_path_buf(),
            ..HardwareConfig::default()
        };
        fake_inputs(tmp.path(), &hw, ["0", "0", "?", "0"]);
        let panel = GpioSensorPanel::open(&hw).unwrap();
        assert!(panel.occupied(Sensor::S2));
        assert!(!panel.occupied(Sensor::S3));
    }
}
