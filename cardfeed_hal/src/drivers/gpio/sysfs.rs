//! Linux sysfs GPIO pins.
//!
//! `<root>/export`, `<root>/gpioN/direction` and `<root>/gpioN/value` are plain
//! files, so the same code runs against a fake tree in tests.

use cardfeed_common::hal::driver::HalError;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// udev needs a moment to fix permissions after export.
const EXPORT_RETRIES: u32 = 10;
const EXPORT_RETRY_PAUSE: Duration = Duration::from_millis(10);

/// Pin direction and, for outputs, the initial level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    /// Input.
    Input,
    /// Output, driven low on open.
    OutputLow,
}

impl PinMode {
    fn as_sysfs(self) -> &'static str {
        match self {
            Self::Input => "in",
            Self::OutputLow => "low",
        }
    }
}

/// One exported sysfs GPIO line with an open `value` file.
#[derive(Debug)]
pub struct SysfsPin {
    bcm: u32,
    value: File,
}

impl SysfsPin {
    /// Export (if needed) and configure BCM pin `bcm`.
    ///
    /// The sysfs number is `gpio_base + bcm`.
    pub fn open(root: &Path, gpio_base: u32, bcm: u32, mode: PinMode) -> Result<Self, HalError> {
        let number = gpio_base + bcm;
        let dir = root.join(format!("gpio{number}"));
        if !dir.exists() {
            export(root, number, bcm)?;
        }

        let direction = dir.join("direction");
        let mut attempt = 0;
        loop {
            match fs::write(&direction, mode.as_sysfs()) {
                Ok(()) => break,
                Err(e) if attempt < EXPORT_RETRIES => {
                    debug!("gpio{}: direction not writable yet ({})", number, e);
                    attempt += 1;
                    thread::sleep(EXPORT_RETRY_PAUSE);
                }
                Err(e) => return Err(gpio_err(bcm, &direction, e)),
            }
        }

        let value_path = dir.join("value");
        let value = OpenOptions::new()
            .read(true)
            .write(mode != PinMode::Input)
            .open(&value_path)
            .map_err(|e| gpio_err(bcm, &value_path, e))?;

        debug!("GPIO {} (sysfs {}) opened as {:?}", bcm, number, mode);
        Ok(Self { bcm, value })
    }

    /// BCM number of this pin.
    pub fn bcm(&self) -> u32 {
        self.bcm
    }

    /// Read the current level.
    pub fn read(&self) -> Result<bool, HalError> {
        let mut buf = [0u8; 4];
        let mut file = &self.value;
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.read(&mut buf))
            .map_err(|e| HalError::Gpio {
                pin: self.bcm,
                reason: e.to_string(),
            })
            .and_then(|n| match buf[..n].first() {
                Some(b'0') => Ok(false),
                Some(b'1') => Ok(true),
                _ => Err(HalError::Gpio {
                    pin: self.bcm,
                    reason: format!("unexpected value {:?}", &buf[..n]),
                }),
            })
    }

    /// Drive an output pin.
    pub fn write(&mut self, level: bool) -> Result<(), HalError> {
        let byte: &[u8] = if level { b"1" } else { b"0" };
        self.value
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.value.write_all(byte))
            .map_err(|e| HalError::Gpio {
                pin: self.bcm,
                reason: e.to_string(),
            })
    }
}

fn export(root: &Path, number: u32, bcm: u32) -> Result<(), HalError> {
    let export = root.join("export");
    fs::write(&export, number.to_string()).map_err(|e| gpio_err(bcm, &export, e))?;
    let dir = root.join(format!("gpio{number}"));
    for _ in 0..EXPORT_RETRIES {
        if dir.exists() {
            return Ok(());
        }
        thread::sleep(EXPORT_RETRY_PAUSE);
    }
    Err(HalError::Gpio {
        pin: bcm,
        reason: format!("{} did not appear after export", dir.display()),
    })
}

fn gpio_err(bcm: u32, path: &Path, e: std::io::Error) -> HalError {
    HalError::Gpio {
        pin: bcm,
        reason: format!("{}: {}", path.display(), e),
    }
}
