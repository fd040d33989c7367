//! Hardware-facing value types: sensors, sensor masks, step profiles,
//! transport direction and marker locations.

use bitflags::bitflags;
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use image::DynamicImage;

use crate::consts::{DEFAULT_STEP_DELAY_US, SENSOR_COUNT};

// ─── Sensor ─────────────────────────────────────────────────────────

/// Occupancy sensor along the transport path, ordered from the insertion slot inwards.
///
/// `S0` and `S1` sit side by side at the slot; a card only counts as inserted
/// when both see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Sensor {
    S0 = 0,
    S1 = 1,
    S2 = 2,
    S3 = 3,
}

impl Sensor {
    /// All sensors in feed order.
    pub const ALL: [Sensor; SENSOR_COUNT] = [Sensor::S0, Sensor::S1, Sensor::S2, Sensor::S3];

    /// Zero-based index into pin tables.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Single-bit mask for this sensor.
    #[inline]
    pub const fn mask(self) -> SensorMask {
        SensorMask::from_bits_truncate(1 << self as u8)
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.index())
    }
}

bitflags! {
    /// Set of occupancy sensors.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SensorMask: u8 {
        const S0 = 0x01;
        const S1 = 0x02;
        const S2 = 0x04;
        const S3 = 0x08;
        /// Both slot sensors.
        const ENTRY = Self::S0.bits() | Self::S1.bits();
        /// Slot sensors plus the first inner sensor (card pushed back in).
        const REINSERTED = Self::ENTRY.bits() | Self::S2.bits();
    }
}

impl SensorMask {
    /// Iterate the sensors contained in this mask, in feed order.
    pub fn sensors(self) -> impl Iterator<Item = Sensor> {
        Sensor::ALL.into_iter().filter(move |s| self.contains(s.mask()))
    }
}

impl From<Sensor> for SensorMask {
    fn from(sensor: Sensor) -> Self {
        sensor.mask()
    }
}

// ─── Direction ──────────────────────────────────────────────────────

/// Transport direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Pull the card inwards, away from the slot.
    Forward,
    /// Push the card back towards the slot.
    Backward,
}

// ─── StepProfile ────────────────────────────────────────────────────

/// Micro-stepping resolution of the stepper driver.
///
/// Serialized with the names used on DRV8825 data sheets (`"full"`, `"half"`, `"1/4"` …).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepProfile {
    #[serde(rename = "full")]
    Full,
    #[serde(rename = "half")]
    Half,
    #[serde(rename = "1/4")]
    Quarter,
    #[serde(rename = "1/8")]
    Eighth,
    #[serde(rename = "1/16")]
    Sixteenth,
    #[serde(rename = "1/32")]
    ThirtySecond,
}

impl StepProfile {
    /// Finest supported resolution; positions are tracked in these units.
    pub const FINEST: StepProfile = StepProfile::ThirtySecond;

    /// Micro-steps per full step.
    #[inline]
    pub const fn microsteps(self) -> u32 {
        match self {
            Self::Full => 1,
            Self::Half => 2,
            Self::Quarter => 4,
            Self::Eighth => 8,
            Self::Sixteenth => 16,
            Self::ThirtySecond => 32,
        }
    }

    /// Distance of one step in units of the finest resolution.
    #[inline]
    pub const fn travel_per_step(self) -> u32 {
        Self::FINEST.microsteps() / self.microsteps()
    }

    /// DRV8825 mode pin levels (M0, M1, M2).
    pub const fn mode_levels(self) -> [bool; 3] {
        match self {
            Self::Full => [false, false, false],
            Self::Half => [true, false, false],
            Self::Quarter => [false, true, false],
            Self::Eighth => [true, true, false],
            Self::Sixteenth => [false, false, true],
            Self::ThirtySecond => [true, false, true],
        }
    }
}

impl fmt::Display for StepProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Half => write!(f, "half"),
            other => write!(f, "1/{}", other.microsteps()),
        }
    }
}

impl FromStr for StepProfile {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Self::Full),
            "half" => Ok(Self::Half),
            "1/4" => Ok(Self::Quarter),
            "1/8" => Ok(Self::Eighth),
            "1/16" => Ok(Self::Sixteenth),
            "1/32" => Ok(Self::ThirtySecond),
            _ => Err(format!("unknown StepProfile: {s:?}")),
        }
    }
}

// ─── MoveSpec ───────────────────────────────────────────────────────

fn default_step_delay_us() -> u64 {
    DEFAULT_STEP_DELAY_US
}

/// One actuator command: how many steps, at which resolution and speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveSpec {
    /// Micro-stepping resolution.
    pub profile: StepProfile,
    /// Number of steps at `profile` resolution.
    pub steps: u32,
    /// Delay between step edges [µs]; one step takes two delays.
    #[serde(default = "default_step_delay_us")]
    pub step_delay_us: u64,
}

impl MoveSpec {
    /// Move at the default step delay.
    pub const fn new(profile: StepProfile, steps: u32) -> Self {
        Self {
            profile,
            steps,
            step_delay_us: DEFAULT_STEP_DELAY_US,
        }
    }

    /// Same move with a different step delay.
    pub const fn with_delay_us(mut self, step_delay_us: u64) -> Self {
        self.step_delay_us = step_delay_us;
        self
    }

    #[inline]
    pub const fn step_delay(&self) -> Duration {
        Duration::from_micros(self.step_delay_us)
    }

    /// Travel of the whole move in finest-resolution units.
    #[inline]
    pub const fn travel(&self) -> u64 {
        self.steps as u64 * self.profile.travel_per_step() as u64
    }
}

// ─── Marker ─────────────────────────────────────────────────────────

/// A decoded orientation marker, located inside a searched image region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerLocation {
    /// Marker centre, x pixel within the region.
    pub x: u32,
    /// Marker centre, y pixel within the region.
    pub y: u32,
    /// Decoded marker content.
    pub payload: String,
}
