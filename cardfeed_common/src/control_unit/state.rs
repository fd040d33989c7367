//! Externally visible controller phase.
//!
//! `Phase` uses `#[repr(u8)]` so the supervisor can publish it through an
//! atomic without locking.

use core::fmt;
use serde::{Deserialize, Serialize};

/// Coarse phase published to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Phase {
    /// Control loop paused by the host.
    Disabled = 0,
    /// Waiting for a card.
    Enabled = 1,
    /// A card is being fed, scanned, collected or ejected.
    Scanning = 2,
    /// Jam or timeout; waiting for the transport to be cleared by hand.
    Error = 3,
}

impl Phase {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Disabled),
            1 => Some(Self::Enabled),
            2 => Some(Self::Scanning),
            3 => Some(Self::Error),
            _ => None,
        }
    }
}

impl Default for Phase {
    fn default() -> Self {
        Self::Disabled
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Enabled => write!(f, "enabled"),
            Self::Scanning => write!(f, "scanning"),
            Self::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_u8_round_trip() {
        for phase in [Phase::Disabled, Phase::Enabled, Phase::Scanning, Phase::Error] {
            assert_eq!(Phase::from_u8(phase as u8), Some(phase));
        }
        assert_eq!(Phase::from_u8(4), None);
    }

    #[test]
    fn default_is_disabled() {
        assert_eq!(Phase::default(), Phase::Disabled);
    }
}
