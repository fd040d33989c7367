//! Internal mechanical state and its mapping to the published phase.

use cardfeed_common::control_unit::state::Phase;
use core::fmt;
use serde::Serialize;

/// Where the card is in its cycle.
///
/// Owned and mutated only by the controller; the host only ever sees the
/// coarser [`Phase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MechState {
    /// Waiting for a card in the slot.
    Idle,
    /// Pulling the card in until it reaches s2.
    Feeding,
    /// Pulling the card in until it reaches s3.
    Aligning,
    /// Overshoot and backlash-free re-approach to the capture point.
    Positioning,
    /// Single-shot capture and orientation decision.
    Capturing,
    /// Blocking on the accept/reject decision.
    AwaitingFeedback,
    /// Pulling the card through into the tray.
    Collecting,
    /// Pushing the card back out of the slot and waiting for removal.
    Ejecting,
    /// Quarantine: no motion until every sensor is clear.
    Error,
}

impl MechState {
    /// Published phase for this state.
    pub const fn phase(self) -> Phase {
        match self {
            Self::Idle => Phase::Enabled,
            Self::Error => Phase::Error,
            _ => Phase::Scanning,
        }
    }
}

impl fmt::Display for MechState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Feeding => "feeding",
            Self::Aligning => "aligning",
            Self::Positioning => "positioning",
            Self::Capturing => "capturing",
            Self::AwaitingFeedback => "awaiting_feedback",
            Self::Collecting => "collecting",
            Self::Ejecting => "ejecting",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_mapping() {
        assert_eq!(MechState::Idle.phase(), Phase::Enabled);
        assert_eq!(MechState::Error.phase(), Phase::Error);
        for state in [
            MechState::Feeding,
            MechState::Aligning,
            MechState::Positioning,
            MechState::Capturing,
            MechState::AwaitingFeedback,
            MechState::Collecting,
            MechState::Ejecting,
        ] {
            assert_eq!(state.phase(), Phase::Scanning, "{state}");
        }
    }
}
