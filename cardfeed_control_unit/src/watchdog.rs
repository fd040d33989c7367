//! Per-state elapsed-time tracking.
//!
//! Every handler that polls in a loop calls [`Watchdog::reset_for`] before the
//! loop and [`Watchdog::expired`] inside it on every iteration.

use crate::state::MechState;
use std::time::{Duration, Instant};

/// Deadline tracker for the running state.
#[derive(Debug, Clone, Copy)]
pub struct Watchdog {
    state: MechState,
    started: Instant,
}

impl Watchdog {
    /// Watchdog started now for `state`.
    pub fn new(state: MechState) -> Self {
        Self {
            state,
            started: Instant::now(),
        }
    }

    /// Restart timing for `state`.
    #[inline]
    pub fn reset_for(&mut self, state: MechState) {
        self.state = state;
        self.started = Instant::now();
    }

    /// Whether `timeout` has elapsed since the last reset.
    #[inline]
    pub fn expired(&self, timeout: Duration) -> bool {
        self.started.elapsed() >= timeout
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// State the watchdog was last reset for.
    #[inline]
    pub fn state(&self) -> MechState {
        self.state
    }
}
