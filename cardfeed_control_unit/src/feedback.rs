//! Accept/reject hand-off between the host and the control loop.
//!
//! A durable one-shot slot guarded by a mutex, with a condition variable to
//! wake the waiting controller. A decision signalled before the controller
//! starts waiting stays in the slot until consumed; the slot is only emptied
//! explicitly with [`FeedbackChannel::clear`] or by consuming it.

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Human verdict on a captured card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Keep the card: collect it into the tray.
    Accepted,
    /// Return the card through the slot.
    Rejected,
}

/// Single-slot feedback channel. An empty slot means pending.
#[derive(Debug, Default)]
pub struct FeedbackChannel {
    slot: Mutex<Option<Decision>>,
    wake: Condvar,
}

impl FeedbackChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a decision and wake the waiter.
    ///
    /// The first decision of a cycle wins; later ones are ignored until the
    /// slot is cleared. Returns whether `decision` was recorded.
    pub fn signal(&self, decision: Decision) -> bool {
        let mut slot = self.slot.lock();
        if let Some(existing) = *slot {
            warn!("Ignoring {:?}: already {:?}", decision, existing);
            return false;
        }
        *slot = Some(decision);
        self.wake.notify_all();
        debug!("Feedback: {:?}", decision);
        true
    }

    /// `signal(Accepted)`.
    pub fn accept(&self) -> bool {
        self.signal(Decision::Accepted)
    }

    /// `signal(Rejected)`.
    pub fn reject(&self) -> bool {
        self.signal(Decision::Rejected)
    }

    /// Reset to pending before a new capture cycle.
    pub fn clear(&self) {
        *self.slot.lock() = None;
    }

    /// Current slot content without consuming it.
    pub fn peek(&self) -> Option<Decision> {
        *self.slot.lock()
    }

    /// Block until a decision is available or `timeout` elapses.
    ///
    /// Consumes the decision. Returns `None` on timeout. A timeout past the
    /// end of the clock waits without a deadline.
    pub fn await_decision(&self, timeout: Duration) -> Option<Decision> {
        let deadline = Instant::now().checked_add(timeout);
        let mut slot = self.slot.lock();
        while slot.is_none() {
            match deadline {
                Some(deadline) => {
                    if self.wake.wait_until(&mut slot, deadline).timed_out() {
                        break;
                    }
                }
                None => self.wake.wait(&mut slot),
            }
        }
        slot.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn signal_before_wait_is_not_lost() {
        let channel = FeedbackChannel::new();
        assert!(channel.accept());
        assert_eq!(
            channel.await_decision(Duration::from_millis(10)),
            Some(Decision::Accepted)
        );
        // Consumed.
        assert_eq!(channel.peek(), None);
    }

    #[test]
    fn unbounded_timeout_waits_for_signal() {
        let channel = Arc::new(FeedbackChannel::new());
        let signaller = Arc::clone(&channel);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            signaller.accept();
        });
        assert_eq!(
            channel.await_decision(Duration::MAX),
            Some(Decision::Accepted)
        );
        handle.join().unwrap();
    }

    #[test]
    fn signal_during_wait_wakes_waiter() {
        let channel = Arc::new(FeedbackChannel::new());
        let signaller = Arc::clone(&channel);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            signaller.reject();
        });
        let start = Instant::now();
        let decision = channel.await_decision(Duration::from_secs(5));
        handle.join().unwrap();
        assert_eq!(decision, Some(Decision::Rejected));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn timeout_returns_none() {
        let channel = FeedbackChannel::new();
        let start = Instant::now();
        assert_eq!(channel.await_decision(Duration::from_millis(50)), None);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn first_decision_wins_until_cleared() {
        let channel = FeedbackChannel::new();
        assert!(channel.reject());
        assert!(!channel.accept());
        assert_eq!(channel.peek(), Some(Decision::Rejected));
        channel.clear();
        assert!(channel.accept());
        assert_eq!(channel.peek(), Some(Decision::Accepted));
    }
}
