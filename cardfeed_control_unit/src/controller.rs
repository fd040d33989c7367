//! The card state machine.
//!
//! [`Controller::step`] runs exactly one state handler to completion and
//! returns the published phase. Handlers that move the card run a bounded
//! inner loop: the watchdog is reset on entry and checked on every iteration,
//! so no call to `step` can outlive the configured timeouts by more than one
//! motion increment.
//!
//! | State | Exit |
//! |---|---|
//! | Idle | s0∧s1 → Feeding; injected capture → Capturing |
//! | Feeding | timeout → Error; ¬(s0∧s1) → Idle; s2 → Aligning |
//! | Aligning | timeout → Error; ¬s2 → Feeding; s3 → Positioning |
//! | Positioning | timeout → Error; done → Capturing |
//! | Capturing | marker → AwaitingFeedback; no marker or device fault → Ejecting |
//! | AwaitingFeedback | accept or no answer → Collecting; reject → Ejecting |
//! | Collecting | timeout → Error; done → Idle |
//! | Ejecting | motion timeout → Error; s0∧s1∧s2 → Aligning; all clear → Idle; not taken → Collecting |
//! | Error | all clear → Idle |
//!
//! Hardware faults never leave `step`: they are logged and become a
//! transition to Error.

use cardfeed_common::config::CardfeedConfig;
use cardfeed_common::control_unit::config::{CaptureConfig, MotionConfig, TimeoutConfig};
use cardfeed_common::control_unit::state::Phase;
use cardfeed_common::hal::driver::{Actuator, CaptureDevice, HalError, SensorPanel};
use cardfeed_common::hal::types::{Direction, MoveSpec, Sensor, SensorMask};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::capture::{self, CaptureCallback, CaptureInjector, CaptureOutcome};
use crate::feedback::{Decision, FeedbackChannel};
use crate::state::MechState;
use crate::watchdog::Watchdog;

/// Card state machine over one set of hardware capabilities.
pub struct Controller<S, A, C> {
    sensors: S,
    actuator: A,
    camera: C,

    motion: MotionConfig,
    timeouts: TimeoutConfig,
    regions: CaptureConfig,

    state: MechState,
    watchdog: Watchdog,
    feedback: Arc<FeedbackChannel>,
    injector: CaptureInjector,
    callback: Option<CaptureCallback>,

    /// Cycle started by an injection with no card in the slot.
    simulated_cycle: bool,
    /// Travel since the positioning reference edge [1/32 step].
    reference_offset: i64,
    steps: u64,
}

impl<S, A, C> Controller<S, A, C>
where
    S: SensorPanel,
    A: Actuator,
    C: CaptureDevice,
{
    /// Controller over the given hardware, initial state read from the sensors.
    ///
    /// A card already sitting in the slot resumes at Aligning.
    pub fn new(sensors: S, actuator: A, camera: C, config: &CardfeedConfig) -> Self {
        let initial = if sensors.occupied(Sensor::S0) || sensors.occupied(Sensor::S1) {
            MechState::Aligning
        } else {
            MechState::Idle
        };
        info!("Controller starting in {}", initial);

        Self {
            sensors,
            actuator,
            camera,
            motion: config.motion.clone(),
            timeouts: config.timeouts.clone(),
            regions: config.capture,
            state: initial,
            watchdog: Watchdog::new(initial),
            feedback: Arc::new(FeedbackChannel::new()),
            injector: CaptureInjector::new(),
            callback: None,
            simulated_cycle: false,
            reference_offset: 0,
            steps: 0,
        }
    }

    /// Install the host capture callback.
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: FnMut(CaptureOutcome) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Current internal state.
    pub fn state(&self) -> MechState {
        self.state
    }

    /// Published phase of the current state.
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Number of completed `step` calls.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Travel since the positioning reference edge, in 1/32 steps.
    ///
    /// Right after Positioning this is always `-capture_offset`.
    pub fn reference_offset(&self) -> i64 {
        self.reference_offset
    }

    /// Shared accept/reject channel.
    pub fn feedback(&self) -> Arc<FeedbackChannel> {
        Arc::clone(&self.feedback)
    }

    /// Shared simulated-capture injection point.
    pub fn injector(&self) -> CaptureInjector {
        self.injector.clone()
    }

    /// Run one state handler and return the resulting phase.
    pub fn step(&mut self) -> Phase {
        let current = self.state;
        let next = match self.run_handler(current) {
            Ok(next) => next,
            Err(e) => {
                error!("Hardware fault in {}: {}", current, e);
                MechState::Error
            }
        };

        // Motor is released after every step.
        if let Err(e) = self.actuator.set_holding(false) {
            warn!("Failed to release holding torque: {}", e);
        }

        if next != current {
            debug!("{} -> {}", current, next);
        }
        self.state = next;
        self.steps += 1;
        next.phase()
    }

    fn run_handler(&mut self, state: MechState) -> Result<MechState, HalError> {
        match state {
            MechState::Idle => self.idle(),
            MechState::Feeding => self.feeding(),
            MechState::Aligning => self.aligning(),
            MechState::Positioning => self.positioning(),
            MechState::Capturing => self.capturing(),
            MechState::AwaitingFeedback => Ok(self.awaiting_feedback()),
            MechState::Collecting => self.collecting(),
            MechState::Ejecting => self.ejecting(),
            MechState::Error => self.error(),
        }
    }

    // ─── Handlers ───────────────────────────────────────────────────

    fn idle(&mut self) -> Result<MechState, HalError> {
        self.simulated_cycle = false;
        if self.sensors.all_occupied(SensorMask::ENTRY) {
            info!("Card inserted");
            return Ok(MechState::Feeding);
        }
        if self.injector.is_pending() {
            info!("Simulated capture requested");
            self.simulated_cycle = true;
            return Ok(MechState::Capturing);
        }
        thread::sleep(self.timeouts.idle_poll());
        Ok(MechState::Idle)
    }

    fn feeding(&mut self) -> Result<MechState, HalError> {
        let limit = self.timeouts.feed();
        self.enter_motion(MechState::Feeding)?;
        loop {
            self.drive(Direction::Forward, self.motion.feed)?;
            if self.watchdog.expired(limit) {
                return Ok(self.timed_out(limit));
            }
            if !self.sensors.all_occupied(SensorMask::ENTRY) {
                info!("Card withdrawn while feeding");
                return Ok(MechState::Idle);
            }
            if self.sensors.occupied(Sensor::S2) {
                return Ok(MechState::Aligning);
            }
        }
    }

    fn aligning(&mut self) -> Result<MechState, HalError> {
        let limit = self.timeouts.align();
        self.enter_motion(MechState::Aligning)?;
        loop {
            self.drive(Direction::Forward, self.motion.align)?;
            if self.watchdog.expired(limit) {
                return Ok(self.timed_out(limit));
            }
            if !self.sensors.occupied(Sensor::S2) {
                return Ok(MechState::Feeding);
            }
            if self.sensors.occupied(Sensor::S3) {
                return Ok(MechState::Positioning);
            }
        }
    }

    /// Step counts, not sensor edges, define the capture point: the trailing
    /// edge is run past the slot pair, overshot, and re-approached from the
    /// far side in fine steps before the fixed offset back.
    fn positioning(&mut self) -> Result<MechState, HalError> {
        let limit = self.timeouts.position();
        self.enter_motion(MechState::Positioning)?;

        loop {
            self.drive(Direction::Forward, self.motion.position_advance)?;
            if self.watchdog.expired(limit) {
                return Ok(self.timed_out(limit));
            }
            if self.sensors.none_occupied(SensorMask::ENTRY) {
                break;
            }
        }

        self.drive(Direction::Forward, self.motion.position_overshoot)?;

        loop {
            self.drive(Direction::Backward, self.motion.position_approach)?;
            if self.watchdog.expired(limit) {
                return Ok(self.timed_out(limit));
            }
            if self.sensors.all_occupied(SensorMask::ENTRY) {
                break;
            }
        }

        self.reference_offset = 0;
        self.drive(Direction::Backward, self.motion.capture_offset)?;
        debug!("At capture point, offset {}", self.reference_offset);
        Ok(MechState::Capturing)
    }

    fn capturing(&mut self) -> Result<MechState, HalError> {
        // New cycle: forget any decision from the previous card.
        self.feedback.clear();
        self.actuator.set_holding(false)?;
        self.illuminate(true);

        // A request made during a real card's cycle waits for the next Idle.
        let injected = if self.simulated_cycle {
            self.injector.take().and_then(|injection| injection.image)
        } else {
            None
        };
        let frame = match injected {
            Some(image) => {
                info!("Using injected frame");
                Ok(image)
            }
            None => self.camera.capture_still(),
        };
        let outcome = match frame {
            Ok(image) => capture::orient(&self.camera, image, &self.regions),
            Err(e) => {
                warn!("Capture failed: {}", e);
                CaptureOutcome::device_failure()
            }
        };
        self.illuminate(false);

        let success = outcome.success;
        self.deliver(outcome);
        Ok(if success {
            MechState::AwaitingFeedback
        } else {
            MechState::Ejecting
        })
    }

    fn awaiting_feedback(&mut self) -> MechState {
        let limit = self.timeouts.feedback();
        self.watchdog.reset_for(MechState::AwaitingFeedback);
        match self.feedback.await_decision(limit) {
            Some(Decision::Accepted) => {
                info!("Card accepted");
                MechState::Collecting
            }
            Some(Decision::Rejected) => {
                info!("Card rejected");
                MechState::Ejecting
            }
            None => {
                warn!("No feedback within {:?}, collecting", limit);
                MechState::Collecting
            }
        }
    }

    fn collecting(&mut self) -> Result<MechState, HalError> {
        if self.simulated_cycle {
            debug!("Simulated cycle, nothing to collect");
            return Ok(MechState::Idle);
        }
        let limit = self.timeouts.collect();
        self.enter_motion(MechState::Collecting)?;
        loop {
            self.drive(Direction::Forward, self.motion.collect)?;
            if self.watchdog.expired(limit) {
                return Ok(self.timed_out(limit));
            }
            if !self.sensors.occupied(Sensor::S2) {
                break;
            }
        }
        self.drive(Direction::Forward, self.motion.collect_pull_through)?;
        info!("Card collected");
        Ok(MechState::Idle)
    }

    fn ejecting(&mut self) -> Result<MechState, HalError> {
        if self.simulated_cycle {
            debug!("Simulated cycle, nothing to eject");
            return Ok(MechState::Idle);
        }
        let limit = self.timeouts.eject_motion();
        self.enter_motion(MechState::Ejecting)?;
        self.drive(Direction::Backward, self.motion.eject_offset)?;
        loop {
            if self.watchdog.expired(limit) {
                return Ok(self.timed_out(limit));
            }
            if !self.sensors.occupied(Sensor::S2) {
                break;
            }
            self.drive(Direction::Backward, self.motion.eject_approach)?;
        }
        self.drive(Direction::Backward, self.motion.eject_push)?;
        self.actuator.set_holding(false)?;

        let removal = self.timeouts.eject_removal();
        let poll = self.timeouts.removal_poll();
        self.watchdog.reset_for(MechState::Ejecting);
        info!("Card ejected, waiting up to {:?} for removal", removal);
        loop {
            if self.sensors.all_occupied(SensorMask::REINSERTED) {
                info!("Card pushed back in, rescanning");
                return Ok(MechState::Aligning);
            }
            if self.sensors.none_occupied(SensorMask::all()) {
                info!("Card removed");
                return Ok(MechState::Idle);
            }
            if self.watchdog.expired(removal) {
                warn!("Card not taken within {:?}, collecting", removal);
                return Ok(MechState::Collecting);
            }
            thread::sleep(poll);
        }
    }

    /// No motion here: wait for a human to clear the path.
    fn error(&mut self) -> Result<MechState, HalError> {
        self.actuator.set_holding(false)?;
        if self.sensors.none_occupied(SensorMask::all()) {
            info!("Transport clear, leaving error state");
            return Ok(MechState::Idle);
        }
        thread::sleep(self.timeouts.error_poll());
        Ok(MechState::Error)
    }

    // ─── Helpers ────────────────────────────────────────────────────

    fn enter_motion(&mut self, state: MechState) -> Result<(), HalError> {
        self.watchdog.reset_for(state);
        self.actuator.set_holding(true)
    }

    fn drive(&mut self, direction: Direction, spec: MoveSpec) -> Result<(), HalError> {
        self.actuator.run(direction, &spec)?;
        let travel = spec.travel() as i64;
        self.reference_offset += match direction {
            Direction::Forward => travel,
            Direction::Backward => -travel,
        };
        Ok(())
    }

    fn timed_out(&self, limit: Duration) -> MechState {
        warn!(
            "{} timed out after {:?} (limit {:?}), sensors {:?}",
            self.watchdog.state(),
            self.watchdog.elapsed(),
            limit,
            self.sensors.snapshot()
        );
        MechState::Error
    }

    fn illuminate(&mut self, on: bool) {
        if let Err(e) = self.camera.set_illumination(on) {
            warn!("Illumination {}: {}", if on { "on" } else { "off" }, e);
        }
    }

    fn deliver(&mut self, outcome: CaptureOutcome) {
        let Some(callback) = self.callback.as_mut() else {
            return;
        };
        if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| callback(outcome))) {
            error!("Capture callback panicked: {}", panic_message(&*panic));
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
