//! Simulated card transport.
//!
//! A single card on a straight track. Positions are in units of the finest
//! micro-step (1/32 step), measured from the insertion slot in feed direction.
//! A sensor at position `p` is occupied when `trailing <= p <= leading`.
//!
//! `SimTransport` owns the shared state and hands out the sensor panel, the
//! actuator and a `TrackHandle` that tests use to play the human operator.

use cardfeed_common::consts::SENSOR_COUNT;
use cardfeed_common::hal::driver::{Actuator, HalError, SensorPanel};
use cardfeed_common::hal::types::{Direction, Sensor, StepProfile};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Most recent `advance` calls kept for inspection.
pub const MOVE_LOG_CAPACITY: usize = 1024;

/// Sensor positions and card length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackGeometry {
    /// Sensor positions s0..s3.
    pub sensors: [i64; SENSOR_COUNT],
    /// Card length along the feed direction.
    pub card_length: i64,
}

impl Default for TrackGeometry {
    /// Slot pair just inside the slot, s2/s3 further in, A6-ish card.
    fn default() -> Self {
        Self {
            sensors: [200, 200, 2000, 3200],
            card_length: 4800,
        }
    }
}

impl TrackGeometry {
    /// Leading-edge position of a freshly inserted card: covers both slot
    /// sensors and nothing further in.
    pub fn inserted_position(&self) -> i64 {
        self.sensors[Sensor::S1.index()] + 100
    }
}

/// One recorded `advance` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveRecord {
    /// Transport direction.
    pub direction: Direction,
    /// Micro-stepping resolution.
    pub profile: StepProfile,
    /// Steps at `profile` resolution.
    pub steps: u32,
}

impl MoveRecord {
    /// Signed travel in finest units.
    pub fn travel(&self) -> i64 {
        let travel = self.steps as i64 * self.profile.travel_per_step() as i64;
        match self.direction {
            Direction::Forward => travel,
            Direction::Backward => -travel,
        }
    }
}

#[derive(Debug)]
struct TrackState {
    geometry: TrackGeometry,
    /// Leading-edge position; `None` when no card is on the track.
    card: Option<i64>,
    forced: [Option<bool>; SENSOR_COUNT],
    jammed: bool,
    pending_fault: Option<String>,
    holding: bool,
    pace: bool,
    /// Newest `MOVE_LOG_CAPACITY` moves.
    moves: VecDeque<MoveRecord>,
    advance_calls: usize,
    sensor_reads: u64,
}

impl TrackState {
    fn record(&mut self, record: MoveRecord) {
        if self.moves.len() == MOVE_LOG_CAPACITY {
            self.moves.pop_front();
        }
        self.moves.push_back(record);
        self.advance_calls += 1;
    }

    fn occupied(&self, sensor: Sensor) -> bool {
        if let Some(level) = self.forced[sensor.index()] {
            return level;
        }
        let Some(leading) = self.card else {
            return false;
        };
        let trailing = leading - self.geometry.card_length;
        let position = self.geometry.sensors[sensor.index()];
        trailing <= position && position <= leading
    }
}

/// Shared simulated transport.
#[derive(Debug, Clone)]
pub struct SimTransport {
    state: Arc<Mutex<TrackState>>,
}

impl SimTransport {
    /// Empty track with the given geometry.
    pub fn new(geometry: TrackGeometry) -> Self {
        Self {
            state: Arc::new(Mutex::new(TrackState {
                geometry,
                card: None,
                forced: [None; SENSOR_COUNT],
                jammed: false,
                pending_fault: None,
                holding: false,
                pace: false,
                moves: VecDeque::with_capacity(MOVE_LOG_CAPACITY),
                advance_calls: 0,
                sensor_reads: 0,
            })),
        }
    }

    /// Sensor panel reading this track.
    pub fn sensors(&self) -> SimSensorPanel {
        SimSensorPanel {
            state: Arc::clone(&self.state),
        }
    }

    /// Actuator moving the card on this track.
    pub fn actuator(&self) -> SimActuator {
        SimActuator {
            state: Arc::clone(&self.state),
        }
    }

    /// Operator-side handle.
    pub fn handle(&self) -> TrackHandle {
        TrackHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for SimTransport {
    fn default() -> Self {
        Self::new(TrackGeometry::default())
    }
}

/// Simulated occupancy sensors.
#[derive(Debug)]
pub struct SimSensorPanel {
    state: Arc<Mutex<TrackState>>,
}

impl SensorPanel for SimSensorPanel {
    fn occupied(&self, sensor: Sensor) -> bool {
        let mut state = self.state.lock();
        state.sensor_reads += 1;
        state.occupied(sensor)
    }
}

/// Simulated stepper transport.
#[derive(Debug)]
pub struct SimActuator {
    state: Arc<Mutex<TrackState>>,
}

impl Actuator for SimActuator {
    fn advance(
        &mut self,
        direction: Direction,
        profile: StepProfile,
        steps: u32,
        step_delay: Duration,
    ) -> Result<(), HalError> {
        let pace = {
            let mut state = self.state.lock();
            if let Some(reason) = state.pending_fault.take() {
                return Err(HalError::ActuatorFault(reason));
            }
            let record = MoveRecord {
                direction,
                profile,
                steps,
            };
            state.record(record);
            if !state.jammed {
                if let Some(leading) = state.card.as_mut() {
                    *leading += record.travel();
                }
            }
            trace!("sim advance {:?} {} x{} -> {:?}", direction, profile, steps, state.card);
            state.pace
        };

        if pace {
            std::thread::sleep(step_delay * 2 * steps);
        }
        Ok(())
    }

    fn set_holding(&mut self, engaged: bool) -> Result<(), HalError> {
        self.state.lock().holding = engaged;
        Ok(())
    }
}

/// Operator and test access to the simulated track.
#[derive(Debug, Clone)]
pub struct TrackHandle {
    state: Arc<Mutex<TrackState>>,
}

impl TrackHandle {
    /// Put a card on the track with its leading edge at `leading`.
    pub fn insert_card_at(&self, leading: i64) {
        debug!("sim: card inserted at {}", leading);
        self.state.lock().card = Some(leading);
    }

    /// Insert a card the way a user does: covering both slot sensors.
    pub fn insert_card(&self) {
        let leading = self.state.lock().geometry.inserted_position();
        self.insert_card_at(leading);
    }

    /// Take the card off the track.
    pub fn remove_card(&self) {
        debug!("sim: card removed");
        self.state.lock().card = None;
    }

    /// Leading-edge position of the card, if any.
    pub fn card_position(&self) -> Option<i64> {
        self.state.lock().card
    }

    /// Override a sensor reading (`None` restores the modelled value).
    pub fn force_sensor(&self, sensor: Sensor, level: Option<bool>) {
        self.state.lock().forced[sensor.index()] = level;
    }

    /// Release every sensor override.
    pub fn release_sensors(&self) {
        self.state.lock().forced = [None; SENSOR_COUNT];
    }

    /// When jammed, the motor turns but the card does not move.
    pub fn set_jammed(&self, jammed: bool) {
        self.state.lock().jammed = jammed;
    }

    /// Fail the next `advance` call with an actuator fault.
    pub fn fail_next_advance(&self, reason: &str) {
        self.state.lock().pending_fault = Some(reason.to_string());
    }

    /// Sleep for the physical duration of each move.
    pub fn set_pace(&self, pace: bool) {
        self.state.lock().pace = pace;
    }

    /// Whether holding torque is engaged.
    pub fn holding(&self) -> bool {
        self.state.lock().holding
    }

    /// Number of `advance` calls so far, including those that
    /// dropped out of the move log.
    pub fn advance_calls(&self) -> usize {
        self.state.lock().advance_calls
    }

    /// Recorded `advance` calls, oldest first. Holds at most
    /// [`MOVE_LOG_CAPACITY`] entries.
    pub fn moves(&self) -> Vec<MoveRecord> {
        self.state.lock().moves.iter().copied().collect()
    }

    /// Forget recorded moves. `advance_calls` keeps counting.
    pub fn clear_moves(&self) {
        self.state.lock().moves.clear();
    }

    /// Number of sensor reads so far.
    pub fn sensor_reads(&self) -> u64 {
        self.state.lock().sensor_reads
    }

    /// Track geometry.
    pub fn geometry(&self) -> TrackGeometry {
        self.state.lock().geometry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardfeed_common::hal::types::SensorMask;

    #[test]
    fn empty_track_reads_clear() {
        let track = SimTransport::default();
        assert!(track.sensors().none_occupied(SensorMask::all()));
    }

    #[test]
    fn inserted_card_covers_slot_pair_only() {
        let track = SimTransport::default();
        track.handle().insert_card();
        assert_eq!(track.sensors().snapshot(), SensorMask::ENTRY);
    }

    #[test]
    fn forward_travel_reaches_inner_sensors() {
        let track = SimTransport::default();
        let handle = track.handle();
        handle.insert_card();
        let mut actuator = track.actuator();
        // 1/16 x 1000 = 2000 units
        actuator
            .advance(Direction::Forward, StepProfile::Sixteenth, 1000, Duration::ZERO)
            .unwrap();
        assert_eq!(handle.card_position(), Some(2300));
        assert_eq!(
            track.sensors().snapshot(),
            SensorMask::ENTRY | SensorMask::S2
        );
    }

    #[test]
    fn jammed_card_does_not_move() {
        let track = SimTransport::default();
        let handle = track.handle();
        handle.insert_card();
        handle.set_jammed(true);
        track
            .actuator()
            .advance(Direction::Forward, StepProfile::Half, 100, Duration::ZERO)
            .unwrap();
        assert_eq!(handle.card_position(), Some(300));
        assert_eq!(handle.advance_calls(), 1);
    }

    #[test]
    fn forced_sensor_overrides_model() {
        let track = SimTransport::default();
        let handle = track.handle();
        handle.force_sensor(Sensor::S3, Some(true));
        assert!(track.sensors().occupied(Sensor::S3));
        handle.release_sensors();
        assert!(!track.sensors().occupied(Sensor::S3));
    }

    #[test]
    fn pending_fault_fails_once() {
        let track = SimTransport::default();
        let handle = track.handle();
        handle.fail_next_advance("driver overtemperature");
        let mut actuator = track.actuator();
        let err = actuator
            .advance(Direction::Backward, StepProfile::Full, 1, Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, HalError::ActuatorFault(_)));
        assert!(
            actuator
                .advance(Direction::Backward, StepProfile::Full, 1, Duration::ZERO)
                .is_ok()
        );
    }

    #[test]
    fn move_log_keeps_newest_entries() {
        let track = SimTransport::default();
        let handle = track.handle();
        let mut actuator = track.actuator();
        let total = MOVE_LOG_CAPACITY + 10;
        for steps in 1..=total as u32 {
            actuator
                .advance(Direction::Forward, StepProfile::Full, steps, Duration::ZERO)
                .unwrap();
        }
        let moves = handle.moves();
        assert_eq!(moves.len(), MOVE_LOG_CAPACITY);
        assert_eq!(moves[0].steps, 11);
        assert_eq!(moves.last().map(|m| m.steps), Some(total as u32));
        assert_eq!(handle.advance_calls(), total);

        handle.clear_moves();
        assert!(handle.moves().is_empty());
        assert_eq!(handle.advance_calls(), total);
    }

    #[test]
    fn move_record_travel_sign() {
        let back = MoveRecord {
            direction: Direction::Backward,
            profile: StepProfile::Sixteenth,
            steps: 160,
        };
        assert_eq!(back.travel(), -320);
    }
}
