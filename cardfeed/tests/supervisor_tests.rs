//! # Supervisor Integration Tests
//!
//! The supervisor running a real controller on the simulated rig:
//!
//! - phase publication and the enabled flag
//! - accept/reject relay into a blocking feedback wait
//! - simulated captures with and without a prepared frame
//! - status snapshot serialization

use cardfeed::{Supervisor, SupervisorStatus};
use cardfeed_common::config::CardfeedConfig;
use cardfeed_common::control_unit::config::TimeoutConfig;
use cardfeed_common::control_unit::state::Phase;
use cardfeed_common::hal::types::DynamicImage;
use cardfeed_control_unit::{CaptureOutcome, Controller};
use cardfeed_hal::Rig;
use cardfeed_hal::drivers::simulation::{MarkerPlacement, SimulationHandles, SimulationRig};
use image::{GrayImage, Luma};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// ─── Helpers ────────────────────────────────────────────────────────

struct Running {
    supervisor: Supervisor,
    handles: SimulationHandles,
    outcomes: Arc<Mutex<Vec<CaptureOutcome>>>,
}

fn test_config(feedback_s: f64) -> CardfeedConfig {
    let mut config = CardfeedConfig::default();
    config.timeouts = TimeoutConfig::uniform(Duration::from_millis(500), Duration::from_millis(1));
    config.timeouts.feedback = feedback_s;
    config.supervisor.disabled_poll = 0.002;
    let m = &mut config.motion;
    for spec in [
        &mut m.feed,
        &mut m.align,
        &mut m.position_advance,
        &mut m.position_overshoot,
        &mut m.position_approach,
        &mut m.capture_offset,
        &mut m.collect,
        &mut m.collect_pull_through,
        &mut m.eject_offset,
        &mut m.eject_approach,
        &mut m.eject_push,
    ] {
        spec.step_delay_us = 1;
    }
    config
}

fn start(config: &CardfeedConfig) -> Running {
    let (Rig { sensors, actuator, camera, .. }, handles) = SimulationRig::build(config);
    handles.track.set_pace(true);
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&outcomes);
    let controller = Controller::new(sensors, actuator, camera, config)
        .with_callback(move |outcome| sink.lock().push(outcome));
    let supervisor = Supervisor::start(controller, &config.supervisor).expect("start supervisor");
    Running {
        supervisor,
        handles,
        outcomes,
    }
}

fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(2));
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[test]
fn test_accept_collects_card() {
    let run = start(&test_config(30.0));
    wait_until("enabled", || run.supervisor.current_phase() == Phase::Enabled);

    run.handles.track.insert_card();
    wait_until("capture", || !run.outcomes.lock().is_empty());
    assert_eq!(run.supervisor.current_phase(), Phase::Scanning);
    assert!(run.outcomes.lock()[0].success);

    assert!(run.supervisor.accept());
    wait_until("collected", || {
        run.supervisor.current_phase() == Phase::Enabled
            && run.handles.track.card_position().is_some_and(|lead| lead > 50_000)
    });
    run.supervisor.shutdown().unwrap();
}

#[test]
fn test_reject_then_remove_returns_to_idle() {
    let run = start(&test_config(30.0));
    run.handles.camera.set_marker(MarkerPlacement::Near);
    run.handles.track.insert_card();
    wait_until("capture", || !run.outcomes.lock().is_empty());
    assert!(run.outcomes.lock()[0].orientation_applied);

    assert!(run.supervisor.reject());
    wait_until("ejected", || {
        run.handles.track.card_position().is_some_and(|lead| lead < 1500)
    });
    run.handles.track.remove_card();
    wait_until("idle", || run.supervisor.current_phase() == Phase::Enabled);
    run.supervisor.shutdown().unwrap();
}

#[test]
fn test_disable_pauses_between_steps() {
    let mut config = test_config(30.0);
    config.supervisor.start_enabled = false;
    let run = start(&config);

    run.handles.track.insert_card();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(run.supervisor.current_phase(), Phase::Disabled);
    assert_eq!(run.handles.track.advance_calls(), 0);

    run.supervisor.enable();
    wait_until("capture", || !run.outcomes.lock().is_empty());

    // Disabling does not cut the feedback wait short.
    run.supervisor.disable();
    assert!(run.supervisor.accept());
    wait_until("disabled", || run.supervisor.current_phase() == Phase::Disabled);
    let moves = run.handles.track.advance_calls();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(run.handles.track.advance_calls(), moves);

    run.supervisor.enable();
    wait_until("collected", || run.supervisor.current_phase() == Phase::Enabled);
    run.supervisor.shutdown().unwrap();
}

#[test]
fn test_simulated_capture_uses_injected_frame() {
    let run = start(&test_config(0.05));
    wait_until("enabled", || run.supervisor.current_phase() == Phase::Enabled);

    let mut frame = GrayImage::from_pixel(120, 80, Luma([255]));
    frame.put_pixel(100, 10, Luma([0]));
    run.supervisor
        .simulate_capture(Some(DynamicImage::ImageLuma8(frame)));
    wait_until("capture", || !run.outcomes.lock().is_empty());

    let outcome = run.outcomes.lock()[0].clone();
    assert!(outcome.success);
    assert_eq!(outcome.image.map(|i| (i.width(), i.height())), Some((120, 80)));

    // Unanswered feedback times out and the cycle ends without motion.
    wait_until("idle", || run.supervisor.current_phase() == Phase::Enabled);
    assert_eq!(run.handles.track.advance_calls(), 0);
    assert_eq!(run.handles.camera.captures(), 0);
    run.supervisor.shutdown().unwrap();
}

#[test]
fn test_simulated_capture_without_frame_uses_camera() {
    let run = start(&test_config(0.05));
    run.supervisor.simulate_capture(None);
    wait_until("capture", || !run.outcomes.lock().is_empty());
    assert_eq!(run.handles.camera.captures(), 1);
    run.supervisor.shutdown().unwrap();
}

#[test]
fn test_status_snapshot_serializes() {
    let run = start(&test_config(30.0));
    wait_until("steps", || run.supervisor.status().steps > 0);

    let status = run.supervisor.status();
    assert_eq!(
        status,
        SupervisorStatus {
            phase: Phase::Enabled,
            enabled: true,
            steps: status.steps,
        }
    );
    let json = serde_json::to_value(status).unwrap();
    assert_eq!(json["phase"], "enabled");
    assert_eq!(json["enabled"], true);
    assert!(json["steps"].as_u64().unwrap() > 0);
    run.supervisor.shutdown().unwrap();
}

#[test]
fn test_running_flag_stops_loop() {
    let run = start(&test_config(30.0));
    wait_until("steps", || run.supervisor.status().steps > 0);
    run.supervisor.running_flag().store(false, std::sync::atomic::Ordering::SeqCst);
    assert!(!run.supervisor.is_running());
    run.supervisor.shutdown().unwrap();
    let steps = run.supervisor.status().steps;
    thread::sleep(Duration::from_millis(20));
    assert_eq!(run.supervisor.status().steps, steps);
}
