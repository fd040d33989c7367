//! Background control thread and host command relay.
//!
//! The supervisor owns the controller after [`Supervisor::start`]: the control
//! thread is its only mutator. The host reaches it through the enabled flag
//! (read at each loop head), the feedback channel and the capture injector.
//! The published phase and step count are atomics, so reading them never
//! blocks on the loop.

use cardfeed_common::config::SupervisorConfig;
use cardfeed_common::control_unit::state::Phase;
use cardfeed_common::hal::driver::{Actuator, CaptureDevice, SensorPanel};
use cardfeed_common::hal::types::DynamicImage;
use cardfeed_control_unit::{CaptureInjector, Controller, FeedbackChannel};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Name of the control thread.
pub const CONTROL_THREAD_NAME: &str = "cardfeed-control";

/// Supervisor errors.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The control thread could not be spawned.
    #[error("Failed to spawn control thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The control thread panicked.
    #[error("Control thread panicked")]
    ThreadPanicked,
}

/// Snapshot served by [`Supervisor::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SupervisorStatus {
    pub phase: Phase,
    pub enabled: bool,
    pub steps: u64,
}

/// State shared between the host side and the control thread.
#[derive(Debug)]
struct Published {
    enabled: AtomicBool,
    phase: AtomicU8,
    steps: AtomicU64,
}

impl Published {
    fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire)).unwrap_or_default()
    }
}

/// Handle to a running control loop.
pub struct Supervisor {
    published: Arc<Published>,
    running: Arc<AtomicBool>,
    feedback: Arc<FeedbackChannel>,
    injector: CaptureInjector,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Supervisor {
    /// Move `controller` onto the control thread and start looping.
    pub fn start<S, A, C>(
        controller: Controller<S, A, C>,
        config: &SupervisorConfig,
    ) -> Result<Self, SupervisorError>
    where
        S: SensorPanel + 'static,
        A: Actuator + 'static,
        C: CaptureDevice + 'static,
    {
        let published = Arc::new(Published {
            enabled: AtomicBool::new(config.start_enabled),
            phase: AtomicU8::new(Phase::Disabled as u8),
            steps: AtomicU64::new(controller.steps()),
        });
        let running = Arc::new(AtomicBool::new(true));
        let feedback = controller.feedback();
        let injector = controller.injector();
        let disabled_poll = config.disabled_poll();

        let thread = {
            let published = Arc::clone(&published);
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name(CONTROL_THREAD_NAME.to_string())
                .spawn(move || control_loop(controller, &published, &running, disabled_poll))?
        };
        info!(
            "Supervisor started ({})",
            if config.start_enabled { "enabled" } else { "disabled" }
        );

        Ok(Self {
            published,
            running,
            feedback,
            injector,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Resume stepping at the next loop head.
    pub fn enable(&self) {
        if !self.published.enabled.swap(true, Ordering::AcqRel) {
            info!("Controller enabled");
        }
    }

    /// Pause stepping at the next loop head. A motion in progress completes.
    pub fn disable(&self) {
        if self.published.enabled.swap(false, Ordering::AcqRel) {
            info!("Controller disabled");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.published.enabled.load(Ordering::Acquire)
    }

    /// Keep the card under the camera. Returns whether the decision was taken.
    pub fn accept(&self) -> bool {
        self.feedback.accept()
    }

    /// Return the card under the camera. Returns whether the decision was taken.
    pub fn reject(&self) -> bool {
        self.feedback.reject()
    }

    /// Request a capture cycle without a card.
    ///
    /// Picked up the next time the controller is idle. Without an image the
    /// capture device is used.
    pub fn simulate_capture(&self, image: Option<DynamicImage>) {
        if self.injector.is_pending() {
            warn!("Replacing pending simulated capture");
        }
        self.injector.inject(image);
    }

    /// Phase published after the latest loop iteration.
    pub fn current_phase(&self) -> Phase {
        self.published.phase()
    }

    pub fn status(&self) -> SupervisorStatus {
        SupervisorStatus {
            phase: self.published.phase(),
            enabled: self.is_enabled(),
            steps: self.published.steps.load(Ordering::Acquire),
        }
    }

    /// Flag cleared by [`Supervisor::shutdown`]; for signal handlers.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop at the next loop head and join the control thread.
    ///
    /// Waits for the step in progress, which may be a blocking feedback wait.
    /// Calling it again is a no-op.
    pub fn shutdown(&self) -> Result<(), SupervisorError> {
        self.running.store(false, Ordering::SeqCst);
        let Some(handle) = self.thread.lock().take() else {
            return Ok(());
        };
        info!("Shutdown requested, waiting for the current step");
        handle.join().map_err(|_| SupervisorError::ThreadPanicked)?;
        info!("Supervisor stopped after {} steps", self.status().steps);
        Ok(())
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("{}", e);
        }
    }
}

fn control_loop<S, A, C>(
    mut controller: Controller<S, A, C>,
    published: &Published,
    running: &AtomicBool,
    disabled_poll: Duration,
) where
    S: SensorPanel,
    A: Actuator,
    C: CaptureDevice,
{
    let mut last: Option<Phase> = None;
    while running.load(Ordering::SeqCst) {
        let phase = if published.enabled.load(Ordering::Acquire) {
            controller.step()
        } else {
            Phase::Disabled
        };
        published.phase.store(phase as u8, Ordering::Release);
        published.steps.store(controller.steps(), Ordering::Release);

        if last != Some(phase) {
            info!("Phase: {} ({})", phase, controller.state());
            last = Some(phase);
        }
        if phase == Phase::Disabled {
            thread::sleep(disabled_poll);
        }
    }
    debug!("Control loop exited in {}", controller.state());
}
