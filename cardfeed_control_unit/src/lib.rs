//! # Cardfeed Control Unit Library
//!
//! The per-card state machine of the postcard transport: feed the card in,
//! position it under the camera, capture and orient the image, wait for the
//! human decision, then collect or eject.
//!
//! The controller is generic over the hardware capability traits in
//! `cardfeed_common::hal::driver`, so the same state machine drives the GPIO
//! rig and the deterministic simulation.
//!
//! ## Modules
//!
//! - [`state`]: `MechState` and its mapping to the published `Phase`
//! - [`watchdog`]: per-state deadline tracking
//! - [`feedback`]: durable one-shot accept/reject slot
//! - [`capture`]: orientation decision, callback payload, capture injection
//! - [`controller`]: the `step()` function and one handler per state

pub mod capture;
pub mod controller;
pub mod feedback;
pub mod state;
pub mod watchdog;

pub use capture::{CaptureCallback, CaptureInjector, CaptureOutcome};
pub use controller::Controller;
pub use feedback::{Decision, FeedbackChannel};
pub use state::MechState;
