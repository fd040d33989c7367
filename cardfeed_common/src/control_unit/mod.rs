//! Control unit shared types.
//!
//! Types shared between the control unit, the supervisor and configuration
//! loading: motion/timeout/capture configuration and the externally visible
//! phase.

pub mod config;
pub mod state;
