//! # Cardfeed Supervisor
//!
//! Runs the card controller on a background thread and relays host commands
//! into it: enable/disable, accept/reject and simulated captures.
//!
//! ## Modules
//!
//! - [`supervisor`]: control thread, published phase, command relay
//! - [`command`]: operator console command parsing

pub mod command;
pub mod supervisor;

pub use command::{CommandError, ConsoleCommand, SimCommand};
pub use supervisor::{Supervisor, SupervisorError, SupervisorStatus};
