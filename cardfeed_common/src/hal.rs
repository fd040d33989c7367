//! Hardware abstraction layer types, traits and configuration.
//!
//! The control unit only talks to hardware through the three capability
//! traits in [`driver`]; drivers in `cardfeed_hal` implement them.

pub mod config;
pub mod driver;
pub mod types;
