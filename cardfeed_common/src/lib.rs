//! Cardfeed Common Library
//!
//! Shared types, hardware capability traits and configuration loading for
//! all cardfeed workspace crates.
//!
//! # Module Structure
//!
//! - [`hal`] - Capability traits (sensor panel, actuator, capture device), pin map and hardware types
//! - [`control_unit`] - Motion, timeout and capture-region configuration, externally visible phase
//! - [`config`] - Top-level configuration file, loading and validation
//! - [`consts`] - Default values shared by configuration and drivers
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use cardfeed_common::prelude::*;
//!
//! let config = CardfeedConfig::default();
//! assert!(config.validate().is_ok());
//! ```

pub mod config;
pub mod consts;
pub mod control_unit;
pub mod hal;
pub mod prelude;
