//! Grow solenoid valve driver.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod pins;

pub use app::ports::{DeferredExecutor, DigitalOutput, Level, LineId};
pub use drivers::valve::{DoseRequest, DoseState, ValveController};
pub use error::{Error, Result};
