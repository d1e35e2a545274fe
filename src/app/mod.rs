//! Application boundary — port traits the valve logic is written against.
//!
//! All interaction with GPIO and timers happens through the traits in
//! [`ports`], keeping [`crate::drivers::valve`] testable without real
//! peripherals.

pub mod ports;
