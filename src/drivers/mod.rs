//! Valve driver, GPIO output adapters, and the deferred-close timer.

pub mod gpio;
pub mod task_pin;
pub mod timer;
pub mod valve;
