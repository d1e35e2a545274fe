//! Unified error types for the valve driver.
//!
//! A single `Error` enum that every fallible path converts into.  All
//! variants are `Copy` so they can be handed back from construction without
//! allocation.

use core::fmt;

use crate::app::ports::LineId;

// ---------------------------------------------------------------------------
// Top-level driver error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Channel selector is not one of the valve header channels.
    InvalidChannel(u8),
    /// The output line could not be claimed or configured.
    Gpio(GpioError),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidChannel(ch) => write!(f, "invalid valve channel {ch} (expected 1-3)"),
            Self::Gpio(e) => write!(f, "gpio: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// GPIO errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioError {
    /// `gpio_config` (or the HAL equivalent) returned an error code.
    ConfigFailed(i32),
    /// The pin driver rejected a level write.
    WriteFailed,
    /// Line number is outside the GPIO matrix.
    InvalidLine(LineId),
    /// Another owner already holds this line.
    AlreadyClaimed(LineId),
}

impl fmt::Display for GpioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigFailed(rc) => write!(f, "GPIO config failed (rc={rc})"),
            Self::WriteFailed => write!(f, "GPIO write failed"),
            Self::InvalidLine(line) => write!(f, "GPIO{line} does not exist"),
            Self::AlreadyClaimed(line) => write!(f, "GPIO{line} already claimed"),
        }
    }
}

impl From<GpioError> for Error {
    fn from(e: GpioError) -> Self {
        Self::Gpio(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Driver-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
