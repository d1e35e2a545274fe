//! Valve configuration parameters.
//!
//! Which header channel the valve sits on and the dose issued when the
//! caller doesn't supply its own.  Loaded from JSON by the firmware
//! entry point; defaults match the board's stock wiring.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::drivers::valve::DoseRequest;
use crate::error::{Error, Result};
use crate::pins;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValveConfig {
    /// Valve header channel (1-3)
    pub channel: u8,
    /// Default dose length in milliseconds; must be non-zero
    pub dose_ms: u32,
    /// Hold the caller for the whole dose
    pub blocking: bool,
    /// Override a dose that is still running
    pub force: bool,
}

impl Default for ValveConfig {
    fn default() -> Self {
        Self {
            channel: 1,
            dose_ms: 1000,
            blocking: true,
            force: false,
        }
    }
}

impl ValveConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|_| Error::Config("malformed valve config JSON"))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the board can't act on.
    ///
    /// A zero `dose_ms` would make the configured dose a no-op pulse that
    /// never opens the valve, so it is treated as a config mistake.
    /// `ValveController::dose` itself still accepts `Duration::ZERO`.
    pub fn validate(&self) -> Result<()> {
        pins::line_for_channel(self.channel)?;
        if self.dose_ms == 0 {
            return Err(Error::Config("dose_ms must be non-zero"));
        }
        Ok(())
    }

    pub fn dose_duration(&self) -> Duration {
        Duration::from_millis(u64::from(self.dose_ms))
    }

    pub fn dose_request(&self) -> DoseRequest {
        DoseRequest {
            duration: self.dose_duration(),
            blocking: self.blocking,
            force: self.force,
        }
    }
}
