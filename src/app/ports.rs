//! Port traits — the boundary between the dose logic and the outside world.
//!
//! ```text
//!   ValveController ──▶ DigitalOutput     (line high/low, claim, release)
//!                   ──▶ DeferredExecutor  (schedule/cancel deferred close)
//! ```
//!
//! Adapters in [`crate::drivers`] implement these for real GPIO, the host
//! simulation and `std` threads.  Tests substitute recording mocks.

use core::time::Duration;

use crate::error::Result;

/// Physical GPIO number of an output line.
pub type LineId = i32;

// ───────────────────────────────────────────────────────────────
// Output level
// ───────────────────────────────────────────────────────────────

/// Logic level of a digital output.  HIGH energises the solenoid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        matches!(self, Self::High)
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high { Self::High } else { Self::Low }
    }
}

impl From<Level> for bool {
    fn from(level: Level) -> Self {
        level.is_high()
    }
}

impl From<Level> for embedded_hal::digital::PinState {
    fn from(level: Level) -> Self {
        match level {
            Level::Low => Self::Low,
            Level::High => Self::High,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Digital output port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// A single claimed output line.
///
/// `write` is infallible from the controller's point of view: a line that
/// was claimed successfully is assumed writable, and adapters log any
/// hardware fault instead of surfacing it.
pub trait DigitalOutput: Send {
    /// Claim `line` as an output and drive it to `initial`.
    /// Called once at construction, outside the hot path.
    fn configure(&mut self, line: LineId, initial: Level) -> Result<()>;

    /// Drive the claimed line.
    fn write(&mut self, level: Level);

    /// Return `line` to a high-impedance input.  Called exactly once at
    /// shutdown.
    fn release(&mut self, line: LineId);
}

// ───────────────────────────────────────────────────────────────
// Deferred executor port (domain → background timer facility)
// ───────────────────────────────────────────────────────────────

/// Callback run by a [`DeferredExecutor`] once its delay elapses.
pub type DeferredFn = Box<dyn FnOnce() + Send + 'static>;

/// Runs a callback on a separate thread of control after a delay.
///
/// Cancellation is best-effort: `cancel` stops a callback that has not yet
/// started, but a callback the executor already committed to running may
/// still execute once.
pub trait DeferredExecutor {
    type Handle;

    /// Arrange for `callback` to run after `delay`.
    fn schedule(&self, delay: Duration, callback: DeferredFn) -> Self::Handle;

    /// Prevent `handle` from firing.  No-op if it already fired or was
    /// already cancelled.
    fn cancel(&self, handle: &Self::Handle);

    /// True while `handle` is armed or its callback is still running.
    fn is_pending(&self, handle: &Self::Handle) -> bool;
}
