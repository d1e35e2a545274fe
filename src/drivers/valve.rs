//! Solenoid valve driver (normally closed, active HIGH).
//!
//! HIGH energises the coil and opens the valve; LOW closes it.  Besides raw
//! on/off the driver supports timed doses, either blocking the caller for
//! the whole duration or returning immediately and closing the valve from a
//! deferred timer.
//!
//! ## Dose state machine (non-blocking path)
//!
//! ```text
//!          dose(force=false)              timer fires
//!   Idle ──────────────────▶ Dosing ─────────────────▶ Idle (LOW)
//!    ▲                        │  │
//!    └──────── stop() ────────┘  └── dose(force=true) ──▶ Dosing (fresh timer)
//! ```
//!
//! `on()`/`off()` are raw overrides and never touch the dose state: calling
//! `off()` mid-dose leaves the timer armed, and its fire is a redundant LOW.
//!
//! ## Shutdown contract
//!
//! [`ValveController::shutdown`] (also run on `Drop`) cancels any pending
//! close, forces the line LOW and releases it exactly once.  Writes that
//! arrive after release, including a deferred close that lost the
//! cancellation race, are dropped.

use core::mem;
use core::time::Duration;
use std::sync::Arc;
use std::thread;

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::app::ports::{DeferredExecutor, DigitalOutput, Level, LineId};
use crate::config::ValveConfig;
use crate::error::Result;
use crate::pins;

/// Parameters for one dose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoseRequest {
    pub duration: Duration,
    pub blocking: bool,
    pub force: bool,
}

impl Default for DoseRequest {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(1),
            blocking: true,
            force: false,
        }
    }
}

impl DoseRequest {
    /// Hold the caller for `duration`.
    pub fn blocking(duration: Duration) -> Self {
        Self {
            duration,
            blocking: true,
            force: false,
        }
    }

    /// Return immediately; a deferred timer closes the valve.
    pub fn background(duration: Duration) -> Self {
        Self {
            duration,
            blocking: false,
            force: false,
        }
    }

    /// Override a dose that is still running.
    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// Non-blocking dose bookkeeping.
#[derive(Debug)]
pub enum DoseState<H> {
    Idle,
    Dosing(H),
}

/// Output shared between the controller and its deferred close.
struct SharedLine<O> {
    output: O,
    released: bool,
}

impl<O: DigitalOutput> SharedLine<O> {
    fn drive(&mut self, level: Level) {
        if !self.released {
            self.output.write(level);
        }
    }
}

pub struct ValveController<O, E>
where
    O: DigitalOutput + 'static,
    E: DeferredExecutor,
{
    channel: u8,
    line: LineId,
    output: Arc<Mutex<SharedLine<O>>>,
    executor: E,
    state: DoseState<E::Handle>,
    shut_down: bool,
}

impl<O, E> ValveController<O, E>
where
    O: DigitalOutput + 'static,
    E: DeferredExecutor,
{
    /// Claim the line for `channel` (1-3) and drive it LOW.
    pub fn new(channel: u8, mut output: O, executor: E) -> Result<Self> {
        let line = pins::line_for_channel(channel)?;
        output.configure(line, Level::Low)?;
        info!("valve ch{}: GPIO{} ready (closed)", channel, line);

        Ok(Self {
            channel,
            line,
            output: Arc::new(Mutex::new(SharedLine {
                output,
                released: false,
            })),
            executor,
            state: DoseState::Idle,
            shut_down: false,
        })
    }

    pub fn from_config(config: &ValveConfig, output: O, executor: E) -> Result<Self> {
        config.validate()?;
        Self::new(config.channel, output, executor)
    }

    /// Energise the solenoid (valve open).
    pub fn on(&self) {
        self.output.lock().drive(Level::High);
    }

    /// De-energise the solenoid (valve closed).
    pub fn off(&self) {
        self.output.lock().drive(Level::Low);
    }

    /// Cancel any pending deferred close and force the valve closed.
    /// Safe to call when idle.
    pub fn stop(&mut self) {
        if let DoseState::Dosing(handle) = mem::replace(&mut self.state, DoseState::Idle) {
            self.executor.cancel(&handle);
            debug!("valve ch{}: pending close cancelled", self.channel);
        }
        self.off();
    }

    /// Open the valve for `duration`.
    ///
    /// Returns `true` if the dose ran (blocking) or started (non-blocking),
    /// `false` if a non-blocking dose is still running and `force` is not
    /// set.  Blocking mode holds the calling thread for the full duration
    /// and cannot be interrupted.
    pub fn dose(&mut self, duration: Duration, blocking: bool, force: bool) -> bool {
        if self.shut_down {
            warn!("valve ch{}: dose after shutdown ignored", self.channel);
            return false;
        }

        if blocking {
            debug!("valve ch{}: blocking dose {:?}", self.channel, duration);
            self.on();
            thread::sleep(duration);
            self.off();
            return true;
        }

        if let DoseState::Dosing(handle) = &self.state {
            if self.executor.is_pending(handle) {
                if !force {
                    info!("valve ch{}: dose rejected, previous dose still running", self.channel);
                    return false;
                }
                self.executor.cancel(handle);
                debug!("valve ch{}: previous dose overridden", self.channel);
            }
        }

        self.on();
        let output = Arc::clone(&self.output);
        let handle = self.executor.schedule(
            duration,
            Box::new(move || output.lock().drive(Level::Low)),
        );
        self.state = DoseState::Dosing(handle);
        debug!("valve ch{}: dose started, closing in {:?}", self.channel, duration);
        true
    }

    pub fn dose_with(&mut self, request: DoseRequest) -> bool {
        self.dose(request.duration, request.blocking, request.force)
    }

    /// Close the valve and hand the line back as an input.  Runs once;
    /// later calls are no-ops.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        self.stop();
        let mut shared = self.output.lock();
        shared.output.release(self.line);
        shared.released = true;
        info!("valve ch{}: GPIO{} closed and released", self.channel, self.line);
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn line(&self) -> LineId {
        self.line
    }

    pub fn state(&self) -> &DoseState<E::Handle> {
        &self.state
    }

    /// True while a non-blocking dose's close is still pending.
    pub fn is_dosing(&self) -> bool {
        match &self.state {
            DoseState::Idle => false,
            DoseState::Dosing(handle) => self.executor.is_pending(handle),
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

impl<O, E> Drop for ValveController<O, E>
where
    O: DigitalOutput + 'static,
    E: DeferredExecutor,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}
