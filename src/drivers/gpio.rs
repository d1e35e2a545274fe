//! Digital output adapters for the valve line.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: [`EspGpioOutput`] drives the pin through raw `gpio_*` sys
//! calls.  Any embedded-hal 1.0 `OutputPin` (e.g. an `esp-idf-hal`
//! `PinDriver`) can be wrapped in [`PinOutput`] instead.
//! On host/test: [`SimOutput`] tracks the level in memory only.
//!
//! Every adapter performs the one-time GPIO mode setup and registers its
//! line in a process-wide claim mask, so two drivers never own the same
//! line.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use embedded_hal::digital::OutputPin;
use log::{error, info, warn};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use crate::app::ports::{DigitalOutput, Level, LineId};
use crate::error::{GpioError, Result};

// ── One-time mode setup ───────────────────────────────────────

static GPIO_MODE_READY: AtomicBool = AtomicBool::new(false);

/// Global GPIO setup shared by all lines.  Idempotent; returns `true` only
/// for the call that actually performed it.
pub fn init_gpio_mode() -> bool {
    if GPIO_MODE_READY
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return false;
    }

    #[cfg(target_os = "espidf")]
    info!("gpio: native numbering, output warnings suppressed");
    #[cfg(not(target_os = "espidf"))]
    info!("gpio(sim): mode initialised");
    true
}

// ── Claim mask ────────────────────────────────────────────────

static CLAIMED: AtomicU64 = AtomicU64::new(0);

fn line_bit(line: LineId) -> Result<u64> {
    if (0..64).contains(&line) {
        Ok(1u64 << line)
    } else {
        Err(GpioError::InvalidLine(line).into())
    }
}

fn claim(line: LineId) -> Result<()> {
    let bit = line_bit(line)?;
    let prev = CLAIMED.fetch_or(bit, Ordering::AcqRel);
    if prev & bit != 0 {
        return Err(GpioError::AlreadyClaimed(line).into());
    }
    Ok(())
}

fn unclaim(line: LineId) {
    if let Ok(bit) = line_bit(line) {
        CLAIMED.fetch_and(!bit, Ordering::AcqRel);
    }
}

/// True if some adapter currently owns `line`.
pub fn is_claimed(line: LineId) -> bool {
    line_bit(line).is_ok_and(|bit| CLAIMED.load(Ordering::Acquire) & bit != 0)
}

// ═══════════════════════════════════════════════════════════════
//  Host simulation
// ═══════════════════════════════════════════════════════════════

/// Shared view of a simulated line, readable after the output has been
/// moved into a controller.
#[derive(Debug, Default)]
pub struct SimLine {
    high: AtomicBool,
    configured: AtomicBool,
    writes: AtomicU32,
    releases: AtomicU32,
}

impl SimLine {
    pub fn level(&self) -> Level {
        Level::from(self.high.load(Ordering::Acquire))
    }

    pub fn is_configured(&self) -> bool {
        self.configured.load(Ordering::Acquire)
    }

    pub fn write_count(&self) -> u32 {
        self.writes.load(Ordering::Acquire)
    }

    pub fn release_count(&self) -> u32 {
        self.releases.load(Ordering::Acquire)
    }
}

/// In-memory output for host builds.
pub struct SimOutput {
    line: Option<LineId>,
    state: Arc<SimLine>,
}

impl Default for SimOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl SimOutput {
    pub fn new() -> Self {
        Self {
            line: None,
            state: Arc::new(SimLine::default()),
        }
    }

    pub fn monitor(&self) -> Arc<SimLine> {
        Arc::clone(&self.state)
    }
}

impl DigitalOutput for SimOutput {
    fn configure(&mut self, line: LineId, initial: Level) -> Result<()> {
        init_gpio_mode();
        claim(line)?;
        self.line = Some(line);
        self.state.high.store(initial.is_high(), Ordering::Release);
        self.state.configured.store(true, Ordering::Release);
        info!("gpio(sim): GPIO{} claimed as output, initial={:?}", line, initial);
        Ok(())
    }

    fn write(&mut self, level: Level) {
        self.state.high.store(level.is_high(), Ordering::Release);
        self.state.writes.fetch_add(1, Ordering::AcqRel);
    }

    fn release(&mut self, line: LineId) {
        if self.line.take().is_none() {
            warn!("gpio(sim): GPIO{} released twice", line);
            return;
        }
        unclaim(line);
        self.state.configured.store(false, Ordering::Release);
        self.state.releases.fetch_add(1, Ordering::AcqRel);
        info!("gpio(sim): GPIO{} released to input", line);
    }
}

// ═══════════════════════════════════════════════════════════════
//  embedded-hal adapter
// ═══════════════════════════════════════════════════════════════

/// Wraps any embedded-hal `OutputPin`.
///
/// embedded-hal has no way to switch a pin back to input, so `release`
/// parks the line LOW and drops the claim; the pin returns to its reset
/// state when the owner drops the inner driver.
pub struct PinOutput<P> {
    pin: P,
    line: Option<LineId>,
}

impl<P: OutputPin> PinOutput<P> {
    pub fn new(pin: P) -> Self {
        Self { pin, line: None }
    }

    pub fn into_inner(self) -> P {
        self.pin
    }
}

impl<P: OutputPin + Send> DigitalOutput for PinOutput<P> {
    fn configure(&mut self, line: LineId, initial: Level) -> Result<()> {
        init_gpio_mode();
        claim(line)?;
        if self.pin.set_state(initial.into()).is_err() {
            unclaim(line);
            return Err(GpioError::WriteFailed.into());
        }
        self.line = Some(line);
        info!("gpio: GPIO{} claimed via embedded-hal pin, initial={:?}", line, initial);
        Ok(())
    }

    fn write(&mut self, level: Level) {
        if let Err(e) = self.pin.set_state(level.into()) {
            error!("gpio: write {:?} to GPIO{:?} failed: {:?}", level, self.line, e);
        }
    }

    fn release(&mut self, line: LineId) {
        if self.line.take().is_none() {
            warn!("gpio: GPIO{} released twice", line);
            return;
        }
        if let Err(e) = self.pin.set_low() {
            error!("gpio: parking GPIO{} low failed: {:?}", line, e);
        }
        unclaim(line);
        info!("gpio: GPIO{} released", line);
    }
}

// ═══════════════════════════════════════════════════════════════
//  ESP-IDF raw GPIO
// ═══════════════════════════════════════════════════════════════

/// Output driven straight through the ESP-IDF GPIO driver.
#[cfg(target_os = "espidf")]
pub struct EspGpioOutput {
    line: Option<LineId>,
}

#[cfg(target_os = "espidf")]
impl Default for EspGpioOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "espidf")]
impl EspGpioOutput {
    pub fn new() -> Self {
        Self { line: None }
    }
}

#[cfg(target_os = "espidf")]
impl DigitalOutput for EspGpioOutput {
    fn configure(&mut self, line: LineId, initial: Level) -> Result<()> {
        init_gpio_mode();
        claim(line)?;

        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << line,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        // SAFETY: the claim mask guarantees this is the only driver
        // touching `line`; gpio_config only reads the struct.
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            unclaim(line);
            return Err(GpioError::ConfigFailed(ret).into());
        }
        // SAFETY: line was configured as an output above.
        unsafe { gpio_set_level(line, u32::from(initial.is_high())) };

        self.line = Some(line);
        info!("gpio: GPIO{} configured as output, initial={:?}", line, initial);
        Ok(())
    }

    fn write(&mut self, level: Level) {
        let Some(line) = self.line else {
            return;
        };
        // SAFETY: line is a configured output owned by this driver.
        let ret = unsafe { gpio_set_level(line, u32::from(level.is_high())) };
        if ret != ESP_OK as i32 {
            error!("gpio: GPIO{} set {:?} failed (rc={})", line, level, ret);
        }
    }

    fn release(&mut self, line: LineId) {
        if self.line.take().is_none() {
            warn!("gpio: GPIO{} released twice", line);
            return;
        }
        // SAFETY: still the sole owner until unclaim() below.
        unsafe {
            gpio_set_level(line, 0);
            gpio_set_direction(line, gpio_mode_t_GPIO_MODE_INPUT);
        }
        unclaim(line);
        info!("gpio: GPIO{} released to input", line);
    }
}
