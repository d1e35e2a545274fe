//! Grow valve firmware — main entry point.
//!
//! Brings up logging, resolves the valve channel from the build-time
//! config, runs the configured dose once and parks the line safely.
//!
//! ```text
//!   ValveConfig ──▶ ValveController ──▶ EspGpioOutput   (GPIO 17/27/22)
//!                                   └──▶ ThreadExecutor (deferred close)
//! ```
#![deny(unused_must_use)]

use core::time::Duration;

use anyhow::Result;
use log::{info, warn};

use growvalve::config::ValveConfig;
use growvalve::drivers::gpio::EspGpioOutput;
use growvalve::drivers::timer::ThreadExecutor;
use growvalve::ValveController;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("Grow valve v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Config (build-time JSON or defaults) ───────────────
    let config = match option_env!("VALVE_CONFIG") {
        Some(json) => ValveConfig::from_json(json)?,
        None => ValveConfig::default(),
    };
    info!(
        "Config: channel={} dose={}ms blocking={} force={}",
        config.channel, config.dose_ms, config.blocking, config.force
    );

    // ── 3. Claim the valve line ───────────────────────────────
    let mut valve =
        ValveController::from_config(&config, EspGpioOutput::new(), ThreadExecutor::new())?;

    // ── 4. Dose, wait for the deferred close ──────────────────
    if !valve.dose_with(config.dose_request()) {
        warn!("Dose rejected, valve busy");
    }
    while valve.is_dosing() {
        std::thread::sleep(POLL_INTERVAL);
    }

    // ── 5. Park the line before the main task exits ───────────
    valve.shutdown();
    info!("Valve parked, main task exiting");
    Ok(())
}
