//! GPIO assignments for the valve header.
//!
//! Single source of truth for the channel → line mapping.  Every
//! controller resolves its line through [`line_for_channel`] rather than
//! hard-coding pin numbers.

use crate::app::ports::LineId;
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Solenoid valve outputs (active HIGH through the MOSFET driver stage)
// ---------------------------------------------------------------------------

/// Valve channel 1.
pub const VALVE_1_GPIO: LineId = 17;
/// Valve channel 2.
pub const VALVE_2_GPIO: LineId = 27;
/// Valve channel 3.
pub const VALVE_3_GPIO: LineId = 22;

/// Lines indexed by `channel - 1`.
pub const VALVE_LINES: [LineId; 3] = [VALVE_1_GPIO, VALVE_2_GPIO, VALVE_3_GPIO];

/// Resolve a 1-based channel selector to its output line.
pub fn line_for_channel(channel: u8) -> Result<LineId> {
    (channel as usize)
        .checked_sub(1)
        .and_then(|idx| VALVE_LINES.get(idx))
        .copied()
        .ok_or(Error::InvalidChannel(channel))
}
