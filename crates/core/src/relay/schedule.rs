use chrono::{NaiveDateTime, Timelike};

use crate::types::Switch;

/// First local hour (inclusive) the relay runs when no samples are available.
pub const DAY_START_HOUR: u32 = 8;
/// Local hour (exclusive) the daytime window ends.
pub const DAY_END_HOUR: u32 = 20;

/// Daytime fallback: on for hours in `[8, 20)`, off otherwise.
pub fn desired_for_hour(hour: u32) -> Switch {
    if (DAY_START_HOUR..DAY_END_HOUR).contains(&hour) {
        Switch::On
    } else {
        Switch::Off
    }
}

pub fn desired_at(now: NaiveDateTime) -> Switch {
    desired_for_hour(now.hour())
}
