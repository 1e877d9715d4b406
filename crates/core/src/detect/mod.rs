pub mod dedup;
pub mod spike;

pub use dedup::{DEDUP_WINDOW_SECS, dedupe, parse_timestamp};
pub use spike::{SPIKE_THRESHOLD, detect_max_spike, find_spikes};
