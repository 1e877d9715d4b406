use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::InputError;

/// Wire format for `last_seen`: local time, seconds precision, no offset.
pub const LAST_SEEN_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Relay position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

impl fmt::Display for Switch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is neither `"on"` nor `"off"`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected 'on' or 'off', got {0:?}")]
pub struct InvalidSwitch(pub String);

impl FromStr for Switch {
    type Err = InvalidSwitch;

    /// Exact match only: `"ON"` and `" on"` are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            other => Err(InvalidSwitch(other.to_owned())),
        }
    }
}

// ── Detection types ─────────────────────────────────────────────

/// Result of scanning a window for its largest drastic increase.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpikeOutcome {
    pub found: bool,
    pub delta: Option<f64>,
    pub previous: Option<f64>,
    pub current: Option<f64>,
}

impl SpikeOutcome {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn spike(previous: f64, current: f64) -> Self {
        Self {
            found: true,
            delta: Some(current - previous),
            previous: Some(previous),
            current: Some(current),
        }
    }
}

/// One consecutive-pair increase at or above the spike threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct SpikeEvent {
    /// Index of the later sample of the pair.
    pub index: usize,
    /// Label of the later sample, as supplied by the source.
    pub timestamp: Option<String>,
    pub previous: f64,
    pub current: f64,
    pub delta: f64,
}

/// A deduplicated spike reported by a range query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Occurrence {
    pub timestamp: Option<String>,
    pub previous_value: f64,
    pub current_value: f64,
    pub increase: f64,
}

impl From<SpikeEvent> for Occurrence {
    fn from(event: SpikeEvent) -> Self {
        Self {
            timestamp: event.timestamp,
            previous_value: event.previous,
            current_value: event.current,
            increase: event.delta,
        }
    }
}

/// Deduplicated spikes for an explicit date range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeReport {
    pub start_date: String,
    pub end_date: String,
    pub total_occurrences: usize,
    pub occurrences: Vec<Occurrence>,
}

impl RangeReport {
    pub fn new(
        start_date: impl Into<String>,
        end_date: impl Into<String>,
        occurrences: Vec<Occurrence>,
    ) -> Self {
        Self {
            start_date: start_date.into(),
            end_date: end_date.into(),
            total_occurrences: occurrences.len(),
            occurrences,
        }
    }
}

// ── Relay state types ───────────────────────────────────────────

/// Point-in-time copy of the relay state.
///
/// Serializes to the public state fields; the override flag stays internal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelaySnapshot {
    pub desired: Switch,
    pub last_applied: Switch,
    #[serde(serialize_with = "serialize_last_seen")]
    pub last_seen: Option<NaiveDateTime>,
    #[serde(skip_serializing)]
    pub manual_override_pending: bool,
}

fn serialize_last_seen<S: Serializer>(
    value: &Option<NaiveDateTime>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(ts) => s.collect_str(&ts.format(LAST_SEEN_FORMAT)),
        None => s.serialize_none(),
    }
}

/// Which rule set `desired` during an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    /// A pending manual override was consumed; `desired` kept as set.
    ManualOverride,
    /// The recent window contained a drastic increase.
    SpikeDetected,
    /// Samples were available and calm.
    NoSpike,
    /// No samples; fell back to the daytime schedule.
    TimeOfDay,
}

impl fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ManualOverride => "manual_override",
            Self::SpikeDetected => "spike_detected",
            Self::NoSpike => "no_spike",
            Self::TimeOfDay => "time_of_day",
        })
    }
}

/// Outcome of one evaluation cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub state: RelaySnapshot,
    pub spike: SpikeOutcome,
    pub decision: DecisionSource,
}

/// Parse an acknowledgement field, mapping failure to the given input error.
pub(crate) fn parse_switch(raw: &str, on_err: InputError) -> Result<Switch, InputError> {
    raw.parse().map_err(|_| on_err)
}
