use chrono::NaiveDateTime;

use crate::types::{DecisionSource, RelaySnapshot, SpikeOutcome, Switch};

use super::schedule;

/// Mutable relay state. Only reachable through the engine's lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayState {
    pub desired: Switch,
    pub last_applied: Switch,
    pub last_seen: Option<NaiveDateTime>,
    pub manual_override_pending: bool,
}

impl RelayState {
    pub fn new() -> Self {
        Self {
            desired: Switch::Off,
            last_applied: Switch::Off,
            last_seen: None,
            manual_override_pending: false,
        }
    }

    pub fn snapshot(&self) -> RelaySnapshot {
        RelaySnapshot {
            desired: self.desired,
            last_applied: self.last_applied,
            last_seen: self.last_seen,
            manual_override_pending: self.manual_override_pending,
        }
    }

    /// Apply one evaluation cycle.
    ///
    /// `spike` is `None` when no samples were obtained.
    pub fn evaluate(&mut self, spike: Option<&SpikeOutcome>, now: NaiveDateTime) -> DecisionSource {
        if self.manual_override_pending {
            self.manual_override_pending = false;
            return DecisionSource::ManualOverride;
        }

        match spike {
            Some(outcome) if outcome.found => {
                self.desired = Switch::On;
                self.last_applied = Switch::On;
                self.last_seen = Some(now);
                DecisionSource::SpikeDetected
            }
            Some(_) => {
                self.desired = Switch::Off;
                self.last_applied = Switch::Off;
                DecisionSource::NoSpike
            }
            None => {
                self.desired = schedule::desired_at(now);
                DecisionSource::TimeOfDay
            }
        }
    }

    /// Record an acknowledgement. Inputs are already validated.
    pub fn acknowledge(
        &mut self,
        applied: Switch,
        desired: Option<Switch>,
        now: NaiveDateTime,
    ) -> Switch {
        if let Some(desired) = desired {
            self.desired = desired;
            self.manual_override_pending = true;
        }
        self.last_applied = applied;
        self.last_seen = Some(now);
        self.desired
    }
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new()
    }
}
