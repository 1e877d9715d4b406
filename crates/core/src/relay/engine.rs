use std::sync::Arc;

use chrono::NaiveDateTime;
use relay_source::SampleSource;
use tokio::sync::Mutex;

use crate::detect::detect_max_spike;
use crate::error::{InputError, RelayError};
use crate::history;
use crate::types::{Evaluation, RangeReport, RelaySnapshot, Switch, parse_switch};

use super::state::RelayState;

/// Owns the relay state and serialises every read-modify-write on it.
///
/// The upstream fetch runs before the lock is taken; the decision and the
/// returned snapshot come from a single lock acquisition.
pub struct RelayEngine {
    state: Mutex<RelayState>,
    source: Arc<dyn SampleSource>,
    window_minutes: u32,
}

impl RelayEngine {
    pub fn new(source: Arc<dyn SampleSource>, window_minutes: u32) -> Self {
        Self {
            state: Mutex::new(RelayState::new()),
            source,
            window_minutes,
        }
    }

    /// Current state without evaluating.
    pub async fn snapshot(&self) -> RelaySnapshot {
        self.state.lock().await.snapshot()
    }

    /// Evaluate using the local wall clock.
    pub async fn evaluate(&self) -> Evaluation {
        self.evaluate_with(local_now).await
    }

    /// Evaluate with a fixed time. Used by tests.
    pub async fn evaluate_at(&self, now: NaiveDateTime) -> Evaluation {
        self.evaluate_with(move || now).await
    }

    /// One evaluation cycle. `clock` is read only once the lock is held, so a
    /// slow fetch can never stamp `last_seen` earlier than a write that
    /// landed while it was in flight.
    async fn evaluate_with(&self, clock: impl FnOnce() -> NaiveDateTime) -> Evaluation {
        let samples = match self.source.fetch_recent(self.window_minutes).await {
            Ok(values) if !values.is_empty() => Some(values),
            Ok(_) => {
                tracing::info!(source = self.source.name(), "no recent samples, using schedule");
                None
            }
            Err(e) => {
                tracing::warn!(
                    source = self.source.name(),
                    error = %e,
                    "recent sample fetch failed, using schedule"
                );
                None
            }
        };

        let spike = samples.as_deref().map(detect_max_spike);

        let (decision, state) = {
            let mut guard = self.state.lock().await;
            let decision = guard.evaluate(spike.as_ref(), clock());
            (decision, guard.snapshot())
        };

        let spike = spike.unwrap_or_default();
        tracing::info!(
            samples = samples.as_ref().map_or(0, Vec::len),
            found = spike.found,
            delta = spike.delta,
            previous = spike.previous,
            current = spike.current,
            %decision,
            desired = %state.desired,
            "relay evaluated"
        );

        Evaluation { state, spike, decision }
    }

    /// Acknowledge using the local wall clock.
    pub async fn acknowledge(
        &self,
        applied: &str,
        desired: Option<&str>,
    ) -> Result<Switch, RelayError> {
        self.acknowledge_with(applied, desired, local_now).await
    }

    pub async fn acknowledge_at(
        &self,
        applied: &str,
        desired: Option<&str>,
        now: NaiveDateTime,
    ) -> Result<Switch, RelayError> {
        self.acknowledge_with(applied, desired, move || now).await
    }

    /// Record what the actuator applied, optionally setting a manual override.
    ///
    /// Both fields are validated before the lock is taken; a rejected call
    /// leaves the state untouched.
    async fn acknowledge_with(
        &self,
        applied: &str,
        desired: Option<&str>,
        clock: impl FnOnce() -> NaiveDateTime,
    ) -> Result<Switch, RelayError> {
        let applied = parse_switch(applied, InputError::InvalidApplied)?;
        let desired = desired
            .map(|raw| parse_switch(raw, InputError::InvalidDesired))
            .transpose()?;

        let result = {
            let mut guard = self.state.lock().await;
            guard.acknowledge(applied, desired, clock())
        };
        tracing::info!(
            %applied,
            manual_override = ?desired,
            desired = %result,
            "applied state recorded"
        );
        Ok(result)
    }

    /// Deduplicated spikes for an explicit range, from the same source.
    pub async fn occurrences(&self, start: &str, end: &str) -> Result<RangeReport, RelayError> {
        history::occurrences_in_range(self.source.as_ref(), start, end).await
    }
}

fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use relay_source::{MockSource, RangeSamples, SourceError, SourceFuture};
    use std::time::Duration;

    use crate::types::DecisionSource;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    fn engine(mock: MockSource) -> (RelayEngine, Arc<MockSource>) {
        let mock = Arc::new(mock);
        (RelayEngine::new(mock.clone(), 30), mock)
    }

    #[tokio::test]
    async fn spike_in_window_turns_relay_on() {
        let (engine, _) = engine(MockSource::with_recent(vec![20.0, 40.0]));
        let ev = engine.evaluate_at(at(22)).await;
        assert_eq!(ev.decision, DecisionSource::SpikeDetected);
        assert_eq!(ev.state.desired, Switch::On);
        assert_eq!(ev.state.last_applied, Switch::On);
        assert_eq!(ev.state.last_seen, Some(at(22)));
        assert_eq!(ev.spike.delta, Some(20.0));
    }

    #[tokio::test]
    async fn fetch_failure_falls_back_to_schedule() {
        let (engine, mock) = engine(MockSource::failing(SourceError::Timeout));
        let ev = engine.evaluate_at(at(9)).await;
        assert_eq!(ev.decision, DecisionSource::TimeOfDay);
        assert_eq!(ev.state.desired, Switch::On);
        assert!(!ev.spike.found);
        assert_eq!(mock.recent_calls(), 1);
    }

    #[tokio::test]
    async fn empty_window_falls_back_to_schedule() {
        let (engine, _) = engine(MockSource::empty());
        let ev = engine.evaluate_at(at(23)).await;
        assert_eq!(ev.decision, DecisionSource::TimeOfDay);
        assert_eq!(ev.state.desired, Switch::Off);
    }

    #[tokio::test]
    async fn invalid_applied_leaves_state_untouched() {
        let (engine, _) = engine(MockSource::empty());
        let before = engine.snapshot().await;
        let err = engine.acknowledge_at("maybe", Some("on"), at(10)).await.unwrap_err();
        assert_eq!(err, RelayError::InvalidInput(InputError::InvalidApplied));
        assert_eq!(engine.snapshot().await, before);
    }

    #[tokio::test]
    async fn invalid_desired_does_not_record_applied() {
        let (engine, _) = engine(MockSource::empty());
        let err = engine.acknowledge_at("on", Some("auto"), at(10)).await.unwrap_err();
        assert_eq!(err, RelayError::InvalidInput(InputError::InvalidDesired));
        let snap = engine.snapshot().await;
        assert_eq!(snap.last_applied, Switch::Off);
        assert!(snap.last_seen.is_none());
        assert!(!snap.manual_override_pending);
    }

    #[tokio::test]
    async fn override_is_observed_by_next_evaluation() {
        let (engine, _) = engine(MockSource::with_recent(vec![0.0, 100.0]));
        let desired = engine.acknowledge_at("on", Some("off"), at(10)).await.unwrap();
        assert_eq!(desired, Switch::Off);

        let ev = engine.evaluate_at(at(10)).await;
        assert_eq!(ev.decision, DecisionSource::ManualOverride);
        assert_eq!(ev.state.desired, Switch::Off);
        assert!(ev.spike.found);

        let ev = engine.evaluate_at(at(10)).await;
        assert_eq!(ev.decision, DecisionSource::SpikeDetected);
        assert_eq!(ev.state.desired, Switch::On);
    }

    /// Returns a spiking window after a delay.
    struct SlowSource {
        delay: Duration,
    }

    impl SampleSource for SlowSource {
        fn name(&self) -> &str {
            "slow"
        }

        fn fetch_recent(&self, _window_minutes: u32) -> SourceFuture<'_, Vec<f64>> {
            let delay = self.delay;
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                Ok(vec![0.0, 50.0])
            })
        }

        fn fetch_range<'a>(&'a self, _: &'a str, _: &'a str) -> SourceFuture<'a, RangeSamples> {
            Box::pin(async { Ok(RangeSamples::default()) })
        }
    }

    #[tokio::test]
    async fn last_seen_never_moves_backwards_past_a_mid_fetch_ack() {
        let engine = Arc::new(RelayEngine::new(
            Arc::new(SlowSource { delay: Duration::from_millis(300) }),
            30,
        ));

        let polling = tokio::spawn({
            let engine = engine.clone();
            async move { engine.evaluate().await }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        engine.acknowledge("off", None).await.unwrap();
        let acked = engine.snapshot().await.last_seen.unwrap();

        let ev = polling.await.unwrap();
        assert_eq!(ev.decision, DecisionSource::SpikeDetected);
        assert_eq!(ev.state.last_applied, Switch::On);
        assert!(ev.state.last_seen.unwrap() >= acked);
        assert_eq!(engine.snapshot().await.last_seen, ev.state.last_seen);
    }
}
