use chrono::{NaiveDateTime, TimeDelta};

use crate::types::{Occurrence, SpikeEvent};

/// Spikes closer than this to the last reported one belong to the same episode.
pub const DEDUP_WINDOW_SECS: i64 = 5 * 60;

/// Naive layouts tried in order. `%.f` also matches an absent fraction.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a sample label.
///
/// Accepts ISO-8601 with optional fractional seconds and optional trailing
/// `Z`, and the space-separated variant. Labels are compared as written, so
/// a numeric offset such as `+02:00` is not accepted: mixing it with naive
/// labels would put the two on different clocks.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    let naive = raw.strip_suffix('Z').unwrap_or(raw);

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
}

/// Collapse spike events into one occurrence per episode.
///
/// An event is kept if it is the first anchored one or lies strictly more
/// than [`DEDUP_WINDOW_SECS`] after the last kept, anchored event.
/// Events whose timestamp is missing or unparseable are always kept and do
/// not move the anchor.
pub fn dedupe(events: Vec<SpikeEvent>) -> Vec<Occurrence> {
    let window = TimeDelta::seconds(DEDUP_WINDOW_SECS);
    let mut anchor: Option<NaiveDateTime> = None;
    let mut kept = Vec::with_capacity(events.len());

    for event in events {
        let parsed = event.timestamp.as_deref().and_then(parse_timestamp);
        match (parsed, anchor) {
            (None, _) => {
                tracing::debug!(
                    index = event.index,
                    timestamp = ?event.timestamp,
                    "unparseable spike timestamp, kept"
                );
            }
            (Some(ts), Some(last)) if ts - last <= window => {
                tracing::trace!(
                    index = event.index,
                    %ts,
                    %last,
                    "spike within dedup window, dropped"
                );
                continue;
            }
            (Some(ts), _) => anchor = Some(ts),
        }
        kept.push(Occurrence::from(event));
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap().and_hms_opt(h, m, s).unwrap()
    }

    fn event(index: usize, ts: Option<&str>) -> SpikeEvent {
        SpikeEvent {
            index,
            timestamp: ts.map(str::to_owned),
            previous: 10.0,
            current: 40.0,
            delta: 30.0,
        }
    }

    #[test]
    fn parses_supported_layouts() {
        assert_eq!(parse_timestamp("2024-03-10T12:00:00"), Some(at(12, 0, 0)));
        assert_eq!(parse_timestamp("2024-03-10T12:00:00Z"), Some(at(12, 0, 0)));
        assert_eq!(parse_timestamp("2024-03-10 12:00:00"), Some(at(12, 0, 0)));

        let frac = parse_timestamp("2024-03-10T12:00:00.250Z").unwrap();
        assert_eq!(frac.and_utc().timestamp_subsec_millis(), 250);
        assert!(parse_timestamp("2024-03-10 12:00:00.5").is_some());
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("10/03/2024 12:00"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn offset_labels_are_not_parsed() {
        assert_eq!(parse_timestamp("2024-03-10T12:00:00+02:00"), None);
        assert_eq!(parse_timestamp("2024-03-10T12:00:00-05:00"), None);
    }

    #[test]
    fn offset_label_is_reported_not_shifted_into_the_window() {
        // Normalised to UTC the middle label would read 10:06, land before
        // the 12:00 anchor and be dropped as a duplicate.
        let events = vec![
            event(1, Some("2024-03-10T12:00:00")),
            event(2, Some("2024-03-10T12:06:00+02:00")),
            event(3, Some("2024-03-10T12:12:00")),
        ];
        let kept = dedupe(events);
        let stamps: Vec<_> = kept.iter().map(|o| o.timestamp.as_deref()).collect();
        assert_eq!(
            stamps,
            vec![
                Some("2024-03-10T12:00:00"),
                Some("2024-03-10T12:06:00+02:00"),
                Some("2024-03-10T12:12:00"),
            ]
        );
    }

    #[test]
    fn groups_events_within_five_minutes() {
        let events = vec![
            event(1, Some("2024-03-10T12:00:00")),
            event(2, Some("2024-03-10T12:02:00")),
            event(3, Some("2024-03-10T12:10:00")),
        ];
        let kept = dedupe(events);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].timestamp.as_deref(), Some("2024-03-10T12:00:00"));
        assert_eq!(kept[1].timestamp.as_deref(), Some("2024-03-10T12:10:00"));
    }

    #[test]
    fn exactly_five_minutes_is_same_episode() {
        let events = vec![
            event(1, Some("2024-03-10T12:00:00")),
            event(2, Some("2024-03-10T12:05:00")),
            event(3, Some("2024-03-10T12:05:01")),
        ];
        let kept = dedupe(events);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1].timestamp.as_deref(), Some("2024-03-10T12:05:01"));
    }

    #[test]
    fn window_measured_from_last_kept_not_last_seen() {
        // 12:04 is dropped, so 12:08 is compared with 12:00 and kept.
        let events = vec![
            event(1, Some("2024-03-10T12:00:00")),
            event(2, Some("2024-03-10T12:04:00")),
            event(3, Some("2024-03-10T12:08:00")),
        ];
        assert_eq!(dedupe(events).len(), 2);
    }

    #[test]
    fn unparseable_timestamps_are_kept_without_anchoring() {
        let events = vec![
            event(1, Some("not a time")),
            event(2, Some("2024-03-10T12:00:00")),
            event(3, None),
            event(4, Some("2024-03-10T12:01:00")),
        ];
        let kept = dedupe(events);
        let stamps: Vec<_> = kept.iter().map(|o| o.timestamp.clone()).collect();
        assert_eq!(
            stamps,
            vec![
                Some("not a time".to_owned()),
                Some("2024-03-10T12:00:00".to_owned()),
                None,
            ]
        );
    }

    #[test]
    fn occurrence_carries_values() {
        let kept = dedupe(vec![event(1, Some("2024-03-10T12:00:00"))]);
        assert_eq!(kept[0].previous_value, 10.0);
        assert_eq!(kept[0].current_value, 40.0);
        assert_eq!(kept[0].increase, 30.0);
    }

    #[test]
    fn empty_input() {
        assert!(dedupe(Vec::new()).is_empty());
    }
}
