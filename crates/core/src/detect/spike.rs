use crate::types::{SpikeEvent, SpikeOutcome};

/// Minimum consecutive increase (µg/m³) that counts as a drastic increase.
pub const SPIKE_THRESHOLD: f64 = 15.0;

/// Find the largest drastic increase between consecutive samples.
///
/// Scans every pair; ties keep the earliest pair because the running
/// maximum is only replaced on a strictly larger delta.
pub fn detect_max_spike(values: &[f64]) -> SpikeOutcome {
    let mut best: Option<(f64, f64, f64)> = None;

    for pair in values.windows(2) {
        let (previous, current) = (pair[0], pair[1]);
        let delta = current - previous;
        if delta < SPIKE_THRESHOLD {
            continue;
        }
        if best.is_none_or(|(best_delta, _, _)| delta > best_delta) {
            best = Some((delta, previous, current));
        }
    }

    best.map_or_else(SpikeOutcome::none, |(_, previous, current)| {
        SpikeOutcome::spike(previous, current)
    })
}

/// Every drastic increase in index order.
///
/// Each event carries the label of the later sample of its pair;
/// a missing label yields `None`.
pub fn find_spikes(labels: &[Option<String>], values: &[f64]) -> Vec<SpikeEvent> {
    values
        .windows(2)
        .enumerate()
        .filter_map(|(i, pair)| {
            let delta = pair[1] - pair[0];
            (delta >= SPIKE_THRESHOLD).then(|| SpikeEvent {
                index: i + 1,
                timestamp: labels.get(i + 1).cloned().flatten(),
                previous: pair[0],
                current: pair[1],
                delta,
            })
        })
        .collect()
}
