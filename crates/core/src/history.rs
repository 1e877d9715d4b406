use relay_source::SampleSource;

use crate::detect::{dedupe, find_spikes};
use crate::error::{InputError, RelayError};
use crate::types::RangeReport;

/// Fetch `[start, end]` and report one occurrence per spike episode.
///
/// Unlike evaluation there is no fallback: an upstream failure is returned
/// to the caller.
pub async fn occurrences_in_range(
    source: &dyn SampleSource,
    start: &str,
    end: &str,
) -> Result<RangeReport, RelayError> {
    let start = required("start", start)?;
    let end = required("end", end)?;

    let samples = source.fetch_range(start, end).await.map_err(|e| {
        tracing::warn!(source = source.name(), start, end, error = %e, "range fetch failed");
        RelayError::UpstreamUnavailable(e)
    })?;

    let events = find_spikes(&samples.labels, &samples.values);
    let raw = events.len();
    let occurrences = dedupe(events);
    tracing::info!(
        start,
        end,
        samples = samples.len(),
        raw_spikes = raw,
        occurrences = occurrences.len(),
        "range scanned"
    );

    Ok(RangeReport::new(start, end, occurrences))
}

fn required<'a>(name: &'static str, value: &'a str) -> Result<&'a str, InputError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(InputError::MissingParameter(name))
    } else {
        Ok(trimmed)
    }
}
