use crate::signal::{BeatEvents, TimeSeries};
use log::debug;

/// Locate beat onsets as rising threshold crossings.
///
/// Every contiguous run of samples at or above `threshold` yields one beat,
/// keyed by the run's first sample; a run that starts at sample 0 counts.
/// A signal that never reaches the threshold gives an empty result.
pub fn detect_beats(ts: &TimeSeries, threshold: f64) -> BeatEvents {
    let mut indices = Vec::new();
    let mut above = false;
    for (i, &sample) in ts.data.iter().enumerate() {
        let now = sample >= threshold;
        if now && !above {
            indices.push(i);
        }
        above = now;
    }
    debug!(
        "detected {} beats over {} samples (threshold {threshold})",
        indices.len(),
        ts.len()
    );
    BeatEvents::from_indices(indices, ts.fs)
}
