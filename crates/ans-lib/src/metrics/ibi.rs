use crate::{
    error::{AnsError, Result},
    signal::{BeatEvents, IbiSeries, ResampledIbi},
};
use log::debug;
use serde::{Deserialize, Serialize};

/// Time-domain summary of the raw (non-resampled) intervals.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IbiTimeDomain {
    pub n: usize,
    /// Mean interval (s).
    pub mean_ibi: f64,
    /// Sample standard deviation of the intervals (s).
    pub sdnn: f64,
    pub rmssd: f64,
    pub pnn50: f64,
    pub mean_hr_bpm: f64,
}

/// Successive beat-to-beat intervals, stamped with the closing beat's time.
pub fn ibi_series(beats: &BeatEvents) -> Result<IbiSeries> {
    ibi_from_times(&beats.times)
}

/// Intervals from bare beat times (seconds), e.g. an external annotation file.
pub fn ibi_from_times(times: &[f64]) -> Result<IbiSeries> {
    if times.len() < 2 {
        return Err(AnsError::InsufficientBeats { found: times.len() });
    }
    if times.windows(2).any(|w| w[1] <= w[0]) {
        return Err(AnsError::InvalidParameter(
            "beat times must be strictly increasing".into(),
        ));
    }
    let intervals = times.windows(2).map(|w| w[1] - w[0]).collect();
    Ok(IbiSeries {
        times: times[1..].to_vec(),
        intervals,
    })
}

/// Interpolate the intervals onto `t = 0, dt, 2dt, ...` up to (excluding) the
/// last beat. Outside the span of known intervals the nearest end value holds.
pub fn resample_ibi(ibi: &IbiSeries, dt: f64) -> Result<ResampledIbi> {
    if !(dt > 0.0 && dt.is_finite()) {
        return Err(AnsError::InvalidParameter(format!(
            "resample step must be positive, got {dt}"
        )));
    }
    let end = match ibi.times.last() {
        Some(&t) if ibi.times.len() == ibi.intervals.len() => t,
        _ => {
            return Err(AnsError::InsufficientData {
                stage: "IBI resampling",
                required: 1,
                actual: ibi.intervals.len().min(ibi.times.len()),
            })
        }
    };

    let n = grid_len(end, dt);
    if n < 2 {
        return Err(AnsError::InsufficientData {
            stage: "IBI resampling",
            required: 2,
            actual: n,
        });
    }

    let times: Vec<f64> = (0..n).map(|i| i as f64 * dt).collect();
    let values = times
        .iter()
        .map(|&t| interp_clamped(t, &ibi.times, &ibi.intervals))
        .collect();
    debug!("resampled {} intervals onto {n} points (dt {dt} s)", ibi.len());
    Ok(ResampledIbi { dt, times, values })
}

/// Population standard deviation of the resampled intervals.
pub fn hrv_scalar(resampled: &ResampledIbi) -> f64 {
    let n = resampled.values.len();
    if n == 0 {
        return 0.0;
    }
    let mean = resampled.values.iter().sum::<f64>() / n as f64;
    let var = resampled
        .values
        .iter()
        .map(|v| (v - mean).powi(2))
        .sum::<f64>()
        / n as f64;
    var.sqrt()
}

pub fn ibi_time_domain(ibi: &IbiSeries) -> IbiTimeDomain {
    let rr = &ibi.intervals;
    let n = rr.len();
    let mean_ibi = if n > 0 {
        rr.iter().sum::<f64>() / n as f64
    } else {
        0.0
    };
    let sdnn = if n > 1 {
        (rr.iter().map(|x| (x - mean_ibi).powi(2)).sum::<f64>() / (n as f64 - 1.0)).sqrt()
    } else {
        0.0
    };
    let rmssd = if n > 1 {
        let diffs = rr.windows(2).map(|w| (w[1] - w[0]).powi(2));
        (diffs.sum::<f64>() / (n as f64 - 1.0)).sqrt()
    } else {
        0.0
    };
    let pnn50 = if n > 1 {
        let count = rr.windows(2).filter(|w| (w[1] - w[0]).abs() > 0.050).count();
        count as f64 / (n as f64 - 1.0)
    } else {
        0.0
    };
    let mean_hr_bpm = if mean_ibi > 0.0 { 60.0 / mean_ibi } else { 0.0 };

    IbiTimeDomain {
        n,
        mean_ibi,
        sdnn,
        rmssd,
        pnn50,
        mean_hr_bpm,
    }
}

/// Grid points `i * dt` strictly below `end`; an `end` that is a whole number
/// of steps (up to rounding) is excluded.
fn grid_len(end: f64, dt: f64) -> usize {
    if !(end > 0.0) {
        return 0;
    }
    let steps = end / dt;
    let nearest = steps.round();
    if (steps - nearest).abs() < 1e-9 {
        nearest as usize
    } else {
        steps.ceil() as usize
    }
}

fn interp_clamped(t: f64, xs: &[f64], ys: &[f64]) -> f64 {
    let last = xs.len() - 1;
    if t <= xs[0] {
        return ys[0];
    }
    if t >= xs[last] {
        return ys[last];
    }
    let j = xs.partition_point(|&x| x <= t);
    let (x0, x1) = (xs[j - 1], xs[j]);
    let (y0, y1) = (ys[j - 1], ys[j]);
    y0 + (y1 - y0) * (t - x0) / (x1 - x0)
}
