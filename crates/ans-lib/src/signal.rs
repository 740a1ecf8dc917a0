use serde::{Deserialize, Serialize};

/// Basic typed time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Uniform sampling frequency in Hz
    pub fs: f64,
    /// Samples
    pub data: Vec<f64>,
}

impl TimeSeries {
    pub fn new(fs: f64, data: Vec<f64>) -> Self {
        Self { fs, data }
    }
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Detected beat onsets as sample indices and their timestamps (seconds).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeatEvents {
    pub indices: Vec<usize>,
    pub times: Vec<f64>,
}

impl BeatEvents {
    pub fn from_indices(indices: Vec<usize>, fs: f64) -> Self {
        let times = indices.iter().map(|&i| i as f64 / fs).collect();
        Self { indices, times }
    }
    pub fn len(&self) -> usize {
        self.indices.len()
    }
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Inter-beat intervals (seconds), each stamped with the time of the beat
/// that closes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IbiSeries {
    pub times: Vec<f64>,
    pub intervals: Vec<f64>,
}

impl IbiSeries {
    pub fn len(&self) -> usize {
        self.intervals.len()
    }
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}

/// IBI values on a uniform grid `times[i] = i * dt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResampledIbi {
    pub dt: f64,
    pub times: Vec<f64>,
    pub values: Vec<f64>,
}

impl ResampledIbi {
    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
