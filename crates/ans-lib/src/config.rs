use crate::error::{AnsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Recording condition a signal was captured under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Activity {
    Rest,
    Relaxation,
    MentalStress,
    PhysicalStress,
}

impl Activity {
    pub const ALL: [Activity; 4] = [
        Activity::Rest,
        Activity::Relaxation,
        Activity::MentalStress,
        Activity::PhysicalStress,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Activity::Rest => "Rest",
            Activity::Relaxation => "Relaxation",
            Activity::MentalStress => "Mental stress",
            Activity::PhysicalStress => "Physical stress",
        }
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Butterworth bandpass parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Lower passband edge (Hz).
    pub low_cut: f64,
    /// Upper passband edge (Hz).
    pub high_cut: f64,
    /// Prototype order; the bandpass has `order` second-order sections.
    pub order: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            low_cut: 0.5,
            high_cut: 2.5,
            order: 2,
        }
    }
}

/// Which band owns a spectral bin lying exactly on the edge LF and HF share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SharedBoundary {
    #[default]
    Both,
    Low,
    High,
}

/// LF/HF band edges (Hz, inclusive).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BandConfig {
    pub lf_band: [f64; 2],
    pub hf_band: [f64; 2],
    pub shared_boundary: SharedBoundary,
}

impl Default for BandConfig {
    fn default() -> Self {
        Self {
            lf_band: [0.04, 0.15],
            hf_band: [0.15, 0.4],
            shared_boundary: SharedBoundary::Both,
        }
    }
}

/// Per-activity input file and beat threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityConfig {
    pub input: PathBuf,
    pub threshold: f64,
}

/// Every tunable of the analysis chain, passed explicitly into each stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Sampling frequency of the raw recordings (Hz).
    pub sampling_rate: f64,
    /// Optional truncation of each recording (seconds).
    pub duration: Option<f64>,
    pub filter: FilterConfig,
    /// Step of the uniform IBI resampling grid (seconds).
    pub resample_dt: f64,
    pub bands: BandConfig,
    pub activities: BTreeMap<Activity, ActivityConfig>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 500.0,
            duration: None,
            filter: FilterConfig::default(),
            resample_dt: 0.1,
            bands: BandConfig::default(),
            activities: BTreeMap::new(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg: AnalysisConfig = toml::from_str(text)
            .map_err(|e| AnsError::InvalidParameter(format!("config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a TOML config; relative activity inputs resolve against the
    /// config file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| AnsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut cfg = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            for activity in cfg.activities.values_mut() {
                if activity.input.is_relative() {
                    activity.input = base.join(&activity.input);
                }
            }
        }
        Ok(cfg)
    }

    /// Number of samples to keep per recording, if truncation is requested.
    pub fn sample_limit(&self) -> Option<usize> {
        self.duration.map(|d| (d * self.sampling_rate).round() as usize)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.sampling_rate > 0.0 && self.sampling_rate.is_finite()) {
            return Err(invalid(format!(
                "sampling_rate must be positive, got {}",
                self.sampling_rate
            )));
        }
        if let Some(d) = self.duration {
            if !(d > 0.0) {
                return Err(invalid(format!("duration must be positive, got {d}")));
            }
        }
        validate_filter(&self.filter, self.sampling_rate)?;
        if !(self.resample_dt > 0.0 && self.resample_dt.is_finite()) {
            return Err(invalid(format!(
                "resample_dt must be positive, got {}",
                self.resample_dt
            )));
        }
        validate_bands(&self.bands)
    }
}

pub(crate) fn validate_filter(cfg: &FilterConfig, fs: f64) -> Result<()> {
    if cfg.order == 0 {
        return Err(invalid("filter order must be at least 1".into()));
    }
    let nyquist = fs * 0.5;
    if !(cfg.low_cut > 0.0 && cfg.low_cut < cfg.high_cut && cfg.high_cut < nyquist) {
        return Err(invalid(format!(
            "passband [{}, {}] Hz must satisfy 0 < low < high < {} Hz",
            cfg.low_cut, cfg.high_cut, nyquist
        )));
    }
    Ok(())
}

pub(crate) fn validate_bands(cfg: &BandConfig) -> Result<()> {
    for (name, band) in [("lf_band", cfg.lf_band), ("hf_band", cfg.hf_band)] {
        if !(band[0] >= 0.0 && band[0] < band[1]) {
            return Err(invalid(format!(
                "{name} [{}, {}] must satisfy 0 <= low < high",
                band[0], band[1]
            )));
        }
    }
    if cfg.lf_band[1] > cfg.hf_band[0] {
        return Err(invalid(format!(
            "lf_band upper edge {} overlaps hf_band lower edge {}",
            cfg.lf_band[1], cfg.hf_band[0]
        )));
    }
    Ok(())
}

fn invalid(message: String) -> AnsError {
    AnsError::InvalidParameter(message)
}
