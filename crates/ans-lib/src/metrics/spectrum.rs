use crate::{
    config::{BandConfig, SharedBoundary},
    error::{AnsError, Result},
    signal::ResampledIbi,
};
use log::debug;
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};

const EDGE_TOL: f64 = 1e-9;

/// One-sided power spectrum as `[frequency, power]` points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spectrum {
    pub points: Vec<[f64; 2]>,
}

impl Spectrum {
    pub fn len(&self) -> usize {
        self.points.len()
    }
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
    pub fn freqs(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p[0])
    }
    pub fn powers(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p[1])
    }
    pub fn total_power(&self) -> f64 {
        self.powers().sum()
    }
}

/// Spectrum points that fall inside one frequency band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandPower {
    pub range: [f64; 2],
    pub points: Vec<[f64; 2]>,
}

impl BandPower {
    pub fn len(&self) -> usize {
        self.points.len()
    }
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
    pub fn total_power(&self) -> f64 {
        self.points.iter().map(|p| p[1]).sum()
    }
    /// Mean power per bin, `None` for an empty band.
    pub fn mean_power(&self) -> Option<f64> {
        if self.points.is_empty() {
            None
        } else {
            Some(self.total_power() / self.points.len() as f64)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectralBands {
    pub lf: BandPower,
    pub hf: BandPower,
}

/// Power spectrum of the mean-removed resampled IBI series.
///
/// Bins run from 0 Hz to the Nyquist frequency `0.5 / dt` in steps of
/// `1 / (n * dt)`; power is the squared magnitude of each coefficient.
pub fn power_spectrum(resampled: &ResampledIbi) -> Result<Spectrum> {
    let n = resampled.values.len();
    if n < 2 {
        return Err(AnsError::InsufficientData {
            stage: "power spectrum",
            required: 2,
            actual: n,
        });
    }
    let mean = resampled.values.iter().sum::<f64>() / n as f64;
    let mut frame: Vec<f64> = resampled.values.iter().map(|v| v - mean).collect();

    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(n);
    let mut spectrum = r2c.make_output_vec();
    r2c.process(&mut frame, &mut spectrum)
        .map_err(|e| AnsError::InvalidParameter(format!("real FFT failed: {e}")))?;

    let span = n as f64 * resampled.dt;
    let points: Vec<[f64; 2]> = spectrum
        .iter()
        .enumerate()
        .map(|(k, c)| [k as f64 / span, c.norm_sqr()])
        .collect();
    debug!(
        "power spectrum: {} bins up to {:.3} Hz",
        points.len(),
        points.last().map(|p| p[0]).unwrap_or(0.0)
    );
    Ok(Spectrum { points })
}

/// Split the spectrum into LF and HF bands by frequency membership.
///
/// Membership is inclusive at both edges and zero-power bins are kept. A bin
/// sitting exactly on an edge shared by both bands goes where
/// `cfg.shared_boundary` says.
pub fn extract_bands(spectrum: &Spectrum, cfg: &BandConfig) -> SpectralBands {
    let shared = (cfg.lf_band[1] - cfg.hf_band[0]).abs() <= EDGE_TOL;
    let on_shared = |f: f64| shared && (f - cfg.hf_band[0]).abs() <= EDGE_TOL;

    let lf = select(spectrum, cfg.lf_band, |f| {
        !(on_shared(f) && cfg.shared_boundary == SharedBoundary::High)
    });
    let hf = select(spectrum, cfg.hf_band, |f| {
        !(on_shared(f) && cfg.shared_boundary == SharedBoundary::Low)
    });
    debug!("LF band {} bins, HF band {} bins", lf.len(), hf.len());
    SpectralBands { lf, hf }
}

fn select(spectrum: &Spectrum, range: [f64; 2], keep: impl Fn(f64) -> bool) -> BandPower {
    let points = spectrum
        .points
        .iter()
        .filter(|p| p[0] >= range[0] - EDGE_TOL && p[0] <= range[1] + EDGE_TOL && keep(p[0]))
        .copied()
        .collect();
    BandPower { range, points }
}

/// Mean LF power over mean HF power.
pub fn lf_hf_ratio(bands: &SpectralBands) -> Result<f64> {
    let lf = bands
        .lf
        .mean_power()
        .ok_or(AnsError::DivisionUndefined { band: "LF" })?;
    let hf = bands
        .hf
        .mean_power()
        .ok_or(AnsError::DivisionUndefined { band: "HF" })?;
    if hf <= 0.0 {
        return Err(AnsError::DivisionUndefined { band: "HF" });
    }
    Ok(lf / hf)
}
