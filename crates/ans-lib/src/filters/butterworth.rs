use crate::{
    config::{validate_filter, FilterConfig},
    error::{AnsError, Result},
    signal::TimeSeries,
};
use log::debug;
use realfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// One second-order section, `a[0]` normalised to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Biquad {
    pub b: [f64; 3],
    pub a: [f64; 3],
}

impl Biquad {
    fn dc_gain(&self) -> f64 {
        (self.b[0] + self.b[1] + self.b[2]) / (self.a[0] + self.a[1] + self.a[2])
    }

    /// Transposed direct form II state reached after a long unit step.
    fn step_state(&self) -> [f64; 2] {
        let g = self.dc_gain();
        let z2 = self.b[2] - self.a[2] * g;
        let z1 = self.b[1] - self.a[1] * g + z2;
        [z1, z2]
    }

    fn response(&self, z_inv: Complex64) -> Complex64 {
        let z_inv2 = z_inv * z_inv;
        let num = self.b[0] + z_inv * self.b[1] + z_inv2 * self.b[2];
        let den = self.a[0] + z_inv * self.a[1] + z_inv2 * self.a[2];
        num / den
    }
}

/// Cascade of second-order sections designed for a fixed sampling rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SosFilter {
    pub fs: f64,
    pub sections: Vec<Biquad>,
}

/// Design a digital Butterworth bandpass of prototype order `order`.
///
/// The analog low-pass prototype is shifted to the band between the prewarped
/// edges and mapped to the z-plane with the bilinear transform, so the -3 dB
/// points land exactly on `low` and `high`. The result has `order` sections;
/// the overall gain sits on the first one.
pub fn design_bandpass(low: f64, high: f64, order: usize, fs: f64) -> Result<SosFilter> {
    validate_filter(
        &FilterConfig {
            low_cut: low,
            high_cut: high,
            order,
        },
        fs,
    )?;

    let fs2 = 2.0 * fs;
    let wl = fs2 * (PI * low / fs).tan();
    let wh = fs2 * (PI * high / fs).tan();
    let bw = wh - wl;
    let w0_sq = wl * wh;

    let mut analog = Vec::with_capacity(2 * order);
    for k in 0..order {
        let theta = PI * (2 * k + order + 1) as f64 / (2 * order) as f64;
        let proto = Complex64::from_polar(1.0, theta);
        let shifted = proto * (bw / 2.0);
        let disc = (shifted * shifted - w0_sq).sqrt();
        analog.push(shifted + disc);
        analog.push(shifted - disc);
    }

    // N zeros at s = 0 (→ z = 1) and N at infinity (→ z = -1).
    let mut denom = Complex64::new(1.0, 0.0);
    for &p in &analog {
        denom *= fs2 - p;
    }
    let gain = ((bw * fs2).powi(order as i32) / denom).re;

    let digital: Vec<Complex64> = analog.iter().map(|&p| (fs2 + p) / (fs2 - p)).collect();
    let mut sections = pair_poles(&digital);
    if let Some(first) = sections.first_mut() {
        for coeff in first.b.iter_mut() {
            *coeff *= gain;
        }
    }

    debug!(
        "designed butterworth bandpass {low}-{high} Hz, order {order}, {} sections at {fs} Hz",
        sections.len()
    );
    Ok(SosFilter { fs, sections })
}

fn pair_poles(poles: &[Complex64]) -> Vec<Biquad> {
    const IMAG_EPS: f64 = 1e-10;
    let mut sections = Vec::with_capacity(poles.len() / 2);
    let mut real: Vec<f64> = Vec::new();
    for p in poles {
        if p.im > IMAG_EPS {
            sections.push(Biquad {
                b: [1.0, 0.0, -1.0],
                a: [1.0, -2.0 * p.re, p.norm_sqr()],
            });
        } else if p.im.abs() <= IMAG_EPS {
            real.push(p.re);
        }
    }
    real.sort_by(|a, b| a.total_cmp(b));
    for pair in real.chunks(2) {
        let (r1, r2) = (pair[0], pair.get(1).copied().unwrap_or(0.0));
        sections.push(Biquad {
            b: [1.0, 0.0, -1.0],
            a: [1.0, -(r1 + r2), r1 * r2],
        });
    }
    sections
}

impl SosFilter {
    /// Samples of odd extension added to each end by [`SosFilter::filtfilt`].
    pub fn padlen(&self) -> usize {
        3 * (2 * self.sections.len() + 1)
    }

    /// Shortest input [`SosFilter::filtfilt`] accepts.
    pub fn min_input_len(&self) -> usize {
        self.padlen() + 1
    }

    /// Single causal pass starting from rest.
    pub fn filter(&self, data: &[f64]) -> Vec<f64> {
        let mut state = vec![[0.0; 2]; self.sections.len()];
        self.run(data, &mut state)
    }

    /// Zero-phase forward/backward filtering.
    ///
    /// Both passes start from the steady state for a step at the edge sample,
    /// after padding each end with its odd reflection.
    pub fn filtfilt(&self, data: &[f64]) -> Result<Vec<f64>> {
        let padlen = self.padlen();
        let n = data.len();
        if n < self.min_input_len() {
            return Err(AnsError::InsufficientData {
                stage: "bandpass filter",
                required: self.min_input_len(),
                actual: n,
            });
        }

        let ext = odd_extend(data, padlen);
        let zi = self.step_states();

        let mut state = scaled(&zi, ext[0]);
        let mut y = self.run(&ext, &mut state);
        y.reverse();
        let mut state = scaled(&zi, y[0]);
        let mut y = self.run(&y, &mut state);
        y.reverse();

        Ok(y[padlen..padlen + n].to_vec())
    }

    /// Magnitude response |H(f)| at each frequency (Hz).
    pub fn frequency_response(&self, freqs: &[f64]) -> Vec<f64> {
        freqs
            .iter()
            .map(|&f| {
                let z_inv = Complex64::from_polar(1.0, -2.0 * PI * f / self.fs);
                self.sections
                    .iter()
                    .fold(Complex64::new(1.0, 0.0), |acc, s| acc * s.response(z_inv))
                    .norm()
            })
            .collect()
    }

    pub fn impulse_response(&self, len: usize) -> Vec<f64> {
        let mut impulse = vec![0.0; len];
        if let Some(first) = impulse.first_mut() {
            *first = 1.0;
        }
        self.filter(&impulse)
    }

    fn step_states(&self) -> Vec<[f64; 2]> {
        let mut scale = 1.0;
        self.sections
            .iter()
            .map(|s| {
                let [z1, z2] = s.step_state();
                let zi = [z1 * scale, z2 * scale];
                scale *= s.dc_gain();
                zi
            })
            .collect()
    }

    fn run(&self, data: &[f64], state: &mut [[f64; 2]]) -> Vec<f64> {
        let mut out = Vec::with_capacity(data.len());
        for &x in data {
            let mut v = x;
            for (s, z) in self.sections.iter().zip(state.iter_mut()) {
                let y = s.b[0] * v + z[0];
                z[0] = s.b[1] * v - s.a[1] * y + z[1];
                z[1] = s.b[2] * v - s.a[2] * y;
                v = y;
            }
            out.push(v);
        }
        out
    }
}

fn scaled(zi: &[[f64; 2]], x0: f64) -> Vec<[f64; 2]> {
    zi.iter().map(|z| [z[0] * x0, z[1] * x0]).collect()
}

fn odd_extend(data: &[f64], padlen: usize) -> Vec<f64> {
    let n = data.len();
    let first = data[0];
    let last = data[n - 1];
    let mut ext = Vec::with_capacity(n + 2 * padlen);
    ext.extend((1..=padlen).rev().map(|i| 2.0 * first - data[i]));
    ext.extend_from_slice(data);
    ext.extend((1..=padlen).map(|i| 2.0 * last - data[n - 1 - i]));
    ext
}

/// Bandpass stage: zero-phase Butterworth filtering of a recording.
pub fn bandpass(ts: &TimeSeries, cfg: &FilterConfig) -> Result<TimeSeries> {
    let sos = design_bandpass(cfg.low_cut, cfg.high_cut, cfg.order, ts.fs)?;
    let data = sos.filtfilt(&ts.data)?;
    debug!("bandpass filtered {} samples", data.len());
    Ok(TimeSeries { fs: ts.fs, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: f64 = 500.0;

    fn default_filter() -> SosFilter {
        design_bandpass(0.5, 2.5, 2, FS).unwrap()
    }

    fn sine(freq: f64, seconds: f64) -> Vec<f64> {
        let n = (seconds * FS) as usize;
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / FS).sin())
            .collect()
    }

    fn peak_abs(data: &[f64]) -> f64 {
        data.iter().fold(0.0, |acc: f64, x| acc.max(x.abs()))
    }

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        let diff = (actual - expected).abs();
        assert!(
            diff <= tol,
            "expected {expected}, got {actual} (diff {diff} > tol {tol})"
        );
    }

    #[test]
    fn design_has_one_section_per_order() {
        for order in 1..=4 {
            let sos = design_bandpass(0.5, 2.5, order, FS).unwrap();
            assert_eq!(sos.sections.len(), order);
        }
    }

    #[test]
    fn response_is_zero_at_dc_and_nyquist() {
        let sos = default_filter();
        let h = sos.frequency_response(&[0.0, FS / 2.0]);
        assert!(h[0] < 1e-9, "dc gain {}", h[0]);
        assert!(h[1] < 1e-9, "nyquist gain {}", h[1]);
    }

    #[test]
    fn edges_sit_at_half_power() {
        let sos = default_filter();
        let h = sos.frequency_response(&[0.5, 2.5]);
        let half_power = std::f64::consts::FRAC_1_SQRT_2;
        assert_close(h[0], half_power, 1e-6);
        assert_close(h[1], half_power, 1e-6);
    }

    #[test]
    fn unit_gain_at_band_centre() {
        let sos = default_filter();
        let fs2 = 2.0 * FS;
        let wl = fs2 * (PI * 0.5 / FS).tan();
        let wh = fs2 * (PI * 2.5 / FS).tan();
        let centre = FS / PI * ((wl * wh).sqrt() / fs2).atan();
        let h = sos.frequency_response(&[centre]);
        assert_close(h[0], 1.0, 1e-6);
    }

    #[test]
    fn filtfilt_keeps_impulse_in_place() {
        let sos = default_filter();
        let mut data = vec![0.0; 5000];
        data[2500] = 1.0;
        let out = sos.filtfilt(&data).unwrap();
        assert_eq!(out.len(), data.len());
        let peak = out
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert!(
            (peak as isize - 2500).abs() <= 1,
            "impulse moved to {peak}"
        );
    }

    #[test]
    fn single_pass_shifts_impulse() {
        let sos = default_filter();
        let mut data = vec![0.0; 5000];
        data[2500] = 1.0;
        let out = sos.filter(&data);
        let peak = out
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert!(peak > 2510, "causal pass should delay the peak, got {peak}");
    }

    #[test]
    fn passband_sine_keeps_amplitude() {
        let sos = default_filter();
        let out = sos.filtfilt(&sine(1.0, 10.0)).unwrap();
        let amp = peak_abs(&out[2000..3000]);
        assert!((0.97..=1.01).contains(&amp), "amplitude {amp}");
    }

    #[test]
    fn mains_hum_is_rejected() {
        let sos = default_filter();
        let out = sos.filtfilt(&sine(50.0, 10.0)).unwrap();
        let amp = peak_abs(&out[2000..3000]);
        assert!(amp < 0.01, "50 Hz leaked with amplitude {amp}");
    }

    #[test]
    fn short_input_is_insufficient() {
        let sos = default_filter();
        assert_eq!(sos.padlen(), 15);
        assert_eq!(sos.min_input_len(), 16);
        let err = sos.filtfilt(&[0.0; 15]).unwrap_err();
        assert!(matches!(
            err,
            AnsError::InsufficientData {
                required: 16,
                actual: 15,
                ..
            }
        ));
        assert!(sos.filtfilt(&[0.0; 16]).is_ok());
    }

    #[test]
    fn constant_input_filters_to_zero() {
        let sos = default_filter();
        let out = sos.filtfilt(&vec![3.0; 2000]).unwrap();
        assert!(peak_abs(&out) < 1e-9);
    }

    #[test]
    fn rejects_invalid_design() {
        assert!(design_bandpass(0.5, 2.5, 0, FS).is_err());
        assert!(design_bandpass(2.5, 0.5, 2, FS).is_err());
        assert!(design_bandpass(0.5, 260.0, 2, FS).is_err());
    }

    #[test]
    fn impulse_response_decays() {
        let sos = default_filter();
        let h = sos.impulse_response(10_000);
        assert_eq!(h.len(), 10_000);
        assert!(peak_abs(&h[9000..]) < 1e-6);
    }

    #[test]
    fn bandpass_stage_preserves_rate_and_length() {
        let ts = TimeSeries::new(FS, sine(1.2, 4.0));
        let out = bandpass(&ts, &FilterConfig::default()).unwrap();
        assert_eq!(out.fs, FS);
        assert_eq!(out.len(), ts.len());
    }
}
