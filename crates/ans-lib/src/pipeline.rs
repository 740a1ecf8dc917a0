use crate::{
    config::{Activity, AnalysisConfig},
    detectors::detect_beats,
    error::{AnsError, Result},
    filters::bandpass,
    io::text::load_recording,
    metrics::{
        ibi::{hrv_scalar, ibi_series, ibi_time_domain, resample_ibi, IbiTimeDomain},
        spectrum::{extract_bands, lf_hf_ratio, power_spectrum, SpectralBands, Spectrum},
    },
    signal::{BeatEvents, IbiSeries, ResampledIbi, TimeSeries},
};
use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Every artifact produced for one recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingAnalysis {
    pub filtered: TimeSeries,
    pub beats: BeatEvents,
    pub ibi: IbiSeries,
    pub resampled: ResampledIbi,
    pub hrv: f64,
    pub time_domain: IbiTimeDomain,
    pub spectrum: Spectrum,
    pub bands: SpectralBands,
    pub lf_hf: f64,
}

/// Scalar outcome row for one recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub activity: Option<Activity>,
    pub beats: usize,
    pub mean_hr_bpm: f64,
    pub hrv: f64,
    pub sdnn: f64,
    pub rmssd: f64,
    pub lf_power: f64,
    pub hf_power: f64,
    pub lf_hf: f64,
}

impl RecordingAnalysis {
    pub fn summary(&self, activity: Option<Activity>) -> ActivitySummary {
        ActivitySummary {
            activity,
            beats: self.beats.len(),
            mean_hr_bpm: self.time_domain.mean_hr_bpm,
            hrv: self.hrv,
            sdnn: self.time_domain.sdnn,
            rmssd: self.time_domain.rmssd,
            lf_power: self.bands.lf.total_power(),
            hf_power: self.bands.hf.total_power(),
            lf_hf: self.lf_hf,
        }
    }
}

/// Run filter → beats → IBI → resampling → spectrum → LF/HF on one recording.
pub fn analyze_recording(
    raw: &TimeSeries,
    threshold: f64,
    cfg: &AnalysisConfig,
) -> Result<RecordingAnalysis> {
    cfg.validate()?;
    let filtered = bandpass(raw, &cfg.filter)?;
    let beats = detect_beats(&filtered, threshold);
    let ibi = ibi_series(&beats)?;
    let resampled = resample_ibi(&ibi, cfg.resample_dt)?;
    let hrv = hrv_scalar(&resampled);
    let time_domain = ibi_time_domain(&ibi);
    let spectrum = power_spectrum(&resampled)?;
    let bands = extract_bands(&spectrum, &cfg.bands);
    let lf_hf = lf_hf_ratio(&bands)?;
    debug!(
        "recording analysed: {} beats, hrv {hrv:.4} s, LF/HF {lf_hf:.3}",
        beats.len()
    );
    Ok(RecordingAnalysis {
        filtered,
        beats,
        ibi,
        resampled,
        hrv,
        time_domain,
        spectrum,
        bands,
        lf_hf,
    })
}

/// One activity's raw recording and its beat threshold.
#[derive(Debug, Clone)]
pub struct ActivityRecording {
    pub activity: Activity,
    pub signal: TimeSeries,
    pub threshold: f64,
}

#[derive(Debug)]
pub struct ActivityOutcome {
    pub activity: Activity,
    /// Unfiltered recording, `None` when it could not be loaded.
    pub raw: Option<TimeSeries>,
    pub result: Result<RecordingAnalysis>,
}

/// Analyse each activity independently and in parallel.
///
/// A failing activity is logged and reported in its outcome; the others still
/// run. Outcomes keep the input order.
pub fn analyze_activities(
    recordings: Vec<ActivityRecording>,
    cfg: &AnalysisConfig,
) -> Vec<ActivityOutcome> {
    recordings
        .into_par_iter()
        .map(|rec| {
            let result = analyze_recording(&rec.signal, rec.threshold, cfg);
            if let Err(err) = &result {
                warn!("{}: analysis failed: {err}", rec.activity);
            }
            ActivityOutcome {
                activity: rec.activity,
                raw: Some(rec.signal),
                result,
            }
        })
        .collect()
}

/// Load every activity listed in the config, keeping load failures as outcomes.
pub fn load_and_analyze(cfg: &AnalysisConfig) -> Vec<ActivityOutcome> {
    let mut outcomes = Vec::new();
    let mut recordings = Vec::new();
    for (&activity, spec) in &cfg.activities {
        match load_recording(&spec.input, cfg) {
            Ok(signal) => recordings.push(ActivityRecording {
                activity,
                signal,
                threshold: spec.threshold,
            }),
            Err(err) => {
                warn!("{activity}: could not load {}: {err}", spec.input.display());
                outcomes.push(ActivityOutcome {
                    activity,
                    raw: None,
                    result: Err(err),
                });
            }
        }
    }
    outcomes.extend(analyze_activities(recordings, cfg));
    outcomes.sort_by_key(|o| o.activity);
    outcomes
}

impl ActivityOutcome {
    pub fn summary(&self) -> Option<ActivitySummary> {
        self.result
            .as_ref()
            .ok()
            .map(|analysis| analysis.summary(Some(self.activity)))
    }

    pub fn error(&self) -> Option<&AnsError> {
        self.result.as_ref().err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: f64 = 500.0;

    /// Narrow pulses every `period_s` seconds on a flat baseline.
    fn pulse_train(seconds: f64, period_s: f64) -> TimeSeries {
        let n = (seconds * FS) as usize;
        let period = (period_s * FS).round() as usize;
        let mut data = vec![0.0; n];
        for start in (period..n).step_by(period) {
            for sample in data.iter_mut().skip(start).take(10) {
                *sample = 1.0;
            }
        }
        TimeSeries::new(FS, data)
    }

    /// ECG-like bumps whose spacing is modulated at `mod_hz`.
    fn modulated_ecg(seconds: f64, mod_hz: f64) -> TimeSeries {
        let mut beats = Vec::new();
        let mut t = 0.5;
        while t < seconds - 0.5 {
            beats.push(t);
            t += 0.85 + 0.08 * (2.0 * std::f64::consts::PI * mod_hz * t).sin();
        }
        let n = (seconds * FS) as usize;
        let data = (0..n)
            .map(|i| {
                let time = i as f64 / FS;
                beats
                    .iter()
                    .map(|&bt| (-0.5 * ((time - bt) / 0.02).powi(2)).exp())
                    .sum()
            })
            .collect();
        TimeSeries::new(FS, data)
    }

    fn peak(data: &[f64]) -> f64 {
        data.iter().fold(f64::MIN, |acc, &x| acc.max(x))
    }

    #[test]
    fn regular_sixty_bpm_has_flat_intervals() {
        let raw = pulse_train(10.0, 1.0);
        let cfg = AnalysisConfig::default();
        let filtered = bandpass(&raw, &cfg.filter).unwrap();
        let threshold = 0.5 * peak(&filtered.data);
        let beats = detect_beats(&filtered, threshold);
        assert!(
            (9..=10).contains(&beats.len()),
            "found {} beats",
            beats.len()
        );
        let ibi = ibi_series(&beats).unwrap();
        let last = ibi.len() - 1;
        let interior = IbiSeries {
            times: ibi.times[1..last].to_vec(),
            intervals: ibi.intervals[1..last].to_vec(),
        };
        for &interval in &interior.intervals {
            assert!((interval - 1.0).abs() < 0.02, "interval {interval}");
        }
        let resampled = resample_ibi(&interior, cfg.resample_dt).unwrap();
        let hrv = hrv_scalar(&resampled);
        assert!(hrv < 0.005, "hrv {hrv}");
    }

    #[test]
    fn modulated_recording_runs_end_to_end() {
        let raw = modulated_ecg(120.0, 0.1);
        let cfg = AnalysisConfig::default();
        let filtered = bandpass(&raw, &cfg.filter).unwrap();
        let threshold = 0.3 * peak(&filtered.data);
        let analysis = analyze_recording(&raw, threshold, &cfg).unwrap();
        assert!(analysis.beats.len() > 100);
        assert_eq!(analysis.ibi.len(), analysis.beats.len() - 1);
        assert_eq!(analysis.filtered.len(), raw.len());
        assert!(analysis.hrv > 0.0);
        assert!(analysis.lf_hf > 1.0, "LF/HF {}", analysis.lf_hf);
        let summary = analysis.summary(Some(Activity::Rest));
        assert_eq!(summary.beats, analysis.beats.len());
        assert!(summary.mean_hr_bpm > 60.0 && summary.mean_hr_bpm < 80.0);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["activity"], "rest");
    }

    #[test]
    fn no_beats_fails_with_insufficient_beats() {
        let raw = pulse_train(10.0, 1.0);
        let err = analyze_recording(&raw, 10.0, &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(err, AnsError::InsufficientBeats { found: 0 }));
    }

    #[test]
    fn tiny_recording_fails_in_filter() {
        let raw = TimeSeries::new(FS, vec![0.0; 8]);
        let err = analyze_recording(&raw, 0.1, &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(err, AnsError::InsufficientData { .. }));
    }

    #[test]
    fn failing_activity_does_not_stop_the_batch() {
        let cfg = AnalysisConfig::default();
        let good = modulated_ecg(60.0, 0.1);
        let filtered = bandpass(&good, &cfg.filter).unwrap();
        let threshold = 0.3 * peak(&filtered.data);
        let recordings = vec![
            ActivityRecording {
                activity: Activity::Rest,
                signal: good.clone(),
                threshold,
            },
            ActivityRecording {
                activity: Activity::MentalStress,
                signal: good,
                threshold: 1e6,
            },
        ];
        let outcomes = analyze_activities(recordings, &cfg);
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].activity, Activity::Rest);
        assert!(outcomes[0].summary().is_some());
        assert_eq!(outcomes[0].raw.as_ref().map(TimeSeries::len), Some(30_000));
        assert!(matches!(
            outcomes[1].error(),
            Some(AnsError::InsufficientBeats { .. })
        ));
    }
}
