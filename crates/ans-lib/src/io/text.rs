use crate::{
    config::AnalysisConfig,
    error::{AnsError, Result},
    signal::TimeSeries,
};
use log::debug;
use std::path::Path;

/// Parse whitespace/newline separated voltage samples, ignoring blank and
/// `#` comment lines. With `limit`, keep the first `limit` samples and
/// reject input that is shorter.
pub fn parse_samples(text: &str, limit: Option<usize>) -> Result<Vec<f64>> {
    let mut out = Vec::new();
    'lines: for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        for token in trimmed.split_whitespace() {
            if limit.is_some_and(|max| out.len() >= max) {
                break 'lines;
            }
            let val: f64 = token.parse().map_err(|_| AnsError::MalformedInput {
                line: idx + 1,
                message: format!("not a number: {token}"),
            })?;
            if !val.is_finite() {
                return Err(AnsError::MalformedInput {
                    line: idx + 1,
                    message: format!("non-finite sample: {token}"),
                });
            }
            out.push(val);
        }
    }
    if out.is_empty() {
        return Err(AnsError::MalformedInput {
            line: 0,
            message: "no numeric samples found".into(),
        });
    }
    if let Some(max) = limit {
        if out.len() < max {
            return Err(AnsError::MalformedInput {
                line: 0,
                message: format!("expected {max} samples, found {}", out.len()),
            });
        }
    }
    Ok(out)
}

/// Read samples from disk.
pub fn read_samples(path: &Path, limit: Option<usize>) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path).map_err(|source| AnsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_samples(&text, limit)
}

/// Load one activity recording at the configured rate and duration.
pub fn load_recording(path: &Path, cfg: &AnalysisConfig) -> Result<TimeSeries> {
    let data = read_samples(path, cfg.sample_limit())?;
    debug!("loaded {} samples from {}", data.len(), path.display());
    Ok(TimeSeries::new(cfg.sampling_rate, data))
}

/// Join recordings end to end; all must share one sampling rate.
pub fn concatenate(series: &[TimeSeries]) -> Result<TimeSeries> {
    let Some(first) = series.first() else {
        return Err(AnsError::MalformedInput {
            line: 0,
            message: "nothing to concatenate".into(),
        });
    };
    if let Some(other) = series.iter().find(|ts| ts.fs != first.fs) {
        return Err(AnsError::MalformedInput {
            line: 0,
            message: format!(
                "sampling rates differ: {} Hz vs {} Hz",
                first.fs, other.fs
            ),
        });
    }
    let data = series.iter().flat_map(|ts| ts.data.iter().copied()).collect();
    Ok(TimeSeries::new(first.fs, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_mixed_whitespace_and_comments() {
        let text = "# lead II\n0.1 0.2\t0.3\n\n  -0.4\n1e-2\n";
        assert_eq!(
            parse_samples(text, None).unwrap(),
            vec![0.1, 0.2, 0.3, -0.4, 0.01]
        );
    }

    #[test]
    fn truncates_to_limit() {
        let text = "1 2 3\n4 5 6\n";
        assert_eq!(parse_samples(text, Some(4)).unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn tokens_past_the_limit_are_not_parsed() {
        let text = "1 2 3\nnot-a-number\n";
        assert_eq!(parse_samples(text, Some(3)).unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn reports_line_of_bad_token() {
        let err = parse_samples("1.0\n2.0\nabc\n", None).unwrap_err();
        assert!(matches!(err, AnsError::MalformedInput { line: 3, .. }));
    }

    #[test]
    fn short_input_is_inconsistent() {
        let err = parse_samples("1 2 3", Some(10)).unwrap_err();
        assert!(matches!(err, AnsError::MalformedInput { .. }));
    }

    #[test]
    fn empty_input_is_malformed() {
        assert!(parse_samples("# nothing\n\n", None).is_err());
    }

    #[test]
    fn rejects_non_finite_samples() {
        assert!(parse_samples("1.0 NaN", None).is_err());
        assert!(parse_samples("inf", None).is_err());
    }

    #[test]
    fn load_recording_applies_duration() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for i in 0..100 {
            writeln!(file, "{}", i as f64 * 0.01).unwrap();
        }
        let cfg = AnalysisConfig {
            sampling_rate: 10.0,
            duration: Some(5.0),
            ..AnalysisConfig::default()
        };
        let ts = load_recording(file.path(), &cfg).unwrap();
        assert_eq!(ts.fs, 10.0);
        assert_eq!(ts.len(), 50);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_samples(Path::new("/definitely/not/here.txt"), None).unwrap_err();
        assert!(matches!(err, AnsError::Io { .. }));
    }

    #[test]
    fn concatenate_joins_same_rate() {
        let a = TimeSeries::new(500.0, vec![1.0, 2.0]);
        let b = TimeSeries::new(500.0, vec![3.0]);
        let joined = concatenate(&[a, b]).unwrap();
        assert_eq!(joined.data, vec![1.0, 2.0, 3.0]);
        assert_eq!(joined.fs, 500.0);
    }

    #[test]
    fn concatenate_rejects_mixed_rates() {
        let a = TimeSeries::new(500.0, vec![1.0]);
        let b = TimeSeries::new(250.0, vec![1.0]);
        assert!(concatenate(&[a, b]).is_err());
        assert!(concatenate(&[]).is_err());
    }
}
