//! Plain figure descriptions built from analysis results.
//!
//! Nothing here draws; renderers (the CLI's plotters backend) consume
//! [`Figure`] values.

use crate::{
    config::Activity,
    filters::SosFilter,
    metrics::spectrum::{SpectralBands, Spectrum},
    signal::{BeatEvents, ResampledIbi, TimeSeries},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub dash: Option<[f32; 2]>,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(&self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub size: f32,
    pub color: Color,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarSeries {
    pub name: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub color: Color,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
    Markers(MarkerSeries),
    Bars(BarSeries),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis { label: None },
            y: Axis { label: None },
            series: Vec::new(),
        }
    }

    pub fn with_axes(mut self, x: &str, y: &str) -> Self {
        self.x.label = Some(x.into());
        self.y.label = Some(y.into());
        self
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    /// All `[x, y]` points of line and marker series.
    pub fn xy_points(&self) -> impl Iterator<Item = [f64; 2]> + '_ {
        self.series.iter().flat_map(|series| match series {
            Series::Line(line) => line.points.iter().copied().collect::<Vec<_>>(),
            Series::Markers(markers) => markers.points.iter().copied().collect(),
            Series::Bars(_) => Vec::new(),
        })
    }
}

pub trait PlotBackend {
    fn draw(&mut self, fig: &Figure) -> anyhow::Result<()>;
}

pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    let mut result = Vec::with_capacity(max_points);
    for i in 0..max_points {
        let start = (i as f64 * bucket_size).floor() as usize;
        if start >= points.len() {
            break;
        }
        let sample = points[start];
        result.push(sample);
    }
    result
}

fn line(name: &str, points: Vec<[f64; 2]>, width: f32, color: u32) -> Series {
    Series::Line(LineSeries {
        name: name.into(),
        points,
        style: Style {
            width,
            dash: None,
            color: Color(color),
        },
    })
}

pub fn figure_from_timeseries(
    title: &str,
    series: &TimeSeries,
    max_points: usize,
    color: u32,
) -> Figure {
    let dt = 1.0 / series.fs.max(1.0);
    let points: Vec<[f64; 2]> = series
        .data
        .iter()
        .enumerate()
        .map(|(i, value)| [i as f64 * dt, *value])
        .collect();
    let decimated = decimate_points(&points, max_points);
    let mut fig = Figure::new(Some(title.into())).with_axes("time (s)", "voltage");
    fig.add_series(line(title, decimated, 1.4, color));
    fig
}

/// Raw and filtered versions of one recording on shared axes.
pub fn figure_from_filtering(
    title: &str,
    raw: &TimeSeries,
    filtered: &TimeSeries,
    max_points: usize,
) -> Figure {
    let mut fig = figure_from_timeseries(title, raw, max_points, 0xBBBBBB);
    if let Some(Series::Line(line)) = fig.series.first_mut() {
        line.name = "raw".into();
    }
    let filtered = figure_from_timeseries(title, filtered, max_points, 0x1F77B4);
    for series in filtered.series {
        if let Series::Line(mut line) = series {
            line.name = "filtered".into();
            fig.add_series(Series::Line(line));
        }
    }
    fig
}

/// Filtered trace with a marker on every detected beat.
pub fn figure_from_beats(
    title: &str,
    filtered: &TimeSeries,
    beats: &BeatEvents,
    max_points: usize,
) -> Figure {
    let mut fig = figure_from_timeseries(title, filtered, max_points, 0x1F77B4);
    let points = beats
        .indices
        .iter()
        .zip(&beats.times)
        .filter_map(|(&i, &t)| filtered.data.get(i).map(|&v| [t, v]))
        .collect();
    fig.add_series(Series::Markers(MarkerSeries {
        name: "beats".into(),
        points,
        size: 4.0,
        color: Color(0xD62728),
    }));
    fig
}

pub fn figure_from_resampled_ibi(title: &str, resampled: &ResampledIbi) -> Figure {
    let points = resampled
        .times
        .iter()
        .zip(&resampled.values)
        .map(|(&t, &v)| [t, v])
        .collect();
    let mut fig = Figure::new(Some(title.into())).with_axes("time (s)", "IBI (s)");
    fig.add_series(line("IBI", points, 2.0, 0xFF0077));
    fig
}

/// Spectrum up to `max_freq` Hz with the LF and HF bands overlaid.
pub fn figure_from_spectrum(
    title: &str,
    spectrum: &Spectrum,
    bands: &SpectralBands,
    max_freq: f64,
) -> Figure {
    let points = spectrum
        .points
        .iter()
        .copied()
        .filter(|p| p[0] <= max_freq)
        .collect();
    let mut fig = Figure::new(Some(title.into())).with_axes("frequency (Hz)", "power");
    fig.add_series(line("spectrum", points, 1.4, 0x7F7F7F));
    fig.add_series(line("LF", bands.lf.points.clone(), 2.4, 0x2CA02C));
    fig.add_series(line("HF", bands.hf.points.clone(), 2.4, 0x9467BD));
    fig
}

/// Filter magnitude response on a linear grid from 0 to `max_freq` Hz.
pub fn figure_from_filter_response(sos: &SosFilter, max_freq: f64, steps: usize) -> Figure {
    let steps = steps.max(2);
    let freqs: Vec<f64> = (0..steps)
        .map(|i| max_freq * i as f64 / (steps - 1) as f64)
        .collect();
    let gains = sos.frequency_response(&freqs);
    let points = freqs.into_iter().zip(gains).map(|(f, g)| [f, g]).collect();
    let mut fig =
        Figure::new(Some("Filter frequency response".into())).with_axes("frequency (Hz)", "|H|");
    fig.add_series(line("response", points, 2.0, 0x1F77B4));
    fig
}

/// Causal impulse response over the first `seconds` seconds.
pub fn figure_from_impulse_response(sos: &SosFilter, seconds: f64) -> Figure {
    let len = ((seconds * sos.fs).round() as usize).max(1);
    let points = sos
        .impulse_response(len)
        .into_iter()
        .enumerate()
        .map(|(i, h)| [i as f64 / sos.fs, h])
        .collect();
    let mut fig =
        Figure::new(Some("Filter impulse response".into())).with_axes("time (s)", "h[n]");
    fig.add_series(line("impulse response", points, 1.6, 0xFF7F0E));
    fig
}

/// One bar per activity, e.g. LF/HF ratios.
pub fn figure_from_ratios(title: &str, values: &[(Activity, f64)]) -> Figure {
    let mut fig = Figure::new(Some(title.into()));
    fig.y.label = Some("LF/HF".into());
    fig.add_series(Series::Bars(BarSeries {
        name: title.into(),
        labels: values.iter().map(|(a, _)| a.label().to_string()).collect(),
        values: values.iter().map(|(_, v)| *v).collect(),
        color: Color(0x17BECF),
    }));
    fig
}
