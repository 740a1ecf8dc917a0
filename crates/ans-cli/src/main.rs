use anyhow::{bail, Context, Result};
use ans_lib::{
    config::{Activity, AnalysisConfig, FilterConfig},
    detectors::detect_beats,
    filters::{bandpass, design_bandpass},
    io::text as text_io,
    metrics::ibi::{hrv_scalar, ibi_from_times, ibi_time_domain, resample_ibi, IbiTimeDomain},
    pipeline::{analyze_recording, load_and_analyze, ActivityOutcome},
    plot::{
        figure_from_beats, figure_from_filter_response, figure_from_filtering,
        figure_from_impulse_response, figure_from_ratios, figure_from_resampled_ibi,
        figure_from_spectrum, figure_from_timeseries, Figure, PlotBackend, Series,
    },
    signal::{IbiSeries, ResampledIbi, TimeSeries},
};
use clap::{Args, Parser, Subcommand};
use log::{error, info};
use plotters::prelude::*;
use serde::Serialize;
use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "ans",
    version,
    about = "ANS: ECG heart rate variability and LF/HF band analysis"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Copy)]
struct FilterArgs {
    #[arg(long, default_value_t = 0.5)]
    low_cut: f64,
    #[arg(long, default_value_t = 2.5)]
    high_cut: f64,
    #[arg(long, default_value_t = 2)]
    order: usize,
}

impl From<FilterArgs> for FilterConfig {
    fn from(args: FilterArgs) -> Self {
        FilterConfig {
            low_cut: args.low_cut,
            high_cut: args.high_cut,
            order: args.order,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Zero-phase bandpass filter whitespace-separated samples from stdin or --input
    Filter {
        #[arg(long, default_value_t = 500.0)]
        fs: f64,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Detect beats as rising threshold crossings (filters first unless --raw)
    DetectBeats {
        #[arg(long, default_value_t = 500.0)]
        fs: f64,
        #[arg(long, allow_negative_numbers = true)]
        threshold: f64,
        #[arg(long)]
        raw: bool,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Intervals, resampled IBI and HRV from newline-delimited beat times (seconds)
    Ibi {
        #[arg(long, default_value_t = 0.1)]
        dt: f64,
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Run filter → beats → IBI → spectrum → LF/HF on one recording
    Analyze {
        #[arg(long, allow_negative_numbers = true)]
        threshold: f64,
        /// TOML analysis config; command-line rate/duration override it
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        fs: Option<f64>,
        #[arg(long)]
        duration: Option<f64>,
        #[arg(long)]
        input: Option<PathBuf>,
        /// Print only the scalar summary row
        #[arg(long)]
        summary: bool,
    },
    /// Analyse every activity in a TOML config in parallel
    Batch {
        #[arg(long)]
        config: PathBuf,
        /// Write the per-activity summary table as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Directory for PNG figures
        #[arg(long)]
        plots: Option<PathBuf>,
    },
    /// Magnitude and impulse response of the bandpass filter
    FilterResponse {
        #[arg(long, default_value_t = 500.0)]
        fs: f64,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, default_value_t = 10.0)]
        max_freq: f64,
        #[arg(long, default_value_t = 501)]
        steps: usize,
        /// Render the magnitude response to PNG instead of printing JSON
        #[arg(long)]
        out: Option<PathBuf>,
        /// Render the causal impulse response to PNG
        #[arg(long)]
        impulse_out: Option<PathBuf>,
        #[arg(long, default_value_t = 5.0)]
        impulse_seconds: f64,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Filter { fs, filter, input } => cmd_filter(fs, filter.into(), input.as_deref())?,
        Commands::DetectBeats {
            fs,
            threshold,
            raw,
            filter,
            input,
        } => cmd_detect_beats(fs, threshold, raw, filter.into(), input.as_deref())?,
        Commands::Ibi { dt, input } => cmd_ibi(dt, input.as_deref())?,
        Commands::Analyze {
            threshold,
            config,
            fs,
            duration,
            input,
            summary,
        } => cmd_analyze(
            threshold,
            config.as_deref(),
            fs,
            duration,
            input.as_deref(),
            summary,
        )?,
        Commands::Batch { config, csv, plots } => {
            cmd_batch(&config, csv.as_deref(), plots.as_deref())?
        }
        Commands::FilterResponse {
            fs,
            filter,
            max_freq,
            steps,
            out,
            impulse_out,
            impulse_seconds,
        } => cmd_filter_response(
            fs,
            filter.into(),
            ResponsePlot {
                max_freq,
                steps,
                out,
                impulse_out,
                impulse_seconds,
            },
        )?,
    }
    Ok(())
}

fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn read_samples(input: Option<&Path>, limit: Option<usize>) -> Result<Vec<f64>> {
    let text = read_input(input)?;
    Ok(text_io::parse_samples(&text, limit)?)
}

fn cmd_filter(fs: f64, filter: FilterConfig, input: Option<&Path>) -> Result<()> {
    let ts = TimeSeries::new(fs, read_samples(input, None)?);
    let filtered = bandpass(&ts, &filter)?;
    println!("{}", serde_json::to_string(&filtered)?);
    Ok(())
}

fn cmd_detect_beats(
    fs: f64,
    threshold: f64,
    raw: bool,
    filter: FilterConfig,
    input: Option<&Path>,
) -> Result<()> {
    let ts = TimeSeries::new(fs, read_samples(input, None)?);
    let signal = if raw { ts } else { bandpass(&ts, &filter)? };
    let beats = detect_beats(&signal, threshold);
    println!("{}", serde_json::to_string(&beats)?);
    Ok(())
}

#[derive(Serialize)]
struct IbiReport {
    ibi: IbiSeries,
    resampled: ResampledIbi,
    hrv: f64,
    time_domain: IbiTimeDomain,
}

fn cmd_ibi(dt: f64, input: Option<&Path>) -> Result<()> {
    let times = read_samples(input, None)?;
    let ibi = ibi_from_times(&times)?;
    let resampled = resample_ibi(&ibi, dt)?;
    let report = IbiReport {
        hrv: hrv_scalar(&resampled),
        time_domain: ibi_time_domain(&ibi),
        ibi,
        resampled,
    };
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn cmd_analyze(
    threshold: f64,
    config: Option<&Path>,
    fs: Option<f64>,
    duration: Option<f64>,
    input: Option<&Path>,
    summary: bool,
) -> Result<()> {
    let mut cfg = match config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(fs) = fs {
        cfg.sampling_rate = fs;
    }
    if duration.is_some() {
        cfg.duration = duration;
    }
    cfg.validate()?;

    let ts = TimeSeries::new(cfg.sampling_rate, read_samples(input, cfg.sample_limit())?);
    let analysis = analyze_recording(&ts, threshold, &cfg)?;
    let js = if summary {
        serde_json::to_string(&analysis.summary(None))?
    } else {
        serde_json::to_string(&analysis)?
    };
    println!("{}", js);
    Ok(())
}

#[derive(Serialize)]
struct FailedActivity {
    activity: Activity,
    error: String,
}

fn cmd_batch(config: &Path, csv_out: Option<&Path>, plots: Option<&Path>) -> Result<()> {
    let cfg = AnalysisConfig::load(config)?;
    if cfg.activities.is_empty() {
        bail!("{} lists no activities", config.display());
    }
    info!(
        "analysing {} activities from {}",
        cfg.activities.len(),
        config.display()
    );
    let outcomes = load_and_analyze(&cfg);

    for outcome in &outcomes {
        match &outcome.result {
            Ok(analysis) => {
                let row = analysis.summary(Some(outcome.activity));
                println!("{}", serde_json::to_string(&row)?);
            }
            Err(err) => {
                error!("{}: {err}", outcome.activity);
                let failed = FailedActivity {
                    activity: outcome.activity,
                    error: err.to_string(),
                };
                println!("{}", serde_json::to_string(&failed)?);
            }
        }
    }

    if let Some(path) = csv_out {
        write_summary_csv(path, &outcomes)?;
    }
    if let Some(dir) = plots {
        write_figures(dir, &cfg, &outcomes)?;
    }
    Ok(())
}

fn write_summary_csv(path: &Path, outcomes: &[ActivityOutcome]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for row in outcomes.iter().filter_map(ActivityOutcome::summary) {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_figures(dir: &Path, cfg: &AnalysisConfig, outcomes: &[ActivityOutcome]) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let mut ratios = Vec::new();
    let mut raws = Vec::new();
    for outcome in outcomes {
        let stem = slug(outcome.activity);
        let label = outcome.activity.label();
        if let Some(raw) = &outcome.raw {
            let fig = figure_from_timeseries(&format!("{label}: raw ECG"), raw, 8000, 0x7F7F7F);
            PngBackend::new(dir.join(format!("{stem}_raw.png"))).draw(&fig)?;
            raws.push(raw.clone());
        }
        let Ok(analysis) = &outcome.result else {
            continue;
        };
        if let Some(raw) = &outcome.raw {
            let fig = figure_from_filtering(
                &format!("{label}: before and after filtering"),
                raw,
                &analysis.filtered,
                8000,
            );
            PngBackend::new(dir.join(format!("{stem}_filtering.png"))).draw(&fig)?;
        }
        let figures = [
            (
                "beats",
                figure_from_beats(
                    &format!("{label}: filtered ECG and beats"),
                    &analysis.filtered,
                    &analysis.beats,
                    4000,
                ),
            ),
            (
                "ibi",
                figure_from_resampled_ibi(&format!("{label}: resampled IBI"), &analysis.resampled),
            ),
            (
                "spectrum",
                figure_from_spectrum(
                    &format!("{label}: IBI power spectrum"),
                    &analysis.spectrum,
                    &analysis.bands,
                    cfg.bands.hf_band[1] * 1.25,
                ),
            ),
        ];
        for (kind, fig) in &figures {
            PngBackend::new(dir.join(format!("{stem}_{kind}.png"))).draw(fig)?;
        }
        ratios.push((outcome.activity, analysis.lf_hf));
    }
    if !raws.is_empty() {
        let all = text_io::concatenate(&raws)?;
        let fig = figure_from_timeseries("All activities (raw)", &all, 8000, 0x7F7F7F);
        PngBackend::new(dir.join("all_activities.png")).draw(&fig)?;
    }
    if !ratios.is_empty() {
        let fig = figure_from_ratios("LF/HF ratio by activity", &ratios);
        PngBackend::new(dir.join("lf_hf_ratios.png")).draw(&fig)?;
    }
    Ok(())
}

fn slug(activity: Activity) -> String {
    activity.label().to_lowercase().replace(' ', "_")
}

#[derive(Serialize)]
struct ResponseReport {
    sections: usize,
    points: Vec<[f64; 2]>,
}

struct ResponsePlot {
    max_freq: f64,
    steps: usize,
    out: Option<PathBuf>,
    impulse_out: Option<PathBuf>,
    impulse_seconds: f64,
}

fn cmd_filter_response(fs: f64, filter: FilterConfig, plot: ResponsePlot) -> Result<()> {
    let sos = design_bandpass(filter.low_cut, filter.high_cut, filter.order, fs)?;
    let fig = figure_from_filter_response(&sos, plot.max_freq, plot.steps);
    if let Some(path) = plot.impulse_out {
        if !(plot.impulse_seconds > 0.0) {
            bail!("--impulse-seconds must be positive");
        }
        let impulse = figure_from_impulse_response(&sos, plot.impulse_seconds);
        PngBackend::new(path).draw(&impulse)?;
    }
    match plot.out {
        Some(path) => PngBackend::new(path).draw(&fig)?,
        None => {
            let report = ResponseReport {
                sections: sos.sections.len(),
                points: fig.xy_points().collect(),
            };
            println!("{}", serde_json::to_string(&report)?);
        }
    }
    Ok(())
}

struct PngBackend {
    path: PathBuf,
    size: (u32, u32),
}

impl PngBackend {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            size: (800, 480),
        }
    }
}

impl PlotBackend for PngBackend {
    fn draw(&mut self, fig: &Figure) -> Result<()> {
        let bars = fig.series.iter().find_map(|series| match series {
            Series::Bars(bars) => Some(bars),
            _ => None,
        });
        match bars {
            Some(bars) => draw_bar_figure(
                &self.path,
                self.size,
                fig,
                &bars.labels,
                &bars.values,
                bars.color.rgb(),
            ),
            None => draw_xy_figure(&self.path, self.size, fig),
        }
    }
}

fn padded_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    if (hi - lo).abs() < f64::EPSILON {
        return (lo - 0.5, hi + 0.5);
    }
    (lo, hi)
}

fn draw_xy_figure(path: &Path, size: (u32, u32), fig: &Figure) -> Result<()> {
    let backend = BitMapBackend::new(path, size);
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;
    let (x_min, x_max) = padded_range(fig.xy_points().map(|p| p[0]));
    let (y_min, y_max) = padded_range(fig.xy_points().map(|p| p[1]));
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(
            fig.title.clone().unwrap_or_else(|| "Plot".into()),
            ("sans-serif", 24),
        )
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    chart
        .configure_mesh()
        .x_desc(fig.x.label.clone().unwrap_or_default())
        .y_desc(fig.y.label.clone().unwrap_or_default())
        .draw()?;
    for series in &fig.series {
        match series {
            Series::Line(line) => {
                let (r, g, b) = line.style.color.rgb();
                let width = line.style.width.round().max(1.0) as u32;
                chart.draw_series(LineSeries::new(
                    line.points.iter().map(|p| (p[0], p[1])),
                    RGBColor(r, g, b).stroke_width(width),
                ))?;
            }
            Series::Markers(markers) => {
                let (r, g, b) = markers.color.rgb();
                let radius = markers.size.round().max(1.0) as u32;
                chart.draw_series(
                    markers
                        .points
                        .iter()
                        .map(|p| Circle::new((p[0], p[1]), radius, RGBColor(r, g, b).filled())),
                )?;
            }
            Series::Bars(_) => {}
        }
    }
    root.present()?;
    Ok(())
}

fn draw_bar_figure(
    path: &Path,
    size: (u32, u32),
    fig: &Figure,
    labels: &[String],
    values: &[f64],
    (r, g, b): (u8, u8, u8),
) -> Result<()> {
    let backend = BitMapBackend::new(path, size);
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;
    let (_, y_max) = padded_range(values.iter().copied().chain(std::iter::once(0.0)));
    let n = values.len().max(1) as f64;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(
            fig.title.clone().unwrap_or_else(|| "Plot".into()),
            ("sans-serif", 24),
        )
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(0.0..n, 0.0..y_max * 1.1)?;
    let label_at = |x: &f64| {
        labels
            .get(x.floor() as usize)
            .cloned()
            .unwrap_or_default()
    };
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(values.len().max(1))
        .x_label_formatter(&label_at)
        .y_desc(fig.y.label.clone().unwrap_or_default())
        .draw()?;
    chart.draw_series(values.iter().enumerate().map(|(i, &v)| {
        let x = i as f64;
        Rectangle::new([(x + 0.15, 0.0), (x + 0.85, v)], RGBColor(r, g, b).filled())
    }))?;
    root.present()?;
    Ok(())
}
