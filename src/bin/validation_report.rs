use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, ValueEnum};
use gp_validation::analysis::diffusion::{DiffusionValidator, ModelKind};
use gp_validation::analysis::trajectory::{compare_trackers, tracker_error, TrackerEstimate};
use gp_validation::ingest::matrix::{
    load_matrix, position_series_from_matrix, MatrixOrientation, TrackColumns,
};
use gp_validation::ingest::{json, xml};
use gp_validation::report::ReportMeta;
use gp_validation::{
    analyze_alignment, analyze_localization_errors, relative_error_distributions, BinningStrategy,
    PositionSeries, RelativeErrorLayout, ReportBuilder, ValidationConfig, ValidationReport,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

#[path = "validation_report/json_report_formatter.rs"]
mod json_report_formatter;
#[path = "validation_report/text_summary_formatter.rs"]
mod text_summary_formatter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    /// Summary table and ASCII histograms on stdout.
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeChoice {
    Single,
    Coupled,
}

impl ModeChoice {
    fn model_kind(self) -> ModelKind {
        match self {
            Self::Single => ModelKind::Single,
            Self::Coupled => ModelKind::Coupled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OrientationChoice {
    MetricMajor,
    SampleMajor,
}

impl OrientationChoice {
    fn orientation(self) -> MatrixOrientation {
        match self {
            Self::MetricMajor => MatrixOrientation::MetricMajor,
            Self::SampleMajor => MatrixOrientation::SampleMajor,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "validation_report")]
#[command(about = "Compare localization, alignment and GP-FBM fit results against ground truth")]
struct Args {
    /// JSON bundle with Original/Rotated/Corrected images and positions.
    #[arg(long, env = "GP_VALIDATION_ALIGNMENT")]
    alignment: Option<PathBuf>,
    /// JSON file with errorX/errorY arrays.
    #[arg(long, env = "GP_VALIDATION_LOCALIZATION")]
    localization: Option<PathBuf>,
    /// Batch results JSON with a top-level "Movies" mapping.
    #[arg(long, env = "GP_VALIDATION_BATCH")]
    batch: Option<PathBuf>,
    #[arg(long, env = "GP_VALIDATION_MODE", value_enum, default_value_t = ModeChoice::Single)]
    mode: ModeChoice,
    /// Precomputed relative-error table written by the simulation driver.
    #[arg(long, env = "GP_VALIDATION_RELATIVE_ERRORS")]
    relative_errors: Option<PathBuf>,
    #[arg(long, env = "GP_VALIDATION_LAYOUT", value_enum, default_value_t = ModeChoice::Single)]
    layout: ModeChoice,
    /// Particle count of a coupled relative-error table; defaults to the configured scenario.
    #[arg(long, env = "GP_VALIDATION_PARTICLES")]
    particles: Option<usize>,
    #[arg(
        long,
        env = "GP_VALIDATION_ORIENTATION",
        value_enum,
        default_value_t = OrientationChoice::SampleMajor
    )]
    orientation: OrientationChoice,
    /// Ground-truth positions, `{"channel0": [[x...], [y...]], ...}`.
    #[arg(long, env = "GP_VALIDATION_TRUTH")]
    truth: Option<PathBuf>,
    /// Tracker output as `NAME:CHANNEL=PATH`; `.xml` files are read as
    /// detections, anything else as a trajectory text export. Repeatable.
    #[arg(long = "tracker")]
    trackers: Vec<String>,
    #[arg(long, env = "GP_VALIDATION_CONFIG")]
    config: Option<PathBuf>,
    /// Fixed histogram edges, overriding the configured binning.
    #[arg(long, env = "GP_VALIDATION_BIN_EDGES", value_delimiter = ',')]
    bin_edges: Option<Vec<f64>>,
    /// Report path; JSON goes to stdout when omitted.
    #[arg(long, env = "GP_VALIDATION_OUT")]
    out: Option<PathBuf>,
    #[arg(
        long,
        env = "GP_VALIDATION_FORMAT",
        value_enum,
        default_value_t = OutputFormat::Json
    )]
    format: OutputFormat,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("validation_report: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => ValidationConfig::load(path).map_err(|err| err.to_string())?,
        None => ValidationConfig::default(),
    };
    let binning = match &args.bin_edges {
        Some(edges) => BinningStrategy::Fixed {
            edges: edges.clone(),
        },
        None => config.binning.clone(),
    };

    let mut inputs = Vec::new();
    let mut builder = ReportBuilder::new().with_binning(binning);

    if let Some(path) = &args.alignment {
        let experiment = json::load_alignment_experiment(path).map_err(|err| err.to_string())?;
        builder.add_section(analyze_alignment(&experiment).map_err(|err| err.to_string())?);
        inputs.push(display(path));
    }

    if let Some(path) = &args.localization {
        let errors = json::load_localization_errors(path).map_err(|err| err.to_string())?;
        builder.add_section(analyze_localization_errors(&errors));
        inputs.push(display(path));
    }

    if let Some(path) = &args.batch {
        let batch = json::load_batch_run(path).map_err(|err| err.to_string())?;
        let validator = DiffusionValidator::from_config(args.mode.model_kind(), &config)
            .map_err(|err| err.to_string())?;

        let progress = ProgressBar::new(batch.len() as u64);
        progress.set_style(
            ProgressStyle::with_template(
                "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
        );
        progress.set_message("starting...");
        let analysis = validator.validate_with(&batch, |movie_id| {
            progress.set_message(movie_id.to_string());
            progress.inc(1);
        });
        progress.finish_with_message(format!(
            "{} of {} movies accepted",
            analysis.accepted(),
            analysis.movie_count()
        ));
        builder.add_section(analysis);
        inputs.push(display(path));
    }

    if let Some(path) = &args.relative_errors {
        let layout = match args.layout {
            ModeChoice::Single => RelativeErrorLayout::Single,
            ModeChoice::Coupled => RelativeErrorLayout::Coupled {
                particles: args.particles.unwrap_or(config.coupled.particles.len()),
            },
        };
        let matrix =
            load_matrix(path, args.orientation.orientation()).map_err(|err| err.to_string())?;
        builder.add_section(
            relative_error_distributions(&matrix, layout).map_err(|err| err.to_string())?,
        );
        inputs.push(display(path));
    }

    if !args.trackers.is_empty() {
        let truth_path = args
            .truth
            .as_ref()
            .ok_or_else(|| "--tracker requires --truth.".to_string())?;
        let truth = json::load_position_channels(truth_path).map_err(|err| err.to_string())?;
        inputs.push(display(truth_path));
        let trackers = load_trackers(&args.trackers, &mut inputs)?;
        match trackers.as_slice() {
            [first, second] => {
                builder.add_section(
                    compare_trackers(first, second, &truth).map_err(|err| err.to_string())?,
                );
            }
            _ => {
                for tracker in &trackers {
                    builder.add_section(
                        tracker_error(tracker, &truth).map_err(|err| err.to_string())?,
                    );
                }
            }
        }
    }

    if inputs.is_empty() {
        return Err(
            "nothing to validate: pass at least one of --alignment, --localization, --batch, \
             --relative-errors or --tracker."
                .to_string(),
        );
    }

    let report = builder
        .with_meta(ReportMeta {
            generated_at: Utc::now().to_rfc3339(),
            inputs,
        })
        .build()
        .map_err(|err| err.to_string())?;

    emit(&args, &report)
}

fn emit(args: &Args, report: &ValidationReport) -> Result<(), String> {
    match (args.format, &args.out) {
        (OutputFormat::Json, Some(path)) => {
            for written in json_report_formatter::write_report(path, report)? {
                println!("{}", written.display());
            }
        }
        (OutputFormat::Json, None) => {
            print!("{}", json_report_formatter::render_report(report)?);
        }
        (OutputFormat::Text, out) => {
            let rendered = text_summary_formatter::render_summary(report);
            match out {
                Some(path) => {
                    text_summary_formatter::write_summary(path, &rendered)?;
                    println!("{}", path.display());
                }
                None => print!("{rendered}"),
            }
        }
    }
    Ok(())
}

/// Trackers keep the order of their first `--tracker` flag.
fn load_trackers(values: &[String], inputs: &mut Vec<String>) -> Result<Vec<TrackerEstimate>, String> {
    let mut trackers: Vec<TrackerEstimate> = Vec::new();
    let mut positions: BTreeMap<String, usize> = BTreeMap::new();
    for value in values {
        let (name, channel, path) = parse_tracker_flag(value)?;
        let series = load_track(&path)?;
        inputs.push(display(&path));
        let idx = *positions.entry(name.clone()).or_insert_with(|| {
            trackers.push(TrackerEstimate::new(name.clone()));
            trackers.len() - 1
        });
        let tracker = std::mem::take(&mut trackers[idx]);
        trackers[idx] = tracker.with_channel(channel, series);
    }
    Ok(trackers)
}

fn parse_tracker_flag(value: &str) -> Result<(String, String, PathBuf), String> {
    let (label, path) = value
        .split_once('=')
        .ok_or_else(|| format!("--tracker '{value}' must look like NAME:CHANNEL=PATH."))?;
    let (name, channel) = label
        .split_once(':')
        .ok_or_else(|| format!("--tracker '{value}' must look like NAME:CHANNEL=PATH."))?;
    if name.is_empty() || channel.is_empty() || path.is_empty() {
        return Err(format!("--tracker '{value}' must look like NAME:CHANNEL=PATH."));
    }
    Ok((name.to_string(), channel.to_string(), PathBuf::from(path)))
}

fn load_track(path: &Path) -> Result<PositionSeries, String> {
    let is_xml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
    let series = if is_xml {
        xml::load_detections(path).and_then(|table| table.to_position_series())
    } else {
        load_matrix(path, MatrixOrientation::SampleMajor)
            .and_then(|matrix| position_series_from_matrix(&matrix, TrackColumns::TRAJECTORY_EXPORT))
    };
    series.map_err(|err| err.to_string())
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
