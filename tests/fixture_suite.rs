use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use gp_validation::analysis::diffusion::{DiffusionValidator, ModelKind};
use gp_validation::analysis::trajectory::{tracker_error, TrackerEstimate};
use gp_validation::ingest::matrix::{load_matrix, MatrixOrientation};
use gp_validation::ingest::{json, xml};
use gp_validation::{
    analyze_alignment, analyze_localization_errors, relative_error_distributions,
    RelativeErrorLayout, ReportBuilder, ValidationConfig, ValidationReport,
};
use libtest_mimic::{Arguments, Failed, Trial};
use serde::Deserialize;

const SUITE_NAME: &str = "fixture_reports_match_expectations";
const MEAN_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Deserialize)]
struct FixtureCase {
    name: String,
    #[serde(flatten)]
    input: CaseInput,
    distributions: Vec<ExpectedDistribution>,
    #[serde(default)]
    excluded: Vec<String>,
    #[serde(default)]
    significant: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum CaseInput {
    Batch {
        file: String,
        mode: Mode,
    },
    Alignment {
        file: String,
    },
    Localization {
        file: String,
    },
    Trajectory {
        truth: String,
        tracker: String,
        channel: String,
        file: String,
    },
    RelativeTable {
        file: String,
        layout: RelativeErrorLayout,
        orientation: MatrixOrientation,
    },
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Mode {
    Single,
    Coupled,
}

#[derive(Debug, Deserialize)]
struct ExpectedDistribution {
    label: String,
    count: usize,
    mean: f64,
}

fn main() {
    let args = Arguments::from_args();
    let fixtures_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    let cases = match load_cases(&fixtures_dir.join("cases.json")) {
        Ok(cases) => cases,
        Err(message) => {
            run_setup_failure(&args, message);
            return;
        }
    };

    let tests = cases
        .into_iter()
        .map(|case| {
            let dir = fixtures_dir.clone();
            let test_name = format!("{SUITE_NAME}::{}", case.name);
            Trial::test(test_name, move || run_case(&dir, &case).map_err(Failed::from))
        })
        .collect();
    libtest_mimic::run(&args, tests).exit();
}

fn run_setup_failure(args: &Arguments, message: String) {
    let test = Trial::test(format!("{SUITE_NAME}::setup"), move || {
        Err(Failed::from(message))
    });
    libtest_mimic::run(args, vec![test]).exit();
}

fn load_cases(path: &Path) -> Result<Vec<FixtureCase>, String> {
    let file = File::open(path)
        .map_err(|err| format!("Failed to open fixture '{}': {err}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|err| format!("Failed to parse fixture '{}': {err}", path.display()))
}

fn run_case(dir: &Path, case: &FixtureCase) -> Result<(), String> {
    let report = build_report(dir, &case.input).map_err(|err| format!("{}: {err}", case.name))?;

    for expected in &case.distributions {
        let entry = report
            .distributions()
            .iter()
            .find(|entry| entry.label() == expected.label)
            .ok_or_else(|| format!("missing distribution '{}'", expected.label))?;
        let count = entry.distribution().len();
        if count != expected.count {
            return Err(format!(
                "'{}': expected {} samples, got {count}",
                expected.label, expected.count
            ));
        }
        let mean = entry
            .mean()
            .ok_or_else(|| format!("'{}': no summary", expected.label))?;
        if (mean - expected.mean).abs() > MEAN_TOLERANCE {
            return Err(format!(
                "'{}': expected mean {}, got {mean}",
                expected.label, expected.mean
            ));
        }
        if entry.histogram().total() as usize != count {
            return Err(format!(
                "'{}': histogram holds {} of {count} samples",
                expected.label,
                entry.histogram().total()
            ));
        }
    }

    let excluded = report.excluded_movie_ids();
    if excluded != case.excluded {
        return Err(format!(
            "expected exclusions {:?}, got {excluded:?}",
            case.excluded
        ));
    }

    if let Some(significant) = case.significant {
        let test = report
            .significance_tests()
            .first()
            .ok_or_else(|| "no significance test in report".to_string())?;
        if test.result.is_significant(0.05) != significant {
            return Err(format!(
                "expected significant={significant}, got p={}",
                test.result.p_value
            ));
        }
    }
    Ok(())
}

fn build_report(
    dir: &Path,
    input: &CaseInput,
) -> Result<ValidationReport, gp_validation::ValidationError> {
    let mut builder = ReportBuilder::new();
    match input {
        CaseInput::Batch { file, mode } => {
            let batch = json::load_batch_run(&dir.join(file))?;
            let kind = match mode {
                Mode::Single => ModelKind::Single,
                Mode::Coupled => ModelKind::Coupled,
            };
            let validator = DiffusionValidator::from_config(kind, &ValidationConfig::default())?;
            builder.add_section(validator.validate(&batch));
        }
        CaseInput::Alignment { file } => {
            let experiment = json::load_alignment_experiment(&dir.join(file))?;
            builder.add_section(analyze_alignment(&experiment)?);
        }
        CaseInput::Localization { file } => {
            let errors = json::load_localization_errors(&dir.join(file))?;
            builder.add_section(analyze_localization_errors(&errors));
        }
        CaseInput::Trajectory {
            truth,
            tracker,
            channel,
            file,
        } => {
            let truth = json::load_position_channels(&dir.join(truth))?;
            let series = xml::load_detections(&dir.join(file))?.to_position_series()?;
            let estimate = TrackerEstimate::new(tracker.as_str()).with_channel(channel.as_str(), series);
            builder.add_section(tracker_error(&estimate, &truth)?);
        }
        CaseInput::RelativeTable {
            file,
            layout,
            orientation,
        } => {
            let matrix = load_matrix(&dir.join(file), *orientation)?;
            builder.add_section(relative_error_distributions(&matrix, *layout)?);
        }
    }
    builder.build()
}
