use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use gp_validation::report::Exclusion;
use gp_validation::ValidationReport;

/// Pretty JSON with a trailing newline. An infinite Welch statistic
/// serializes as `null`.
pub fn render_report(report: &ValidationReport) -> Result<String, String> {
    let mut rendered = serde_json::to_string_pretty(report)
        .map_err(|err| format!("Failed to serialize validation report: {err}"))?;
    rendered.push('\n');
    Ok(rendered)
}

/// `report.json` gets its exclusions in `report.exclusions.tsv`.
pub fn exclusions_path(report_path: &Path) -> PathBuf {
    report_path.with_extension("exclusions.tsv")
}

pub fn render_exclusions(exclusions: &[Exclusion]) -> String {
    let mut out = String::from("movie_id\treason\n");
    for exclusion in exclusions {
        let reason = exclusion.reason.replace(['\t', '\n'], " ");
        let _ = writeln!(out, "{}\t{reason}", exclusion.movie_id);
    }
    out
}

/// Writes the report and, when any movie was excluded, the exclusion list
/// beside it. Returns every path written.
pub fn write_report(path: &Path, report: &ValidationReport) -> Result<Vec<PathBuf>, String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            format!(
                "Failed to create report output directory '{}': {err}",
                parent.display()
            )
        })?;
    }

    fs::write(path, render_report(report)?)
        .map_err(|err| format!("Failed to write report file '{}': {err}", path.display()))?;
    let mut written = vec![path.to_path_buf()];

    if !report.exclusions().is_empty() {
        let sidecar = exclusions_path(path);
        fs::write(&sidecar, render_exclusions(report.exclusions())).map_err(|err| {
            format!(
                "Failed to write exclusion list '{}': {err}",
                sidecar.display()
            )
        })?;
        tracing::info!(
            path = %sidecar.display(),
            excluded = report.exclusions().len(),
            "wrote exclusion list"
        );
        written.push(sidecar);
    }
    Ok(written)
}
