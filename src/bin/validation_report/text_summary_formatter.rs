use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use gp_validation::report::DistributionReport;
use gp_validation::ValidationReport;

const BAR_WIDTH: usize = 40;

pub fn render_summary(report: &ValidationReport) -> String {
    let mut out = String::new();
    if let Some(meta) = report.meta() {
        let _ = writeln!(out, "generated_at: {}", meta.generated_at);
        for input in &meta.inputs {
            let _ = writeln!(out, "input: {input}");
        }
        out.push('\n');
    }

    for entry in report.distributions() {
        render_distribution(&mut out, entry);
        out.push('\n');
    }

    if !report.significance_tests().is_empty() {
        let _ = writeln!(out, "Significance tests (Welch, two-sided)");
        for test in report.significance_tests() {
            let _ = writeln!(
                out,
                "  {:<40} t={:>9.4} df={:>8.2} p={:.3e}",
                test.name, test.result.t_stat, test.result.degrees_of_freedom, test.result.p_value
            );
        }
        out.push('\n');
    }

    if !report.exclusions().is_empty() {
        let _ = writeln!(out, "Excluded movies: {}", report.exclusions().len());
        for exclusion in report.exclusions() {
            let _ = writeln!(out, "  {:<16} {}", exclusion.movie_id, exclusion.reason);
        }
    }
    out
}

fn render_distribution(out: &mut String, entry: &DistributionReport) {
    let Some(summary) = entry.summary() else {
        let _ = writeln!(out, "{}: no samples", entry.label());
        return;
    };
    let _ = writeln!(
        out,
        "{}: n={} mean={:.5} sigma={:.5} min={:.5} median={:.5} p90={:.5} max={:.5}",
        entry.label(),
        summary.count,
        summary.mean,
        summary.std_dev,
        summary.min,
        summary.p50,
        summary.p90,
        summary.max
    );

    let histogram = entry.histogram();
    let peak = histogram.counts.iter().copied().max().unwrap_or(0).max(1);
    for (count, pair) in histogram.counts.iter().zip(histogram.edges.windows(2)) {
        let width = (*count as usize * BAR_WIDTH).div_ceil(peak as usize);
        let _ = writeln!(
            out,
            "  [{:>10.4}, {:>10.4}) {:>6} {}",
            pair[0],
            pair[1],
            count,
            "#".repeat(width)
        );
    }
}

pub fn write_summary(path: &Path, rendered: &str) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            format!(
                "Failed to create summary output directory '{}': {err}",
                parent.display()
            )
        })?;
    }
    fs::write(path, rendered)
        .map_err(|err| format!("Failed to write summary '{}': {err}", path.display()))
}
