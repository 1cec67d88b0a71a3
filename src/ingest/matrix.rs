//! Whitespace-delimited numeric text matrices.

use std::path::Path;

use serde::Deserialize;

use super::read_input;
use crate::error::ValidationError;
use crate::types::{LocalizationErrorReport, NumericMatrix, Position, PositionSeries};

/// How rows of the source file map onto metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatrixOrientation {
    /// Each row is one metric across all samples.
    #[default]
    MetricMajor,
    /// Each row is one sample; each column is a metric.
    SampleMajor,
}

pub fn load_matrix(
    path: &Path,
    orientation: MatrixOrientation,
) -> Result<NumericMatrix, ValidationError> {
    let data = read_input(path, "numeric matrix")?;
    let matrix = parse_matrix(&data, orientation)?;
    tracing::debug!(
        path = %path.display(),
        channels = matrix.channel_count(),
        samples = matrix.sample_count(),
        "ingest: loaded numeric matrix"
    );
    Ok(matrix)
}

/// Blank lines and `#` comments are skipped.
pub fn parse_matrix(
    data: &str,
    orientation: MatrixOrientation,
) -> Result<NumericMatrix, ValidationError> {
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for (line_idx, line) in data.lines().enumerate() {
        let content = line.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        let row = content
            .split_whitespace()
            .map(|token| {
                token.parse::<f64>().map_err(|_| {
                    ValidationError::schema(
                        "numeric matrix",
                        format!("line {}: '{token}' is not a number", line_idx + 1),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(first) = rows.first() {
            if first.len() != row.len() {
                return Err(ValidationError::dimension(
                    "numeric matrix",
                    format!(
                        "line {} has {} columns, expected {}",
                        line_idx + 1,
                        row.len(),
                        first.len()
                    ),
                ));
            }
        }
        rows.push(row);
    }

    let channels = match orientation {
        MatrixOrientation::MetricMajor => rows,
        MatrixOrientation::SampleMajor => transpose(&rows),
    };
    Ok(NumericMatrix::from_channels(channels))
}

fn transpose(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let cols = rows.first().map(Vec::len).unwrap_or(0);
    (0..cols)
        .map(|col| rows.iter().map(|row| row[col]).collect())
        .collect()
}

/// Column indices of a trajectory matrix whose channels are
/// (frame, x, y, ...), e.g. the `traj_*.txt` exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackColumns {
    pub frame: usize,
    pub x: usize,
    pub y: usize,
}

impl TrackColumns {
    /// time, particle id, x, y, error x, error y, ...
    pub const TRAJECTORY_EXPORT: TrackColumns = TrackColumns {
        frame: 0,
        x: 2,
        y: 3,
    };
}

fn column<'a>(matrix: &'a NumericMatrix, idx: usize, name: &str) -> Result<&'a [f64], ValidationError> {
    matrix.channel(idx).ok_or_else(|| {
        ValidationError::schema(
            "numeric matrix",
            format!(
                "{name} column {idx} out of range ({} columns)",
                matrix.channel_count()
            ),
        )
    })
}

pub fn position_series_from_matrix(
    matrix: &NumericMatrix,
    columns: TrackColumns,
) -> Result<PositionSeries, ValidationError> {
    let frames = column(matrix, columns.frame, "frame")?;
    let xs = column(matrix, columns.x, "x")?;
    let ys = column(matrix, columns.y, "y")?;
    let positions = frames
        .iter()
        .zip(xs)
        .zip(ys)
        .map(|((&frame, &x), &y)| {
            if !frame.is_finite() || frame < 0.0 {
                return Err(ValidationError::schema(
                    "numeric matrix",
                    format!("'{frame}' is not a valid frame index"),
                ));
            }
            if !x.is_finite() || !y.is_finite() {
                return Err(ValidationError::schema(
                    "numeric matrix",
                    format!("frame {frame}: position ({x}, {y}) is not finite"),
                ));
            }
            Ok(Position {
                frame: frame.trunc() as u64,
                x,
                y,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(PositionSeries::new(positions))
}

pub fn localization_errors_from_matrix(
    matrix: &NumericMatrix,
    error_x_column: usize,
    error_y_column: usize,
) -> Result<LocalizationErrorReport, ValidationError> {
    Ok(LocalizationErrorReport {
        error_x: column(matrix, error_x_column, "errorX")?.to_vec(),
        error_y: column(matrix, error_y_column, "errorY")?.to_vec(),
    })
}
