use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub frame: u64,
    pub x: f64,
    pub y: f64,
}

/// Ordered (frame, x, y) samples for one particle or channel.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PositionSeries {
    positions: Vec<Position>,
}

impl PositionSeries {
    pub fn new(positions: Vec<Position>) -> Self {
        Self { positions }
    }

    /// Frames are the column index, as in the `[[x...], [y...]]` layout.
    pub fn from_xy(xs: &[f64], ys: &[f64]) -> Result<Self, ValidationError> {
        if xs.len() != ys.len() {
            return Err(ValidationError::dimension(
                "position series",
                format!("x has {} values, y has {}", xs.len(), ys.len()),
            ));
        }
        let positions = xs
            .iter()
            .zip(ys)
            .enumerate()
            .map(|(frame, (&x, &y))| Position {
                frame: frame as u64,
                x,
                y,
            })
            .collect();
        Ok(Self { positions })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn extend(&mut self, other: PositionSeries) {
        self.positions.extend(other.positions);
    }

    /// Pairs samples by position in the sequence. Lengths must agree.
    pub fn pair_by_index<'a>(
        &'a self,
        truth: &'a PositionSeries,
    ) -> Result<Vec<(&'a Position, &'a Position)>, ValidationError> {
        if self.len() != truth.len() {
            return Err(ValidationError::dimension(
                "position pairing",
                format!(
                    "estimated series has {} samples, ground truth has {}",
                    self.len(),
                    truth.len()
                ),
            ));
        }
        Ok(self.positions.iter().zip(truth.positions.iter()).collect())
    }

    /// Pairs every estimated sample with the ground-truth sample of the same
    /// frame. Ground truth may cover more frames than the estimate.
    pub fn pair_by_frame<'a>(
        &'a self,
        truth: &'a PositionSeries,
    ) -> Result<Vec<(&'a Position, &'a Position)>, ValidationError> {
        let by_frame: HashMap<u64, &Position> =
            truth.positions.iter().map(|p| (p.frame, p)).collect();
        self.positions
            .iter()
            .map(|estimated| {
                by_frame
                    .get(&estimated.frame)
                    .map(|reference| (estimated, *reference))
                    .ok_or_else(|| {
                        ValidationError::dimension(
                            "position pairing",
                            format!("frame {} has no ground-truth position", estimated.frame),
                        )
                    })
            })
            .collect()
    }
}

/// Rectangular 2D image, row-major.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Image {
    rows: usize,
    cols: usize,
    pixels: Vec<f64>,
}

impl Image {
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, ValidationError> {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != cols) {
            return Err(ValidationError::dimension(
                "image",
                format!("row {idx} has {} pixels, expected {cols}", row.len()),
            ));
        }
        let row_count = rows.len();
        Ok(Self {
            rows: row_count,
            cols,
            pixels: rows.into_iter().flatten().collect(),
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn pixel(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.pixels.get(row * self.cols + col).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExperimentRole {
    Original,
    Rotated,
    Corrected,
}

impl ExperimentRole {
    pub const ALL: [ExperimentRole; 3] = [Self::Original, Self::Rotated, Self::Corrected];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Original => "Original",
            Self::Rotated => "Rotated",
            Self::Corrected => "Corrected",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoleData {
    pub image: Image,
    pub positions: PositionSeries,
}

/// Ground truth, perturbed input and pipeline output of one alignment run.
/// Construction checks that all three roles share image shape and series length.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentExperiment {
    original: RoleData,
    rotated: RoleData,
    corrected: RoleData,
}

impl AlignmentExperiment {
    pub fn new(
        original: RoleData,
        rotated: RoleData,
        corrected: RoleData,
    ) -> Result<Self, ValidationError> {
        let shape = original.image.shape();
        let len = original.positions.len();
        for (role, data) in [
            (ExperimentRole::Rotated, &rotated),
            (ExperimentRole::Corrected, &corrected),
        ] {
            if data.image.shape() != shape {
                return Err(ValidationError::dimension(
                    "alignment experiment",
                    format!(
                        "{} image is {:?}, Original image is {:?}",
                        role.as_str(),
                        data.image.shape(),
                        shape
                    ),
                ));
            }
            if data.positions.len() != len {
                return Err(ValidationError::dimension(
                    "alignment experiment",
                    format!(
                        "{} has {} positions, Original has {len}",
                        role.as_str(),
                        data.positions.len()
                    ),
                ));
            }
        }
        Ok(Self {
            original,
            rotated,
            corrected,
        })
    }

    pub fn role(&self, role: ExperimentRole) -> &RoleData {
        match role {
            ExperimentRole::Original => &self.original,
            ExperimentRole::Rotated => &self.rotated,
            ExperimentRole::Corrected => &self.corrected,
        }
    }

    pub fn sample_count(&self) -> usize {
        self.original.positions.len()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocalizationErrorReport {
    pub error_x: Vec<f64>,
    pub error_y: Vec<f64>,
}

/// One detection event read from a `trackgroup/track/detection` document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub track: usize,
    pub t: f64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectionTable {
    pub detections: Vec<Detection>,
}

impl DetectionTable {
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Frame index is the integer part of `t`.
    pub fn to_position_series(&self) -> Result<PositionSeries, ValidationError> {
        let positions = self
            .detections
            .iter()
            .map(|detection| {
                if !detection.t.is_finite() || detection.t < 0.0 {
                    return Err(ValidationError::schema(
                        "detection",
                        format!("time '{}' is not a valid frame index", detection.t),
                    ));
                }
                Ok(Position {
                    frame: detection.t.trunc() as u64,
                    x: detection.x,
                    y: detection.y,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PositionSeries::new(positions))
    }
}

/// Channel-major numeric matrix: `channel(i)` is one metric across all samples.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NumericMatrix {
    channels: Vec<Vec<f64>>,
    sample_count: usize,
}

impl NumericMatrix {
    pub(crate) fn from_channels(channels: Vec<Vec<f64>>) -> Self {
        let sample_count = channels.first().map(Vec::len).unwrap_or(0);
        Self {
            channels,
            sample_count,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn channel(&self, idx: usize) -> Option<&[f64]> {
        self.channels.get(idx).map(Vec::as_slice)
    }

    pub fn channels(&self) -> &[Vec<f64>] {
        &self.channels
    }

    /// One sample across every channel (the sample-major view).
    pub fn sample(&self, idx: usize) -> Option<Vec<f64>> {
        if idx >= self.sample_count {
            return None;
        }
        Some(self.channels.iter().map(|channel| channel[idx]).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleDynamics {
    pub d_raw: f64,
    pub alpha: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubstrateDynamics {
    pub dr: f64,
    pub ar: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiffusionModelResult {
    Single(ParticleDynamics),
    Coupled {
        particles: Vec<ParticleDynamics>,
        substrate: SubstrateDynamics,
    },
}

/// The `GProcess.<model>` record as written by the batch tool. Fields are
/// optional here; extraction decides what a given model requires.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelRecord {
    pub dynamics: Option<Vec<Vec<f64>>>,
    pub substrate: Option<SubstrateRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SubstrateRecord {
    pub dr: Option<f64>,
    pub ar: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GProcessRecord {
    pub models: BTreeMap<String, ModelRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MovieRecord {
    Parsed(GProcessRecord),
    Malformed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchRun {
    pub movies: BTreeMap<String, MovieRecord>,
}

impl BatchRun {
    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Category {
    Particle(u32),
    Substrate,
    Background,
    Label(String),
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Particle(idx) => write!(f, "Particle {idx}"),
            Self::Substrate => f.write_str("Substrate"),
            Self::Background => f.write_str("Background"),
            Self::Label(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    D,
    Alpha,
    DR,
    AR,
    Distance,
    ErrorX,
    ErrorY,
    Custom(String),
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::D => f.write_str("D"),
            Self::Alpha => f.write_str("alpha"),
            Self::DR => f.write_str("DR"),
            Self::AR => f.write_str("AR"),
            Self::Distance => f.write_str("distance"),
            Self::ErrorX => f.write_str("errorX"),
            Self::ErrorY => f.write_str("errorY"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DistributionTag {
    pub category: Category,
    pub metric: Metric,
}

impl DistributionTag {
    pub fn new(category: Category, metric: Metric) -> Self {
        Self { category, metric }
    }
}

impl fmt::Display for DistributionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.category, self.metric)
    }
}

/// A single error value. `source` names the movie or sample it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorSample {
    pub tag: DistributionTag,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(points: &[(u64, f64, f64)]) -> PositionSeries {
        PositionSeries::new(
            points
                .iter()
                .map(|&(frame, x, y)| Position { frame, x, y })
                .collect(),
        )
    }

    #[test]
    fn from_xy_rejects_uneven_axes() {
        let err = PositionSeries::from_xy(&[1.0, 2.0], &[1.0]).unwrap_err();
        assert!(matches!(err, ValidationError::DimensionMismatch { .. }));
    }

    #[test]
    fn pair_by_index_requires_equal_length() {
        let estimated = series(&[(0, 1.0, 1.0), (1, 2.0, 2.0)]);
        let truth = series(&[(0, 1.0, 1.0)]);
        assert!(matches!(
            estimated.pair_by_index(&truth),
            Err(ValidationError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn pair_by_frame_looks_up_shared_frames() {
        let estimated = series(&[(3, 1.0, 1.0), (1, 2.0, 2.0)]);
        let truth = series(&[(0, 0.0, 0.0), (1, 2.5, 2.0), (2, 0.0, 0.0), (3, 1.5, 1.0)]);
        let pairs = estimated.pair_by_frame(&truth).expect("frames exist");
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].1.x, 1.5);
        assert_eq!(pairs[1].1.x, 2.5);
    }

    #[test]
    fn pair_by_frame_reports_missing_frame() {
        let estimated = series(&[(9, 1.0, 1.0)]);
        let truth = series(&[(0, 0.0, 0.0)]);
        let err = estimated.pair_by_frame(&truth).unwrap_err();
        assert!(err.to_string().contains("frame 9"));
    }

    #[test]
    fn image_rejects_ragged_rows() {
        let err = Image::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, ValidationError::DimensionMismatch { .. }));
    }

    #[test]
    fn experiment_rejects_mismatched_image_shapes() {
        let data = |rows: Vec<Vec<f64>>| RoleData {
            image: Image::from_rows(rows).expect("rectangular"),
            positions: PositionSeries::from_xy(&[1.0], &[1.0]).expect("even"),
        };
        let err = AlignmentExperiment::new(
            data(vec![vec![0.0, 0.0]]),
            data(vec![vec![0.0, 0.0]]),
            data(vec![vec![0.0], vec![0.0]]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Corrected image"));
    }

    #[test]
    fn detections_truncate_time_to_frame() {
        let table = DetectionTable {
            detections: vec![Detection {
                track: 0,
                t: 4.0,
                x: 1.0,
                y: 2.0,
            }],
        };
        let series = table.to_position_series().expect("valid time");
        assert_eq!(series.positions()[0].frame, 4);
    }

    #[test]
    fn negative_detection_time_is_schema_error() {
        let table = DetectionTable {
            detections: vec![Detection {
                track: 0,
                t: -1.0,
                x: 1.0,
                y: 2.0,
            }],
        };
        assert!(matches!(
            table.to_position_series(),
            Err(ValidationError::Schema { .. })
        ));
    }

    #[test]
    fn tag_display_reads_category_then_metric() {
        let tag = DistributionTag::new(Category::Particle(2), Metric::Alpha);
        assert_eq!(tag.to_string(), "Particle 2 / alpha");
    }
}
