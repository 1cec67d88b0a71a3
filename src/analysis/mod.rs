//! Error analyzers. Each returns an immutable result that feeds the report
//! builder; none of them render or write anything.

use crate::error::ValidationError;
use crate::types::{Position, PositionSeries};

pub mod alignment;
pub mod diffusion;
pub mod localization;
pub mod relative_table;
pub mod trajectory;

/// `sqrt(dx^2 + dy^2)`.
pub fn euclidean_distance(a: &Position, b: &Position) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt()
}

/// How an estimated series is matched to its ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pairing {
    /// Equal length, same ordering.
    ByIndex,
    /// Shared frame index.
    ByFrame,
}

pub fn paired_distances(
    estimated: &PositionSeries,
    truth: &PositionSeries,
    pairing: Pairing,
) -> Result<Vec<f64>, ValidationError> {
    let pairs = match pairing {
        Pairing::ByIndex => estimated.pair_by_index(truth)?,
        Pairing::ByFrame => estimated.pair_by_frame(truth)?,
    };
    Ok(pairs
        .into_iter()
        .map(|(a, b)| euclidean_distance(a, b))
        .collect())
}
