use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinningStrategy {
    /// `ceil(log2(n) + 1)` equal-width bins over the sample range.
    #[default]
    Sturges,
    /// Caller-supplied, strictly increasing bin edges.
    Fixed { edges: Vec<f64> },
}

impl BinningStrategy {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Sturges => Ok(()),
            Self::Fixed { edges } => {
                if edges.len() < 2 {
                    return Err(ValidationError::configuration(format!(
                        "fixed binning needs at least two edges, got {}",
                        edges.len()
                    )));
                }
                let increasing = edges
                    .windows(2)
                    .all(|pair| pair[0].is_finite() && pair[1].is_finite() && pair[0] < pair[1]);
                if !increasing {
                    return Err(ValidationError::configuration(
                        "fixed bin edges must be finite and strictly increasing",
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Bin edges and counts. The last bin is closed on the right.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub edges: Vec<f64>,
    pub counts: Vec<u64>,
}

impl Histogram {
    pub fn compute(values: &[f64], strategy: &BinningStrategy) -> Result<Self, ValidationError> {
        let edges = match strategy {
            BinningStrategy::Sturges => sturges_edges(values),
            BinningStrategy::Fixed { edges } => {
                strategy.validate()?;
                edges.clone()
            }
        };
        let mut counts = vec![0u64; edges.len().saturating_sub(1)];
        for &value in values {
            if let Some(idx) = bin_index(&edges, value) {
                counts[idx] += 1;
            }
        }
        Ok(Self { edges, counts })
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Counts normalized so the histogram integrates to one.
    pub fn density(&self) -> Vec<f64> {
        let total = self.total() as f64;
        if total == 0.0 {
            return vec![0.0; self.counts.len()];
        }
        self.counts
            .iter()
            .zip(self.edges.windows(2))
            .map(|(&count, pair)| count as f64 / (total * (pair[1] - pair[0])))
            .collect()
    }
}

pub fn sturges_bin_count(sample_count: usize) -> usize {
    if sample_count == 0 {
        return 1;
    }
    ((sample_count as f64).log2() + 1.0).ceil().max(1.0) as usize
}

fn sturges_edges(values: &[f64]) -> Vec<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let (lo, hi) = match finite.iter().copied().fold(None, |acc: Option<(f64, f64)>, v| {
        Some(acc.map_or((v, v), |(lo, hi)| (lo.min(v), hi.max(v))))
    }) {
        Some(range) => range,
        None => (0.0, 1.0),
    };
    if lo == hi {
        return vec![lo - 0.5, hi + 0.5];
    }
    let bins = sturges_bin_count(finite.len());
    // Interpolated rather than `lo + k * (hi - lo) / bins`: the span of two
    // finite values can overflow.
    let mut edges: Vec<f64> = (0..bins)
        .map(|k| {
            let f = k as f64 / bins as f64;
            lo * (1.0 - f) + hi * f
        })
        .collect();
    edges.push(hi);
    edges
}

fn bin_index(edges: &[f64], value: f64) -> Option<usize> {
    let (&first, &last) = (edges.first()?, edges.last()?);
    if !value.is_finite() || value < first || value > last {
        return None;
    }
    if value == last {
        return Some(edges.len() - 2);
    }
    // partition_point gives the first edge strictly greater than value.
    let upper = edges.partition_point(|&edge| edge <= value);
    upper.checked_sub(1)
}
