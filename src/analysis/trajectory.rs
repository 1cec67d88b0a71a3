//! Localization error of tracked trajectories against simulated positions.

use std::collections::BTreeMap;

use crate::analysis::{paired_distances, Pairing};
use crate::error::ValidationError;
use crate::report::{ErrorDistribution, ReportBuilder, ReportSection, SignificanceTest};
use crate::stats::welch::{self, WelchTTest};
use crate::types::{Category, DistributionTag, Metric, PositionSeries};

/// One tracker's output, keyed by the ground-truth channel it follows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackerEstimate {
    pub name: String,
    pub channels: BTreeMap<String, PositionSeries>,
}

impl TrackerEstimate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            channels: BTreeMap::new(),
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>, series: PositionSeries) -> Self {
        self.channels.entry(channel.into()).or_default().extend(series);
        self
    }

    pub fn tag(&self) -> DistributionTag {
        DistributionTag::new(Category::Label(self.name.clone()), Metric::Distance)
    }
}

/// Distance of every detection from the true position at its frame. All
/// channels are concatenated into one distribution.
pub fn tracker_error(
    estimate: &TrackerEstimate,
    truth: &BTreeMap<String, PositionSeries>,
) -> Result<ErrorDistribution, ValidationError> {
    let mut distribution = ErrorDistribution::new(estimate.tag());
    for (channel, series) in &estimate.channels {
        let reference = truth.get(channel).ok_or_else(|| {
            ValidationError::schema(
                format!("tracker '{}'", estimate.name),
                format!("no ground-truth positions for channel '{channel}'"),
            )
        })?;
        let distances = paired_distances(series, reference, Pairing::ByFrame)?;
        for (position, distance) in series.positions().iter().zip(distances) {
            if !distance.is_finite() {
                return Err(ValidationError::schema(
                    format!("tracker '{}'", estimate.name),
                    format!(
                        "channel '{channel}' frame {}: distance {distance} is not finite",
                        position.frame
                    ),
                ));
            }
            distribution.push(distance, Some(format!("{channel}@{}", position.frame)));
        }
    }
    tracing::debug!(
        tracker = estimate.name.as_str(),
        channels = estimate.channels.len(),
        detections = distribution.len(),
        "trajectory: measured localization error"
    );
    Ok(distribution)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerComparison {
    pub first: ErrorDistribution,
    pub second: ErrorDistribution,
    pub test: WelchTTest,
}

pub fn compare_trackers(
    first: &TrackerEstimate,
    second: &TrackerEstimate,
    truth: &BTreeMap<String, PositionSeries>,
) -> Result<TrackerComparison, ValidationError> {
    let first = tracker_error(first, truth)?;
    let second = tracker_error(second, truth)?;
    let test = welch::welch_t_test(&first.values(), &second.values())?;
    Ok(TrackerComparison {
        first,
        second,
        test,
    })
}

impl ReportSection for TrackerComparison {
    fn contribute(self, builder: &mut ReportBuilder) {
        builder.add_significance_test(SignificanceTest {
            name: format!("trajectory: {} vs {}", self.first.tag().category, self.second.tag().category),
            sample_a: self.first.tag().clone(),
            sample_b: self.second.tag().clone(),
            result: self.test,
        });
        builder.add_distribution(self.first);
        builder.add_distribution(self.second);
    }
}
