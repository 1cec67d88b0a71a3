//! Relative-error tables written directly by the simulation drivers, one
//! channel per (particle, metric) pair in the same order the diffusion
//! validator reports them.

use serde::Deserialize;

use crate::analysis::diffusion::{diffusion_tags, ModelKind};
use crate::error::ValidationError;
use crate::report::{DistributionSet, ErrorDistribution, ReportBuilder, ReportSection};
use crate::types::{DistributionTag, NumericMatrix};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelativeErrorLayout {
    /// D, alpha
    Single,
    /// D, alpha per particle, then DR, AR
    Coupled { particles: usize },
}

impl RelativeErrorLayout {
    pub fn tags(&self) -> Vec<DistributionTag> {
        match *self {
            Self::Single => diffusion_tags(ModelKind::Single, 1),
            Self::Coupled { particles } => diffusion_tags(ModelKind::Coupled, particles),
        }
    }

    pub fn channel_count(&self) -> usize {
        match *self {
            Self::Single => 2,
            Self::Coupled { particles } => particles * 2 + 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelativeTableAnalysis {
    distributions: DistributionSet,
}

impl RelativeTableAnalysis {
    pub fn distribution(&self, tag: &DistributionTag) -> Option<&ErrorDistribution> {
        self.distributions.get(tag)
    }

    pub fn distributions(&self) -> impl Iterator<Item = &ErrorDistribution> {
        self.distributions.iter()
    }
}

pub fn relative_error_distributions(
    matrix: &NumericMatrix,
    layout: RelativeErrorLayout,
) -> Result<RelativeTableAnalysis, ValidationError> {
    let tags = layout.tags();
    if matrix.channel_count() != tags.len() {
        return Err(ValidationError::dimension(
            "relative error table",
            format!(
                "{:?} layout needs {} channels, table has {}",
                layout,
                tags.len(),
                matrix.channel_count()
            ),
        ));
    }

    let mut distributions = DistributionSet::new();
    for (tag, channel) in tags.iter().zip(matrix.channels()) {
        distributions.merge(ErrorDistribution::from_values(tag.clone(), channel));
    }
    tracing::debug!(
        channels = tags.len(),
        samples = matrix.sample_count(),
        "relative table: built distributions"
    );
    Ok(RelativeTableAnalysis { distributions })
}

impl ReportSection for RelativeTableAnalysis {
    fn contribute(self, builder: &mut ReportBuilder) {
        for distribution in self.distributions.into_distributions() {
            builder.add_distribution(distribution);
        }
    }
}
