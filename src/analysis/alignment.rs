use crate::analysis::{paired_distances, Pairing};
use crate::error::ValidationError;
use crate::report::{ErrorDistribution, ReportBuilder, ReportSection, SignificanceTest};
use crate::stats::welch::{self, WelchTTest};
use crate::types::{AlignmentExperiment, Category, DistributionTag, ExperimentRole, Metric};

/// Per-sample distances of the perturbed and corrected positions from ground
/// truth, and a Welch test between the two.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentAnalysis {
    pub rotated: ErrorDistribution,
    pub corrected: ErrorDistribution,
    pub test: WelchTTest,
}

pub fn role_tag(role: ExperimentRole) -> DistributionTag {
    DistributionTag::new(Category::Label(role.as_str().to_string()), Metric::Distance)
}

pub fn analyze_alignment(
    experiment: &AlignmentExperiment,
) -> Result<AlignmentAnalysis, ValidationError> {
    let samples = experiment.sample_count();
    if samples < welch::MIN_SAMPLES {
        return Err(ValidationError::insufficient(
            "alignment analysis",
            welch::MIN_SAMPLES,
            samples,
        ));
    }

    let original = &experiment.role(ExperimentRole::Original).positions;
    let distance_rotated = paired_distances(
        &experiment.role(ExperimentRole::Rotated).positions,
        original,
        Pairing::ByIndex,
    )?;
    let distance_corrected = paired_distances(
        &experiment.role(ExperimentRole::Corrected).positions,
        original,
        Pairing::ByIndex,
    )?;

    let test = welch::welch_t_test(&distance_rotated, &distance_corrected)?;
    tracing::debug!(
        samples,
        t_stat = test.t_stat,
        p_value = test.p_value,
        "alignment: compared rotated and corrected distances"
    );

    Ok(AlignmentAnalysis {
        rotated: ErrorDistribution::from_values(
            role_tag(ExperimentRole::Rotated),
            &distance_rotated,
        ),
        corrected: ErrorDistribution::from_values(
            role_tag(ExperimentRole::Corrected),
            &distance_corrected,
        ),
        test,
    })
}

impl ReportSection for AlignmentAnalysis {
    fn contribute(self, builder: &mut ReportBuilder) {
        builder.add_significance_test(SignificanceTest {
            name: "alignment: rotated vs corrected".to_string(),
            sample_a: self.rotated.tag().clone(),
            sample_b: self.corrected.tag().clone(),
            result: self.test,
        });
        builder.add_distribution(self.rotated);
        builder.add_distribution(self.corrected);
    }
}
