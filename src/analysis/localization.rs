use crate::report::{ErrorDistribution, ReportBuilder, ReportSection};
use crate::types::{Category, DistributionTag, LocalizationErrorReport, Metric};

pub const LOCALIZATION_CATEGORY: &str = "localization";

#[derive(Debug, Clone, PartialEq)]
pub struct LocalizationAnalysis {
    pub error_x: ErrorDistribution,
    pub error_y: ErrorDistribution,
}

/// The two axes are independent; nothing is cross-referenced.
pub fn analyze_localization_errors(report: &LocalizationErrorReport) -> LocalizationAnalysis {
    let tag = |metric| {
        DistributionTag::new(Category::Label(LOCALIZATION_CATEGORY.to_string()), metric)
    };
    let analysis = LocalizationAnalysis {
        error_x: ErrorDistribution::from_values(tag(Metric::ErrorX), &report.error_x),
        error_y: ErrorDistribution::from_values(tag(Metric::ErrorY), &report.error_y),
    };
    tracing::debug!(
        error_x = analysis.error_x.len(),
        error_y = analysis.error_y.len(),
        "localization: built axis error distributions"
    );
    analysis
}

impl ReportSection for LocalizationAnalysis {
    fn contribute(self, builder: &mut ReportBuilder) {
        builder.add_distribution(self.error_x);
        builder.add_distribution(self.error_y);
    }
}
