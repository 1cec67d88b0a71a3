pub mod analysis;
pub mod config;
pub mod error;
pub mod ingest;
pub mod report;
pub mod stats;
pub mod types;

pub use analysis::alignment::{analyze_alignment, AlignmentAnalysis};
pub use analysis::diffusion::{
    apparent_diffusion, relative_error, DiffusionAnalysis, DiffusionValidator, ModelKind, Scenario,
};
pub use analysis::localization::{analyze_localization_errors, LocalizationAnalysis};
pub use analysis::relative_table::{relative_error_distributions, RelativeErrorLayout};
pub use analysis::trajectory::{compare_trackers, tracker_error, TrackerEstimate};
pub use config::ValidationConfig;
pub use error::ValidationError;
pub use report::{ErrorDistribution, ReportBuilder, ReportSection, ValidationReport};
pub use stats::histogram::{BinningStrategy, Histogram};
pub use stats::welch::{welch_t_test, WelchTTest};
pub use types::{
    AlignmentExperiment, BatchRun, Category, DistributionTag, ErrorSample, Metric, PositionSeries,
};
