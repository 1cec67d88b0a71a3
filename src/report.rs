use std::collections::HashMap;

use serde::Serialize;

use crate::error::ValidationError;
use crate::stats::histogram::{BinningStrategy, Histogram};
use crate::stats::welch::WelchTTest;
use crate::stats::{self, SummaryStats};
use crate::types::{DistributionTag, ErrorSample};

pub const SCHEMA_VERSION: u32 = 1;

/// Error samples sharing one tag. Samples are only ever appended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDistribution {
    tag: DistributionTag,
    samples: Vec<ErrorSample>,
}

impl ErrorDistribution {
    pub fn new(tag: DistributionTag) -> Self {
        Self {
            tag,
            samples: Vec::new(),
        }
    }

    /// Non-finite values are dropped; sources are the sample indices.
    pub fn from_values(tag: DistributionTag, values: &[f64]) -> Self {
        let mut distribution = Self::new(tag);
        let mut dropped = 0usize;
        for (idx, &value) in values.iter().enumerate() {
            if value.is_finite() {
                distribution.push(value, Some(idx.to_string()));
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            tracing::warn!(
                tag = %distribution.tag,
                dropped,
                "report: dropped non-finite samples"
            );
        }
        distribution
    }

    pub fn push(&mut self, value: f64, source: Option<String>) {
        self.samples.push(ErrorSample {
            tag: self.tag.clone(),
            value,
            source,
        });
    }

    pub fn tag(&self) -> &DistributionTag {
        &self.tag
    }

    pub fn samples(&self) -> &[ErrorSample] {
        &self.samples
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|sample| sample.value).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn mean(&self) -> Option<f64> {
        (!self.is_empty()).then(|| stats::mean(&self.values()))
    }

    pub fn std_dev(&self) -> Option<f64> {
        (!self.is_empty()).then(|| stats::population_variance(&self.values()).sqrt())
    }

    pub fn summary(&self) -> Option<SummaryStats> {
        SummaryStats::from_values(&self.values())
    }

    pub fn histogram(&self, strategy: &BinningStrategy) -> Result<Histogram, ValidationError> {
        Histogram::compute(&self.values(), strategy)
    }
}

/// Insertion-ordered, append-only set of distributions keyed by tag.
#[derive(Debug, Clone, Default)]
pub struct DistributionSet {
    distributions: Vec<ErrorDistribution>,
    index: HashMap<DistributionTag, usize>,
}

impl DistributionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tag so it keeps its position even if it ends up empty.
    pub fn ensure(&mut self, tag: &DistributionTag) -> &mut ErrorDistribution {
        let idx = match self.index.get(tag) {
            Some(&idx) => idx,
            None => {
                self.distributions.push(ErrorDistribution::new(tag.clone()));
                let idx = self.distributions.len() - 1;
                self.index.insert(tag.clone(), idx);
                idx
            }
        };
        &mut self.distributions[idx]
    }

    pub fn record(&mut self, tag: &DistributionTag, value: f64, source: Option<String>) {
        self.ensure(tag).push(value, source);
    }

    pub fn merge(&mut self, distribution: ErrorDistribution) {
        let target = self.ensure(distribution.tag());
        target.samples.extend(distribution.samples);
    }

    pub fn get(&self, tag: &DistributionTag) -> Option<&ErrorDistribution> {
        self.index.get(tag).map(|&idx| &self.distributions[idx])
    }

    pub fn len(&self) -> usize {
        self.distributions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distributions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ErrorDistribution> {
        self.distributions.iter()
    }

    pub fn into_distributions(self) -> Vec<ErrorDistribution> {
        self.distributions
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignificanceTest {
    pub name: String,
    pub sample_a: DistributionTag,
    pub sample_b: DistributionTag,
    #[serde(flatten)]
    pub result: WelchTTest,
}

/// A batch entry left out of every distribution, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exclusion {
    pub movie_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportMeta {
    pub generated_at: String,
    pub inputs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionReport {
    label: String,
    summary: Option<SummaryStats>,
    histogram: Histogram,
    #[serde(flatten)]
    distribution: ErrorDistribution,
}

impl DistributionReport {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn tag(&self) -> &DistributionTag {
        self.distribution.tag()
    }

    pub fn summary(&self) -> Option<&SummaryStats> {
        self.summary.as_ref()
    }

    /// Headline statistic of the distribution.
    pub fn mean(&self) -> Option<f64> {
        self.summary.as_ref().map(|summary| summary.mean)
    }

    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    pub fn distribution(&self) -> &ErrorDistribution {
        &self.distribution
    }
}

/// Terminal output of a validation run. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    schema_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<ReportMeta>,
    binning: BinningStrategy,
    distributions: Vec<DistributionReport>,
    significance_tests: Vec<SignificanceTest>,
    exclusions: Vec<Exclusion>,
}

impl ValidationReport {
    pub fn meta(&self) -> Option<&ReportMeta> {
        self.meta.as_ref()
    }

    pub fn binning(&self) -> &BinningStrategy {
        &self.binning
    }

    pub fn distributions(&self) -> &[DistributionReport] {
        &self.distributions
    }

    pub fn distribution(&self, tag: &DistributionTag) -> Option<&DistributionReport> {
        self.distributions.iter().find(|entry| entry.tag() == tag)
    }

    pub fn significance_tests(&self) -> &[SignificanceTest] {
        &self.significance_tests
    }

    pub fn exclusions(&self) -> &[Exclusion] {
        &self.exclusions
    }

    pub fn excluded_movie_ids(&self) -> Vec<&str> {
        self.exclusions
            .iter()
            .map(|exclusion| exclusion.movie_id.as_str())
            .collect()
    }
}

/// Anything an analyzer hands to the report builder.
pub trait ReportSection {
    fn contribute(self, builder: &mut ReportBuilder);
}

impl ReportSection for ErrorDistribution {
    fn contribute(self, builder: &mut ReportBuilder) {
        builder.add_distribution(self);
    }
}

#[derive(Debug, Default)]
pub struct ReportBuilder {
    binning: BinningStrategy,
    meta: Option<ReportMeta>,
    distributions: DistributionSet,
    significance_tests: Vec<SignificanceTest>,
    exclusions: Vec<Exclusion>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binning(mut self, binning: BinningStrategy) -> Self {
        self.binning = binning;
        self
    }

    pub fn with_meta(mut self, meta: ReportMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn add_section(&mut self, section: impl ReportSection) -> &mut Self {
        section.contribute(self);
        self
    }

    /// A tag seen before keeps its position; the new samples are appended.
    pub fn add_distribution(&mut self, distribution: ErrorDistribution) -> &mut Self {
        self.distributions.merge(distribution);
        self
    }

    pub fn add_significance_test(&mut self, test: SignificanceTest) -> &mut Self {
        self.significance_tests.push(test);
        self
    }

    pub fn add_exclusion(&mut self, exclusion: Exclusion) -> &mut Self {
        self.exclusions.push(exclusion);
        self
    }

    pub fn build(self) -> Result<ValidationReport, ValidationError> {
        self.binning.validate()?;
        let distributions = self
            .distributions
            .into_distributions()
            .into_iter()
            .map(|distribution| {
                Ok(DistributionReport {
                    label: distribution.tag().to_string(),
                    summary: distribution.summary(),
                    histogram: distribution.histogram(&self.binning)?,
                    distribution,
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        Ok(ValidationReport {
            schema_version: SCHEMA_VERSION,
            meta: self.meta,
            binning: self.binning,
            distributions,
            significance_tests: self.significance_tests,
            exclusions: self.exclusions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, Metric};

    fn tag(category: Category, metric: Metric) -> DistributionTag {
        DistributionTag::new(category, metric)
    }

    #[test]
    fn distribution_mean_and_std() {
        let dist = ErrorDistribution::from_values(
            tag(Category::Particle(1), Metric::D),
            &[0.1, -0.1, 0.3, -0.3],
        );
        assert_eq!(dist.len(), 4);
        assert!(dist.mean().expect("non-empty").abs() < 1e-12);
        assert!((dist.std_dev().expect("non-empty") - 0.05f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn from_values_drops_non_finite() {
        let dist = ErrorDistribution::from_values(
            tag(Category::Background, Metric::ErrorX),
            &[1.0, f64::NAN, 2.0, f64::INFINITY],
        );
        assert_eq!(dist.values(), vec![1.0, 2.0]);
        assert_eq!(dist.samples()[1].source.as_deref(), Some("2"));
    }

    #[test]
    fn empty_distribution_has_no_mean() {
        let dist = ErrorDistribution::new(tag(Category::Substrate, Metric::DR));
        assert!(dist.mean().is_none());
        assert!(dist.summary().is_none());
    }

    #[test]
    fn set_keeps_insertion_order() {
        let mut set = DistributionSet::new();
        let alpha = tag(Category::Particle(1), Metric::Alpha);
        let d = tag(Category::Particle(1), Metric::D);
        set.record(&alpha, 0.1, None);
        set.record(&d, 0.2, None);
        set.record(&alpha, 0.3, None);
        let order: Vec<_> = set.iter().map(|dist| dist.tag().clone()).collect();
        assert_eq!(order, vec![alpha.clone(), d]);
        assert_eq!(set.get(&alpha).map(ErrorDistribution::len), Some(2));
    }

    #[test]
    fn every_sample_carries_its_distribution_tag() {
        let mut set = DistributionSet::new();
        let d = tag(Category::Particle(2), Metric::D);
        set.record(&d, 0.5, Some("mov1".to_string()));
        let dist = set.get(&d).expect("recorded");
        assert!(dist.samples().iter().all(|sample| &sample.tag == dist.tag()));
    }

    #[test]
    fn builder_produces_summaries_and_histograms() {
        let mut builder = ReportBuilder::new().with_binning(BinningStrategy::Fixed {
            edges: vec![-1.0, 0.0, 1.0],
        });
        builder
            .add_section(ErrorDistribution::from_values(
                tag(Category::Particle(1), Metric::D),
                &[-0.5, 0.25, 0.5],
            ))
            .add_exclusion(Exclusion {
                movie_id: "mov2".to_string(),
                reason: "missing dynamics".to_string(),
            });
        let report = builder.build().expect("valid report");

        assert_eq!(report.distributions().len(), 1);
        let entry = &report.distributions()[0];
        assert_eq!(entry.label(), "Particle 1 / D");
        assert_eq!(entry.histogram().counts, vec![1, 2]);
        assert!((entry.mean().expect("non-empty") - 0.25 / 3.0).abs() < 1e-12);
        assert_eq!(report.excluded_movie_ids(), vec!["mov2"]);
    }

    #[test]
    fn report_serializes_to_json() {
        let mut builder = ReportBuilder::new();
        builder.add_distribution(ErrorDistribution::from_values(
            tag(Category::Label("green".to_string()), Metric::Distance),
            &[0.5, 1.5],
        ));
        let report = builder.build().expect("valid report");
        let json = serde_json::to_value(&report).expect("serializable");
        assert_eq!(json["schema_version"], 1);
        assert_eq!(json["binning"], "sturges");
        assert_eq!(json["distributions"][0]["label"], "green / distance");
        assert_eq!(json["distributions"][0]["summary"]["count"], 2);
    }
}
