//! Relative error of fitted GP-FBM diffusion parameters across a batch of movies.
//!
//! Each movie is extracted into a typed [`DiffusionModelResult`] and turned into
//! relative errors against the scenario's injected constants. A movie that fails
//! either step is recorded as an [`Exclusion`] and contributes nothing; the
//! batch always runs to completion.

use std::collections::BTreeSet;

use crate::config::{require_denominator, CoupledScenario, SingleScenario, ValidationConfig};
use crate::error::ValidationError;
use crate::report::{DistributionSet, ErrorDistribution, Exclusion, ReportBuilder, ReportSection};
use crate::types::{
    BatchRun, Category, DiffusionModelResult, DistributionTag, Metric, ModelRecord, MovieRecord,
    ParticleDynamics, SubstrateDynamics,
};

/// Frame-interval scaling applied by the fit; `D_raw` is reported per `0.5^alpha`.
pub const TIMESTEP_SCALE: f64 = 0.5;

/// `[channel, particle_id, D, alpha, ...]`
const DYNAMICS_D_COLUMN: usize = 2;
const DYNAMICS_ALPHA_COLUMN: usize = 3;

pub fn apparent_diffusion(d_raw: f64, alpha: f64) -> f64 {
    d_raw / TIMESTEP_SCALE.powf(alpha)
}

/// `(estimated - truth) / truth`. A zero truth is a broken scenario, not data.
pub fn relative_error(estimated: f64, truth: f64) -> Result<f64, ValidationError> {
    require_denominator("value", truth)?;
    Ok((estimated - truth) / truth)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Single,
    Coupled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scenario {
    Single(SingleScenario),
    Coupled(CoupledScenario),
}

impl Scenario {
    pub fn kind(&self) -> ModelKind {
        match self {
            Self::Single(_) => ModelKind::Single,
            Self::Coupled(_) => ModelKind::Coupled,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Single(truth) => {
                require_denominator("D", truth.d)?;
                require_denominator("alpha", truth.alpha)
            }
            Self::Coupled(truth) => {
                if truth.particles.is_empty() {
                    return Err(ValidationError::configuration(
                        "coupled scenario lists no particles",
                    ));
                }
                for (idx, particle) in truth.particles.iter().enumerate() {
                    require_denominator(&format!("particle {} D", idx + 1), particle.d)?;
                    require_denominator(&format!("particle {} alpha", idx + 1), particle.alpha)?;
                }
                require_denominator("substrate DR", truth.substrate.dr)?;
                require_denominator("substrate AR", truth.substrate.ar)
            }
        }
    }
}

/// Distribution tags in report order for a model with `particles` particles.
pub fn diffusion_tags(kind: ModelKind, particles: usize) -> Vec<DistributionTag> {
    let particle_count = match kind {
        ModelKind::Single => 1,
        ModelKind::Coupled => particles,
    };
    let mut tags = Vec::with_capacity(particle_count * 2 + 2);
    for idx in 1..=particle_count {
        let category = Category::Particle(idx as u32);
        tags.push(DistributionTag::new(category.clone(), Metric::D));
        tags.push(DistributionTag::new(category, Metric::Alpha));
    }
    if kind == ModelKind::Coupled {
        tags.push(DistributionTag::new(Category::Substrate, Metric::DR));
        tags.push(DistributionTag::new(Category::Substrate, Metric::AR));
    }
    tags
}

#[derive(Debug, Clone)]
pub struct DiffusionValidator {
    scenario: Scenario,
    model_key: String,
    expected_movies: Vec<String>,
}

impl DiffusionValidator {
    pub fn new(scenario: Scenario) -> Result<Self, ValidationError> {
        scenario.validate()?;
        let model_key = match scenario.kind() {
            ModelKind::Single => ValidationConfig::DEFAULT_SINGLE_MODEL_KEY,
            ModelKind::Coupled => ValidationConfig::DEFAULT_COUPLED_MODEL_KEY,
        };
        Ok(Self {
            scenario,
            model_key: model_key.to_string(),
            expected_movies: Vec::new(),
        })
    }

    pub fn from_config(kind: ModelKind, config: &ValidationConfig) -> Result<Self, ValidationError> {
        let (scenario, model_key) = match kind {
            ModelKind::Single => (Scenario::Single(config.single), &config.single_model_key),
            ModelKind::Coupled => (
                Scenario::Coupled(config.coupled.clone()),
                &config.coupled_model_key,
            ),
        };
        Ok(Self::new(scenario)?
            .with_model_key(model_key.clone())
            .with_expected_movies(config.expected_movies.clone()))
    }

    pub fn with_model_key(mut self, model_key: impl Into<String>) -> Self {
        self.model_key = model_key.into();
        self
    }

    pub fn with_expected_movies(mut self, movie_ids: Vec<String>) -> Self {
        self.expected_movies = movie_ids;
        self
    }

    pub fn kind(&self) -> ModelKind {
        self.scenario.kind()
    }

    pub fn tags(&self) -> Vec<DistributionTag> {
        let particles = match &self.scenario {
            Scenario::Single(_) => 1,
            Scenario::Coupled(truth) => truth.particles.len(),
        };
        diffusion_tags(self.kind(), particles)
    }

    pub fn validate(&self, batch: &BatchRun) -> DiffusionAnalysis {
        self.validate_with(batch, |_| {})
    }

    /// Same as [`validate`](Self::validate), calling `on_movie` once per batch entry.
    pub fn validate_with(&self, batch: &BatchRun, mut on_movie: impl FnMut(&str)) -> DiffusionAnalysis {
        let mut distributions = DistributionSet::new();
        for tag in self.tags() {
            distributions.ensure(&tag);
        }
        let mut exclusions = Vec::new();
        let mut accepted = 0usize;

        for (movie_id, record) in &batch.movies {
            on_movie(movie_id);
            // All of a movie's errors are computed before any is recorded, so a
            // failure part-way through leaves the accumulators untouched.
            match self.movie_errors(movie_id, record) {
                Ok(errors) => {
                    for (tag, value) in errors {
                        distributions.record(&tag, value, Some(movie_id.clone()));
                    }
                    accepted += 1;
                }
                Err(err) => {
                    let reason = match err {
                        ValidationError::MalformedRecord { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    tracing::warn!(movie_id = movie_id.as_str(), reason = reason.as_str(), "diffusion: excluding movie");
                    exclusions.push(Exclusion {
                        movie_id: movie_id.clone(),
                        reason,
                    });
                }
            }
        }

        let present: BTreeSet<&str> = batch.movies.keys().map(String::as_str).collect();
        for movie_id in &self.expected_movies {
            if !present.contains(movie_id.as_str()) {
                tracing::warn!(movie_id = movie_id.as_str(), "diffusion: expected movie absent from batch");
                exclusions.push(Exclusion {
                    movie_id: movie_id.clone(),
                    reason: "movie entry absent".to_string(),
                });
            }
        }

        tracing::debug!(
            movies = batch.len(),
            accepted,
            excluded = exclusions.len(),
            "diffusion: batch validated"
        );

        DiffusionAnalysis {
            kind: self.kind(),
            movie_count: batch.len(),
            accepted,
            distributions,
            exclusions,
        }
    }

    /// Relative errors for one movie, tagged, or the reason it cannot be used.
    pub fn movie_errors(
        &self,
        movie_id: &str,
        record: &MovieRecord,
    ) -> Result<Vec<(DistributionTag, f64)>, ValidationError> {
        let result = self.extract(movie_id, record)?;
        let errors = self.relative_errors(&result);
        if let Some((tag, value)) = errors.iter().find(|(_, value)| !value.is_finite()) {
            return Err(ValidationError::malformed(
                movie_id,
                format!("relative error for {tag} is not finite ({value})"),
            ));
        }
        Ok(errors)
    }

    /// Pulls this validator's model out of a movie record.
    pub fn extract(
        &self,
        movie_id: &str,
        record: &MovieRecord,
    ) -> Result<DiffusionModelResult, ValidationError> {
        let gprocess = match record {
            MovieRecord::Parsed(gprocess) => gprocess,
            MovieRecord::Malformed { reason } => {
                return Err(ValidationError::malformed(movie_id, reason.clone()))
            }
        };
        let model = gprocess.models.get(&self.model_key).ok_or_else(|| {
            ValidationError::malformed(
                movie_id,
                format!("missing model 'GProcess.{}'", self.model_key),
            )
        })?;

        match &self.scenario {
            Scenario::Single(_) => {
                let particle = self.dynamics_rows(movie_id, model, 1)?[0];
                Ok(DiffusionModelResult::Single(particle))
            }
            Scenario::Coupled(truth) => {
                let particles = self.dynamics_rows(movie_id, model, truth.particles.len())?;
                let substrate = self.substrate(movie_id, model)?;
                Ok(DiffusionModelResult::Coupled {
                    particles,
                    substrate,
                })
            }
        }
    }

    fn dynamics_rows(
        &self,
        movie_id: &str,
        model: &ModelRecord,
        required: usize,
    ) -> Result<Vec<ParticleDynamics>, ValidationError> {
        let path = format!("GProcess.{}.dynamics", self.model_key);
        let rows = model
            .dynamics
            .as_ref()
            .ok_or_else(|| ValidationError::malformed(movie_id, format!("missing '{path}'")))?;
        if rows.len() < required {
            return Err(ValidationError::malformed(
                movie_id,
                format!("'{path}' has {} rows, need {required}", rows.len()),
            ));
        }
        rows.iter()
            .take(required)
            .enumerate()
            .map(|(idx, row)| match (row.get(DYNAMICS_D_COLUMN), row.get(DYNAMICS_ALPHA_COLUMN)) {
                (Some(&d_raw), Some(&alpha)) => Ok(ParticleDynamics { d_raw, alpha }),
                _ => Err(ValidationError::malformed(
                    movie_id,
                    format!(
                        "'{path}' row {idx} has {} columns, need at least {}",
                        row.len(),
                        DYNAMICS_ALPHA_COLUMN + 1
                    ),
                )),
            })
            .collect()
    }

    fn substrate(
        &self,
        movie_id: &str,
        model: &ModelRecord,
    ) -> Result<SubstrateDynamics, ValidationError> {
        let path = format!("GProcess.{}.Substrate", self.model_key);
        let substrate = model
            .substrate
            .ok_or_else(|| ValidationError::malformed(movie_id, format!("missing '{path}'")))?;
        let dr = substrate
            .dr
            .ok_or_else(|| ValidationError::malformed(movie_id, format!("missing '{path}.DR'")))?;
        let ar = substrate
            .ar
            .ok_or_else(|| ValidationError::malformed(movie_id, format!("missing '{path}.AR'")))?;
        Ok(SubstrateDynamics { dr, ar })
    }

    fn relative_errors(&self, result: &DiffusionModelResult) -> Vec<(DistributionTag, f64)> {
        let mut errors = Vec::new();
        match (&self.scenario, result) {
            (Scenario::Single(truth), DiffusionModelResult::Single(particle)) => {
                push_particle(&mut errors, 1, particle, truth.d, truth.alpha);
            }
            (
                Scenario::Coupled(truth),
                DiffusionModelResult::Coupled {
                    particles,
                    substrate,
                },
            ) => {
                for (idx, (particle, expected)) in particles.iter().zip(&truth.particles).enumerate() {
                    push_particle(&mut errors, idx + 1, particle, expected.d, expected.alpha);
                }
                errors.push((
                    DistributionTag::new(Category::Substrate, Metric::DR),
                    relative(apparent_diffusion(substrate.dr, substrate.ar), truth.substrate.dr),
                ));
                errors.push((
                    DistributionTag::new(Category::Substrate, Metric::AR),
                    relative(substrate.ar, truth.substrate.ar),
                ));
            }
            // extract() only produces the variant matching the scenario.
            _ => {}
        }
        errors
    }
}

fn push_particle(
    errors: &mut Vec<(DistributionTag, f64)>,
    index: usize,
    particle: &ParticleDynamics,
    d_true: f64,
    alpha_true: f64,
) {
    let category = Category::Particle(index as u32);
    errors.push((
        DistributionTag::new(category.clone(), Metric::D),
        relative(apparent_diffusion(particle.d_raw, particle.alpha), d_true),
    ));
    errors.push((
        DistributionTag::new(category, Metric::Alpha),
        relative(particle.alpha, alpha_true),
    ));
}

// Truths are checked once when the validator is built.
fn relative(estimated: f64, truth: f64) -> f64 {
    (estimated - truth) / truth
}

#[derive(Debug, Clone)]
pub struct DiffusionAnalysis {
    kind: ModelKind,
    movie_count: usize,
    accepted: usize,
    distributions: DistributionSet,
    exclusions: Vec<Exclusion>,
}

impl DiffusionAnalysis {
    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn movie_count(&self) -> usize {
        self.movie_count
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn distribution(&self, tag: &DistributionTag) -> Option<&ErrorDistribution> {
        self.distributions.get(tag)
    }

    pub fn distributions(&self) -> impl Iterator<Item = &ErrorDistribution> {
        self.distributions.iter()
    }

    pub fn exclusions(&self) -> &[Exclusion] {
        &self.exclusions
    }
}

impl ReportSection for DiffusionAnalysis {
    fn contribute(self, builder: &mut ReportBuilder) {
        for distribution in self.distributions.into_distributions() {
            builder.add_distribution(distribution);
        }
        for exclusion in self.exclusions {
            builder.add_exclusion(exclusion);
        }
    }
}
