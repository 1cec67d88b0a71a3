use std::path::Path;

use serde::Deserialize;

use crate::error::ValidationError;
use crate::stats::histogram::BinningStrategy;

/// Injected constants for the single-particle scenario.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SingleScenario {
    pub d: f64,
    pub alpha: f64,
}

impl Default for SingleScenario {
    fn default() -> Self {
        Self { d: 0.1, alpha: 0.5 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ParticleTruth {
    pub d: f64,
    pub alpha: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SubstrateTruth {
    pub dr: f64,
    pub ar: f64,
}

/// Injected constants for the coupled (particles on a moving substrate) scenario.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CoupledScenario {
    pub particles: Vec<ParticleTruth>,
    pub substrate: SubstrateTruth,
}

impl Default for CoupledScenario {
    fn default() -> Self {
        Self {
            particles: vec![
                ParticleTruth { d: 0.89, alpha: 0.33 },
                ParticleTruth { d: 1.11, alpha: 0.25 },
            ],
            substrate: SubstrateTruth { dr: 0.1, ar: 1.0 },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub single: SingleScenario,
    pub coupled: CoupledScenario,
    pub single_model_key: String,
    pub coupled_model_key: String,
    pub binning: BinningStrategy,
    /// Movies the scenario expects; any missing from the batch is reported as excluded.
    pub expected_movies: Vec<String>,
}

impl ValidationConfig {
    pub const DEFAULT_SINGLE_MODEL_KEY: &'static str = "Single";
    pub const DEFAULT_COUPLED_MODEL_KEY: &'static str = "Corrected";

    pub fn load(path: &Path) -> Result<Self, ValidationError> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::io(format!("reading config '{}'", path.display()), e)
        })?;
        let config: Self = serde_json::from_str(&data).map_err(|e| {
            ValidationError::json(format!("parsing config '{}'", path.display()), e)
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_denominator("single D", self.single.d)?;
        require_denominator("single alpha", self.single.alpha)?;
        if self.coupled.particles.is_empty() {
            return Err(ValidationError::configuration(
                "coupled scenario lists no particles",
            ));
        }
        for (idx, particle) in self.coupled.particles.iter().enumerate() {
            require_denominator(&format!("particle {} D", idx + 1), particle.d)?;
            require_denominator(&format!("particle {} alpha", idx + 1), particle.alpha)?;
        }
        require_denominator("substrate DR", self.coupled.substrate.dr)?;
        require_denominator("substrate AR", self.coupled.substrate.ar)?;
        self.binning.validate()
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            single: SingleScenario::default(),
            coupled: CoupledScenario::default(),
            single_model_key: Self::DEFAULT_SINGLE_MODEL_KEY.to_string(),
            coupled_model_key: Self::DEFAULT_COUPLED_MODEL_KEY.to_string(),
            binning: BinningStrategy::default(),
            expected_movies: Vec::new(),
        }
    }
}

/// Ground truths divide the relative error, so zero is a broken scenario.
pub(crate) fn require_denominator(name: &str, value: f64) -> Result<(), ValidationError> {
    if value == 0.0 || !value.is_finite() {
        return Err(ValidationError::configuration(format!(
            "ground truth {name} must be finite and non-zero, got {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_config_default() {
        let config = ValidationConfig::default();
        assert_eq!(config.single, SingleScenario { d: 0.1, alpha: 0.5 });
        assert_eq!(config.coupled.particles.len(), 2);
        assert_eq!(config.single_model_key, "Single");
        assert_eq!(config.coupled_model_key, "Corrected");
        assert_eq!(config.binning, BinningStrategy::Sturges);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let json = r#"{
            "single": {"d": 0.25, "alpha": 1.2},
            "binning": {"fixed": {"edges": [-1.0, 0.0, 1.0]}}
        }"#;
        let config: ValidationConfig = serde_json::from_str(json).expect("valid config json");
        assert_eq!(config.single.d, 0.25);
        assert_eq!(config.coupled, CoupledScenario::default());
        assert_eq!(
            config.binning,
            BinningStrategy::Fixed {
                edges: vec![-1.0, 0.0, 1.0]
            }
        );
    }

    #[test]
    fn zero_truth_is_configuration_error() {
        let mut config = ValidationConfig::default();
        config.coupled.substrate.dr = 0.0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ValidationError::Configuration { .. }));
        assert!(err.to_string().contains("substrate DR"));
    }

    #[test]
    fn empty_coupled_particles_is_configuration_error() {
        let mut config = ValidationConfig::default();
        config.coupled.particles.clear();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ValidationError::Configuration { .. }));
        assert!(err.to_string().contains("no particles"));

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("scenario.json");
        let data = r#"{"coupled": {"particles": [], "substrate": {"dr": 0.1, "ar": 1.0}}}"#;
        std::fs::write(&path, data).expect("write");
        assert!(matches!(
            ValidationConfig::load(&path),
            Err(ValidationError::Configuration { .. })
        ));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("scenario.json");
        std::fs::write(&path, r#"{"expected_movies": ["mov1", "mov2"]}"#).expect("write");
        let config = ValidationConfig::load(&path).expect("loads");
        assert_eq!(config.expected_movies, vec!["mov1", "mov2"]);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = ValidationConfig::load(Path::new("/nonexistent/scenario.json")).unwrap_err();
        assert!(matches!(err, ValidationError::Io { .. }));
    }
}
