use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};

use super::{mean, sample_variance};
use crate::error::ValidationError;

pub const MIN_SAMPLES: usize = 2;

/// Two-sided Welch's t-test (independent samples, unequal variances).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WelchTTest {
    pub t_stat: f64,
    pub degrees_of_freedom: f64,
    pub p_value: f64,
}

impl WelchTTest {
    pub fn is_significant(&self, level: f64) -> bool {
        self.p_value < level
    }
}

pub fn welch_t_test(sample_a: &[f64], sample_b: &[f64]) -> Result<WelchTTest, ValidationError> {
    for sample in [sample_a, sample_b] {
        if sample.len() < MIN_SAMPLES {
            return Err(ValidationError::insufficient(
                "welch t-test",
                MIN_SAMPLES,
                sample.len(),
            ));
        }
    }

    let n_a = sample_a.len() as f64;
    let n_b = sample_b.len() as f64;
    let var_a = sample_variance(sample_a);
    let var_b = sample_variance(sample_b);

    let mean_diff = mean(sample_a) - mean(sample_b);
    let standard_error = (var_a / n_a + var_b / n_b).sqrt();
    if !standard_error.is_finite() {
        return Err(ValidationError::insufficient(
            format!("welch t-test (standard error {standard_error})"),
            MIN_SAMPLES,
            sample_a.len().min(sample_b.len()),
        ));
    }
    // Both samples constant: the means either coincide or are separated with certainty.
    if standard_error == 0.0 {
        return Ok(if mean_diff == 0.0 {
            WelchTTest {
                t_stat: 0.0,
                degrees_of_freedom: 0.0,
                p_value: 1.0,
            }
        } else {
            WelchTTest {
                t_stat: f64::INFINITY.copysign(mean_diff),
                degrees_of_freedom: 0.0,
                p_value: 0.0,
            }
        });
    }

    let t_stat = mean_diff / standard_error;
    let numerator = (var_a / n_a + var_b / n_b).powi(2);
    let denominator =
        var_a.powi(2) / (n_a * n_a * (n_a - 1.0)) + var_b.powi(2) / (n_b * n_b * (n_b - 1.0));
    let df = numerator / denominator;

    let distribution = StudentsT::new(0.0, 1.0, df).map_err(|err| {
        ValidationError::insufficient(
            format!("welch t-test (degrees of freedom {df}: {err})"),
            MIN_SAMPLES,
            sample_a.len().min(sample_b.len()),
        )
    })?;
    let p_value = (2.0 * (1.0 - distribution.cdf(t_stat.abs()))).clamp(0.0, 1.0);

    Ok(WelchTTest {
        t_stat,
        degrees_of_freedom: df,
        p_value,
    })
}
