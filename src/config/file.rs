//! TOML configuration file.
//!
//! Every key is optional; anything missing falls back to the built-in defaults and
//! anything given on the command line wins over the file.
//!
//! ```toml
//! coefficients = 4
//! method = "lsq"          # or "de"
//! shift-to-zero = true
//!
//! [angles]
//! start = 0.0
//! step = 10.0
//! samples = 36
//!
//! [least-squares]
//! initial-guess = [0.0, 0.0, 0.0, 0.0]
//! max-iterations = 200
//!
//! [differential-evolution]
//! bounds = [{ min = -50.0, max = 50.0 }]   # one entry applies to every coefficient
//! seed = 42
//! polish = true
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::domain::{Bounds, Method};
use crate::error::AppError;

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub coefficients: Option<usize>,
    pub method: Option<Method>,
    pub shift_to_zero: Option<bool>,
    pub angles: Option<FileAnglesConfig>,
    pub least_squares: Option<FileLeastSquaresConfig>,
    pub differential_evolution: Option<FileDifferentialEvolutionConfig>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileAnglesConfig {
    pub start: Option<f64>,
    pub step: Option<f64>,
    pub samples: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileLeastSquaresConfig {
    pub initial_guess: Option<Vec<f64>>,
    pub max_iterations: Option<usize>,
    pub ftol: Option<f64>,
    pub xtol: Option<f64>,
    pub gtol: Option<f64>,
    pub stepbound: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileDifferentialEvolutionConfig {
    pub bounds: Option<Vec<Bounds>>,
    pub population_factor: Option<usize>,
    pub max_generations: Option<usize>,
    pub mutation: Option<(f64, f64)>,
    pub recombination: Option<f64>,
    pub tol: Option<f64>,
    pub atol: Option<f64>,
    pub seed: Option<u64>,
    pub polish: Option<bool>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        debug!("Loading configuration from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(
                2,
                format!("Failed to read config file '{}': {e}", path.display()),
            )
        })?;
        Self::from_toml_str(&text).map_err(|e| {
            AppError::new(2, format!("Invalid config file '{}': {e}", path.display()))
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}
