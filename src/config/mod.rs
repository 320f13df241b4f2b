//! Run configuration for the `rbfit` binary.
//!
//! Values are layered: built-in defaults, then the optional TOML file, then
//! command-line flags. See [`builder`] for the merge.

pub mod builder;
pub mod file;

pub use builder::{build_demo_config, build_fit_config};
pub use file::FileConfig;

use std::path::PathBuf;

use crate::data::SampleOptions;
use crate::domain::{AngleSeries, Bounds};
use crate::error::AppError;
use crate::fit::FitStrategy;

pub const DEFAULT_NUM_COEFFICIENTS: usize = 4;
pub const DEFAULT_ANGLE_START: f64 = 0.0;
pub const DEFAULT_ANGLE_STEP: f64 = 10.0;
pub const DEFAULT_BOUNDS: Bounds = Bounds {
    min: -50.0,
    max: 50.0,
};
pub const DEFAULT_DEMO_COEFFICIENTS: [f64; 4] = [1.0, 2.0, 3.0, 4.0];
pub const DEFAULT_DEMO_SEED: u64 = 42;
/// Upper limit on samples per series.
pub const MAX_SAMPLES: usize = 100_000;

/// Angle grid shared by every series of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    pub angle_start: f64,
    pub angle_step: f64,
    pub samples: usize,
    /// Shift each series so its minimum is zero before differencing.
    pub shift_to_zero: bool,
}

impl ScanConfig {
    pub fn angles(&self) -> Result<AngleSeries, AppError> {
        AngleSeries::uniform(self.angle_start, self.angle_step, self.samples)
            .map_err(|e| AppError::new(2, format!("Invalid angle grid: {e}")))
    }
}

/// Everything `rbfit fit` needs.
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub start_paths: Vec<PathBuf>,
    pub target_paths: Vec<PathBuf>,
    pub num_coefficients: usize,
    pub scan: ScanConfig,
    pub strategy: FitStrategy,
    pub show_profile: bool,
}

/// Everything `rbfit demo` needs.
#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub sample: SampleOptions,
    pub scan: ScanConfig,
    pub strategy: FitStrategy,
    pub show_profile: bool,
}
