//! Reporting utilities: fitted profile and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::{AngleSeries, EnergySeriesBatch};
use crate::error::AppError;
use crate::models::rb_energy;

/// Fitted RB energy next to the energy difference of every series, at one angle.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRow {
    pub angle: f64,
    pub fitted: f64,
    /// `target - start` for each series of the batch.
    pub targets: Vec<f64>,
}

/// Evaluate the fitted coefficients on the scan grid alongside the target differences.
pub fn compute_profile(
    diff: &EnergySeriesBatch,
    angles: &AngleSeries,
    coefficients: &[f64],
) -> Result<Vec<ProfileRow>, AppError> {
    if diff.series_len() != angles.len() {
        return Err(AppError::new(
            4,
            "Profile grid does not match the energy difference length.",
        ));
    }

    let mut rows = Vec::with_capacity(angles.len());
    for (k, &angle) in angles.degrees().iter().enumerate() {
        let fitted = rb_energy(coefficients, angle);
        if !fitted.is_finite() {
            return Err(AppError::new(4, "Non-finite RB energy while building the profile."));
        }
        rows.push(ProfileRow {
            angle,
            fitted,
            targets: diff.series().iter().map(|s| s.values()[k]).collect(),
        });
    }
    Ok(rows)
}
