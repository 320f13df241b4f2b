//! Objective functions handed to the optimizers.
//!
//! An objective maps a trial coefficient vector to a non-negative scalar. Least-squares
//! solvers additionally need the residual vector behind that scalar and its Jacobian,
//! so the trait exposes all three views.

use nalgebra::{DMatrix, DVector};

use crate::domain::{AngleSeries, EnergySeries, EnergySeriesBatch};
use crate::error::FitError;
use crate::math::{rms, rmsd_batch};
use crate::models::{fill_design_row, rb_profile};

/// A function of the coefficient vector only.
///
/// Implementations must be pure: optimizers call them thousands of times, possibly
/// from several rayon workers at once.
pub trait Objective: Sync {
    /// Length of the coefficient vector.
    fn dimension(&self) -> usize;

    /// Residual vector `r(c)`; the objective value is `sqrt(Σ r² / m)`.
    fn residuals(&self, coefficients: &[f64]) -> Result<DVector<f64>, FitError>;

    fn value(&self, coefficients: &[f64]) -> Result<f64, FitError> {
        let r = self.residuals(coefficients)?;
        rms(r.as_slice())
    }

    /// `∂r_k / ∂c_i`, by central differences unless overridden.
    fn jacobian(&self, coefficients: &[f64]) -> Result<DMatrix<f64>, FitError> {
        let r0 = self.residuals(coefficients)?;
        let mut jac = DMatrix::<f64>::zeros(r0.len(), coefficients.len());
        let mut probe = coefficients.to_vec();
        let eps = f64::EPSILON.cbrt();

        for j in 0..coefficients.len() {
            let h = eps * coefficients[j].abs().max(1.0);
            probe[j] = coefficients[j] + h;
            let plus = self.residuals(&probe)?;
            probe[j] = coefficients[j] - h;
            let minus = self.residuals(&probe)?;
            probe[j] = coefficients[j];

            let column = (plus - minus) / (2.0 * h);
            jac.set_column(j, &column);
        }
        Ok(jac)
    }
}

/// RMSD between a fixed energy-difference batch and the RB profile of the trial
/// coefficients, evaluated on a fixed angle grid.
///
/// The same RB profile is compared against every member of the batch.
#[derive(Debug, Clone)]
pub struct TorsionObjective {
    target_diff: EnergySeriesBatch,
    angles: AngleSeries,
    num_coefficients: usize,
    /// `design[(k, i)] = cos(φ_k)^i`.
    design: DMatrix<f64>,
}

impl TorsionObjective {
    pub fn new(
        target_diff: EnergySeriesBatch,
        angles: AngleSeries,
        num_coefficients: usize,
    ) -> Result<Self, FitError> {
        if num_coefficients == 0 {
            return Err(FitError::InvalidInput(
                "number of RB coefficients must be positive".to_string(),
            ));
        }
        if target_diff.series_len() != angles.len() {
            return Err(FitError::InvalidInput(format!(
                "energy series have {} samples but the angle series has {}",
                target_diff.series_len(),
                angles.len()
            )));
        }
        for (idx, series) in target_diff.series().iter().enumerate() {
            if let Some(pos) = series.first_non_finite() {
                return Err(FitError::InvalidValue(format!(
                    "energy difference #{idx} has a non-finite value at sample {pos}"
                )));
            }
        }

        let mut design = DMatrix::<f64>::zeros(angles.len(), num_coefficients);
        let mut row = vec![0.0; num_coefficients];
        for (k, &angle) in angles.degrees().iter().enumerate() {
            fill_design_row(angle, &mut row);
            for (i, &v) in row.iter().enumerate() {
                design[(k, i)] = v;
            }
        }

        Ok(Self {
            target_diff,
            angles,
            num_coefficients,
            design,
        })
    }

    pub fn target_diff(&self) -> &EnergySeriesBatch {
        &self.target_diff
    }

    pub fn angles(&self) -> &AngleSeries {
        &self.angles
    }

    /// Total number of residuals (series × angles).
    pub fn residual_count(&self) -> usize {
        self.target_diff.len() * self.angles.len()
    }

    fn check_len(&self, coefficients: &[f64]) -> Result<(), FitError> {
        if coefficients.len() != self.num_coefficients {
            return Err(FitError::InvalidInput(format!(
                "expected {} coefficients, got {}",
                self.num_coefficients,
                coefficients.len()
            )));
        }
        Ok(())
    }
}

impl Objective for TorsionObjective {
    fn dimension(&self) -> usize {
        self.num_coefficients
    }

    fn residuals(&self, coefficients: &[f64]) -> Result<DVector<f64>, FitError> {
        self.check_len(coefficients)?;
        let profile = rb_profile(coefficients, &self.angles);
        if let Some(pos) = profile.iter().position(|e| !e.is_finite()) {
            return Err(FitError::InvalidValue(format!(
                "RB energy is not finite at {} degrees",
                self.angles.degrees()[pos]
            )));
        }

        let mut out = DVector::<f64>::zeros(self.residual_count());
        let mut idx = 0;
        for series in self.target_diff.series() {
            for (e_fit, e_diff) in profile.iter().zip(series.values()) {
                out[idx] = e_fit - e_diff;
                idx += 1;
            }
        }
        Ok(out)
    }

    fn value(&self, coefficients: &[f64]) -> Result<f64, FitError> {
        self.check_len(coefficients)?;
        let profile = EnergySeries::new(rb_profile(coefficients, &self.angles));
        let predicted = EnergySeriesBatch::new(vec![profile; self.target_diff.len()])?;
        rmsd_batch(&self.target_diff, &predicted)
    }

    /// The model is linear in the coefficients, so the Jacobian is the design matrix
    /// stacked once per series.
    fn jacobian(&self, coefficients: &[f64]) -> Result<DMatrix<f64>, FitError> {
        self.check_len(coefficients)?;
        let n_angles = self.angles.len();
        let mut jac = DMatrix::<f64>::zeros(self.residual_count(), self.num_coefficients);
        for s in 0..self.target_diff.len() {
            jac.view_mut((s * n_angles, 0), (n_angles, self.num_coefficients))
                .copy_from(&self.design);
        }
        Ok(jac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn synthetic(c_true: &[f64], copies: usize) -> TorsionObjective {
        let angles = AngleSeries::full_rotation_10deg();
        let series = EnergySeries::new(rb_profile(c_true, &angles));
        let batch = EnergySeriesBatch::new(vec![series; copies]).unwrap();
        TorsionObjective::new(batch, angles, c_true.len()).unwrap()
    }

    #[test]
    fn value_is_zero_at_true_coefficients() {
        let obj = synthetic(&[1.0, 2.0, 3.0, 4.0], 2);
        assert!(obj.value(&[1.0, 2.0, 3.0, 4.0]).unwrap() < 1e-12);
        assert!(obj.value(&[0.0, 0.0, 0.0, 0.0]).unwrap() > 1.0);
    }

    #[test]
    fn value_matches_rms_of_residuals() {
        let obj = synthetic(&[1.0, 2.0, 3.0, 4.0], 3);
        let c = [0.3, -1.0, 2.0, 0.5];
        let via_residuals = rms(obj.residuals(&c).unwrap().as_slice()).unwrap();
        assert!((obj.value(&c).unwrap() - via_residuals).abs() < 1e-12);
    }

    #[test]
    fn repeated_calls_do_not_change_state() {
        let obj = synthetic(&[1.0, -2.0, 0.5], 1);
        let c = [0.1, 0.2, 0.3];
        let first = obj.value(&c).unwrap();
        for _ in 0..1000 {
            obj.value(&[5.0, -5.0, 2.0]).unwrap();
        }
        assert_eq!(first.to_bits(), obj.value(&c).unwrap().to_bits());
    }

    #[test]
    fn analytic_jacobian_matches_finite_differences() {
        struct Numeric<'a>(&'a TorsionObjective);
        impl Objective for Numeric<'_> {
            fn dimension(&self) -> usize {
                self.0.dimension()
            }
            fn residuals(&self, c: &[f64]) -> Result<DVector<f64>, FitError> {
                self.0.residuals(c)
            }
        }

        let obj = synthetic(&[1.0, 2.0, 3.0, 4.0], 2);
        let c = [0.7, -0.2, 1.1, 3.0];
        let analytic = obj.jacobian(&c).unwrap();
        let numeric = Numeric(&obj).jacobian(&c).unwrap();
        assert_eq!(analytic.shape(), (72, 4));
        assert!((analytic - numeric).amax() < 1e-8);
    }

    #[test]
    fn wrong_coefficient_count_is_rejected() {
        let obj = synthetic(&[1.0, 2.0, 3.0, 4.0], 1);
        assert_eq!(obj.value(&[1.0, 2.0]).unwrap_err().kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn angle_count_must_match_series_length() {
        let batch = EnergySeriesBatch::single(EnergySeries::zeros(10));
        let err = TorsionObjective::new(batch, AngleSeries::full_rotation_10deg(), 4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn non_finite_difference_is_rejected() {
        let mut values = vec![0.0; 36];
        values[7] = f64::NAN;
        let batch = EnergySeriesBatch::single(EnergySeries::new(values));
        let err = TorsionObjective::new(batch, AngleSeries::full_rotation_10deg(), 4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }
}
