//! Root-mean-square deviation between energy profiles.
//!
//! For batches, every sample of every series is pooled and a single RMSD is taken
//! over the pooled residuals:
//!
//! ```text
//! rmsd = sqrt( Σ_s Σ_k (a_sk - b_sk)^2 / Σ_s n_s )
//! ```
//!
//! Longer series therefore carry proportionally more weight than a plain average of
//! per-series RMSDs would give them.

use crate::domain::{EnergySeries, EnergySeriesBatch};
use crate::error::FitError;

/// RMSD between two equally long slices.
pub fn rmsd(a: &[f64], b: &[f64]) -> Result<f64, FitError> {
    if a.len() != b.len() {
        return Err(FitError::ShapeMismatch(format!(
            "cannot compare {} values with {} values",
            a.len(),
            b.len()
        )));
    }
    let (sum_sq, n) = accumulate(a.iter().copied().zip(b.iter().copied()))?;
    finish(sum_sq, n)
}

/// RMSD between two energy series.
pub fn rmsd_series(a: &EnergySeries, b: &EnergySeries) -> Result<f64, FitError> {
    rmsd(a.values(), b.values())
}

/// RMSD over a whole batch, pooling all samples.
pub fn rmsd_batch(a: &EnergySeriesBatch, b: &EnergySeriesBatch) -> Result<f64, FitError> {
    if a.len() != b.len() {
        return Err(FitError::ShapeMismatch(format!(
            "cannot compare a batch of {} series with a batch of {}",
            a.len(),
            b.len()
        )));
    }
    for (idx, (sa, sb)) in a.series().iter().zip(b.series()).enumerate() {
        if sa.len() != sb.len() {
            return Err(FitError::ShapeMismatch(format!(
                "series #{idx}: {} samples vs {} samples",
                sa.len(),
                sb.len()
            )));
        }
    }
    let (sum_sq, n) = accumulate(a.flat_values().zip(b.flat_values()))?;
    finish(sum_sq, n)
}

/// RMSD of a residual vector against zero.
pub fn rms(residuals: &[f64]) -> Result<f64, FitError> {
    let (sum_sq, n) = accumulate(residuals.iter().map(|&r| (r, 0.0)))?;
    finish(sum_sq, n)
}

fn accumulate(pairs: impl Iterator<Item = (f64, f64)>) -> Result<(f64, usize), FitError> {
    let mut sum_sq = 0.0;
    let mut n = 0usize;
    for (x, y) in pairs {
        if !(x.is_finite() && y.is_finite()) {
            return Err(FitError::InvalidValue(format!(
                "non-finite value at position {n} ({x} vs {y})"
            )));
        }
        let d = x - y;
        sum_sq += d * d;
        n += 1;
    }
    Ok((sum_sq, n))
}

fn finish(sum_sq: f64, n: usize) -> Result<f64, FitError> {
    if n == 0 {
        return Err(FitError::ShapeMismatch(
            "cannot compute RMSD of empty collections".to_string(),
        ));
    }
    let value = (sum_sq / n as f64).sqrt();
    if !value.is_finite() {
        return Err(FitError::InvalidValue(format!(
            "RMSD overflowed (sum of squares {sum_sq})"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn batch(series: &[&[f64]]) -> EnergySeriesBatch {
        EnergySeriesBatch::new(series.iter().map(|s| EnergySeries::new(s.to_vec())).collect()).unwrap()
    }

    #[test]
    fn self_comparison_is_zero() {
        let x = batch(&[&[1.0, -2.0, 3.5], &[0.0, 4.0, 9.0]]);
        assert_eq!(rmsd_batch(&x, &x).unwrap(), 0.0);
    }

    #[test]
    fn metric_is_symmetric() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [0.5, 2.5, 1.0, 7.0];
        assert_eq!(rmsd(&a, &b).unwrap(), rmsd(&b, &a).unwrap());
    }

    #[test]
    fn simple_value() {
        // differences 3 and 4 -> sqrt((9 + 16) / 2)
        let v = rmsd(&[3.0, 4.0], &[0.0, 0.0]).unwrap();
        assert!((v - (12.5f64).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn batch_pools_samples_instead_of_averaging() {
        // Series 1 matches exactly; series 2 is off by 2 everywhere.
        let a = batch(&[&[0.0, 0.0], &[2.0, 2.0]]);
        let b = batch(&[&[0.0, 0.0], &[0.0, 0.0]]);
        let pooled = rmsd_batch(&a, &b).unwrap();
        assert!((pooled - (8.0f64 / 4.0).sqrt()).abs() < 1e-12);
        // An average of per-series RMSDs would give (0 + 2) / 2 = 1.
        assert!((pooled - 1.0).abs() > 1e-6);
    }

    #[test]
    fn batch_size_mismatch_is_reported() {
        let a = batch(&[&[1.0, 2.0], &[1.0, 2.0]]);
        let b = batch(&[&[1.0, 2.0]]);
        let err = rmsd_batch(&a, &b).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
    }

    #[test]
    fn series_length_mismatch_is_reported() {
        let a = batch(&[&[1.0, 2.0, 3.0]]);
        let b = batch(&[&[1.0, 2.0]]);
        assert_eq!(rmsd_batch(&a, &b).unwrap_err().kind(), ErrorKind::ShapeMismatch);
        assert_eq!(rmsd(&[1.0], &[]).unwrap_err().kind(), ErrorKind::ShapeMismatch);
    }

    #[test]
    fn non_finite_values_fail_fast() {
        let err = rmsd(&[1.0, f64::NAN], &[1.0, 2.0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        let err = rms(&[f64::INFINITY]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }
}
