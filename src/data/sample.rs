//! Synthetic torsion scans with a known RB answer.
//!
//! Each generated scan pairs a smooth "force field without dihedrals" baseline with a
//! target built as `baseline + RB(c_true) + noise`, so fitting the pair should give
//! back `c_true` (exactly when `noise_sigma = 0`).

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{AngleSeries, Bounds, EnergySeries, EnergySeriesBatch};
use crate::error::AppError;
use crate::models::rb_profile;

#[derive(Debug, Clone)]
pub struct SampleOptions {
    /// Coefficients the target is built from.
    pub coefficients: Vec<f64>,
    /// Standard deviation of Gaussian noise added to every target sample.
    pub noise_sigma: f64,
    /// Number of conformers (series) in the batch.
    pub conformers: usize,
    pub seed: u64,
}

#[derive(Debug, Clone)]
pub struct SampleScan {
    pub angles: AngleSeries,
    pub start: EnergySeriesBatch,
    pub target: EnergySeriesBatch,
    pub coefficients: Vec<f64>,
}

pub fn generate_scan(angles: &AngleSeries, opts: &SampleOptions) -> Result<SampleScan, AppError> {
    if opts.coefficients.is_empty() {
        return Err(AppError::new(2, "Sample coefficients must not be empty."));
    }
    if opts.conformers == 0 {
        return Err(AppError::new(2, "Sample conformer count must be > 0."));
    }
    if !(opts.noise_sigma.is_finite() && opts.noise_sigma >= 0.0) {
        return Err(AppError::new(
            2,
            format!("Invalid noise sigma {} (must be finite and >= 0).", opts.noise_sigma),
        ));
    }

    let mut rng = StdRng::seed_from_u64(opts.seed);
    let normal = Normal::new(0.0, opts.noise_sigma.max(f64::MIN_POSITIVE))
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let dihedral = rb_profile(&opts.coefficients, angles);
    let mut starts = Vec::with_capacity(opts.conformers);
    let mut targets = Vec::with_capacity(opts.conformers);

    for _ in 0..opts.conformers {
        // Baseline: offset plus one slow sine, phase-shifted per conformer.
        let offset = rng.gen_range(-20.0..20.0);
        let amplitude = rng.gen_range(0.5..5.0);
        let phase = rng.gen_range(0.0..360.0_f64);

        let baseline: Vec<f64> = angles
            .degrees()
            .iter()
            .map(|a| offset + amplitude * (a + phase).to_radians().sin())
            .collect();
        let target: Vec<f64> = baseline
            .iter()
            .zip(&dihedral)
            .map(|(b, d)| {
                let noise = if opts.noise_sigma > 0.0 { normal.sample(&mut rng) } else { 0.0 };
                b + d + noise
            })
            .collect();

        starts.push(EnergySeries::new(baseline));
        targets.push(EnergySeries::new(target));
    }

    let start = EnergySeriesBatch::new(starts).map_err(|e| AppError::new(4, e.to_string()))?;
    let target = EnergySeriesBatch::new(targets).map_err(|e| AppError::new(4, e.to_string()))?;

    Ok(SampleScan {
        angles: angles.clone(),
        start,
        target,
        coefficients: opts.coefficients.clone(),
    })
}

/// Random starting point with one coefficient drawn from each box.
///
/// Boxes that contain an integer give an integer draw; narrower boxes fall back
/// to a uniform real draw.
pub fn random_guess(bounds: &[Bounds], seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    bounds
        .iter()
        .map(|b| {
            let lo = b.min.ceil();
            let hi = b.max.floor();
            if lo <= hi {
                rng.gen_range(lo as i64..=hi as i64) as f64
            } else {
                rng.gen_range(b.min..=b.max)
            }
        })
        .collect()
}
