//! Ryckaert-Bellemans torsion energy.
//!
//! ```text
//! E(φ) = Σ_{i=0}^{N-1} C_i cos(φ)^i
//! ```
//!
//! The fitter relies on two primitive operations:
//! - predict `E(φ)` given coefficients (objective, reports)
//! - build a design row `[1, cos φ, cos² φ, ...]` (the Jacobian of `E` w.r.t. `C`)
//!
//! Angles are in degrees at this boundary; conversion to radians happens here and
//! nowhere else.

use crate::domain::AngleSeries;

/// Evaluate the RB polynomial at one angle (degrees).
///
/// Uses Horner's scheme, so `[c0, 0, 0, ...]` returns exactly `c0`.
pub fn rb_energy(coefficients: &[f64], angle_deg: f64) -> f64 {
    let x = angle_deg.to_radians().cos();
    coefficients.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

/// Evaluate the RB polynomial over every angle of the series.
pub fn rb_profile(coefficients: &[f64], angles: &AngleSeries) -> Vec<f64> {
    angles
        .degrees()
        .iter()
        .map(|&a| rb_energy(coefficients, a))
        .collect()
}

/// Fill `out[i] = cos(φ)^i` for `i = 0..out.len()`.
pub fn fill_design_row(angle_deg: f64, out: &mut [f64]) {
    let x = angle_deg.to_radians().cos();
    let mut power = 1.0;
    for slot in out.iter_mut() {
        *slot = power;
        power *= x;
    }
}
