//! Shared domain types.
//!
//! These types are intentionally small value types. They are built once per fit by
//! the caller and then only read:
//!
//! - angle grids (`AngleSeries`), always in degrees
//! - energy profiles (`EnergySeries`) and batches of them (`EnergySeriesBatch`)
//! - search boxes for global optimizers (`Bounds`)
//! - fit outputs (`FitResult`)

use std::str::FromStr;

use clap::ValueEnum;
use serde::Deserialize;

use crate::error::FitError;

/// Ordered dihedral angles in degrees.
///
/// Non-empty and finite by construction.
#[derive(Debug, Clone, PartialEq)]
pub struct AngleSeries {
    degrees: Vec<f64>,
}

impl AngleSeries {
    pub fn from_degrees(degrees: Vec<f64>) -> Result<Self, FitError> {
        if degrees.is_empty() {
            return Err(FitError::InvalidInput("angle series is empty".to_string()));
        }
        if let Some(pos) = degrees.iter().position(|a| !a.is_finite()) {
            return Err(FitError::InvalidValue(format!(
                "angle #{pos} is not finite ({})",
                degrees[pos]
            )));
        }
        Ok(Self { degrees })
    }

    /// `count` angles starting at `start` and spaced by `step` degrees.
    pub fn uniform(start: f64, step: f64, count: usize) -> Result<Self, FitError> {
        if !(start.is_finite() && step.is_finite()) {
            return Err(FitError::InvalidValue(format!(
                "angle grid start={start}, step={step} must be finite"
            )));
        }
        let degrees = (0..count).map(|i| start + step * i as f64).collect();
        Self::from_degrees(degrees)
    }

    /// The usual torsion scan grid: 0, 10, ..., 350 degrees.
    pub fn full_rotation_10deg() -> Self {
        Self {
            degrees: (0..36).map(|i| 10.0 * i as f64).collect(),
        }
    }

    pub fn degrees(&self) -> &[f64] {
        &self.degrees
    }

    pub fn len(&self) -> usize {
        self.degrees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.degrees.is_empty()
    }
}

/// Energies sampled at the angles of a matching [`AngleSeries`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnergySeries {
    values: Vec<f64>,
}

impl EnergySeries {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn zeros(len: usize) -> Self {
        Self {
            values: vec![0.0; len],
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Index of the first non-finite value, if any.
    pub fn first_non_finite(&self) -> Option<usize> {
        self.values.iter().position(|v| !v.is_finite())
    }

    /// Subtract the series minimum so the lowest sample sits at zero.
    ///
    /// Force-field scans carry an arbitrary absolute offset; only relative energies
    /// along the torsion are meaningful.
    pub fn shifted_to_zero(&self) -> Self {
        let min = self.values.iter().copied().fold(f64::INFINITY, f64::min);
        if !min.is_finite() {
            return self.clone();
        }
        Self {
            values: self.values.iter().map(|v| v - min).collect(),
        }
    }
}

impl From<Vec<f64>> for EnergySeries {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

/// Several energy profiles of equal length, fitted together.
///
/// Each member is typically one conformer (or one torsion instance) scanned over
/// the same angle grid.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergySeriesBatch {
    series: Vec<EnergySeries>,
}

impl EnergySeriesBatch {
    pub fn new(series: Vec<EnergySeries>) -> Result<Self, FitError> {
        let Some(first) = series.first() else {
            return Err(FitError::InvalidInput("energy batch is empty".to_string()));
        };
        let len = first.len();
        if let Some(pos) = series.iter().position(|s| s.len() != len) {
            return Err(FitError::InvalidInput(format!(
                "energy series #{pos} has {} samples, expected {len}",
                series[pos].len()
            )));
        }
        Ok(Self { series })
    }

    pub fn single(series: EnergySeries) -> Self {
        Self {
            series: vec![series],
        }
    }

    pub fn series(&self) -> &[EnergySeries] {
        &self.series
    }

    /// Number of member series.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Length shared by every member series.
    pub fn series_len(&self) -> usize {
        self.series.first().map_or(0, EnergySeries::len)
    }

    /// All values, series after series.
    pub fn flat_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.series.iter().flat_map(|s| s.values().iter().copied())
    }

    pub fn shifted_to_zero(&self) -> Self {
        Self {
            series: self.series.iter().map(EnergySeries::shifted_to_zero).collect(),
        }
    }

    /// Elementwise `target - start`, matching series by position and samples by angle.
    pub fn difference(target: &Self, start: &Self) -> Result<Self, FitError> {
        if target.len() != start.len() {
            return Err(FitError::InvalidInput(format!(
                "target batch has {} series but start batch has {}",
                target.len(),
                start.len()
            )));
        }
        if target.series_len() != start.series_len() {
            return Err(FitError::InvalidInput(format!(
                "target series have {} samples but start series have {}",
                target.series_len(),
                start.series_len()
            )));
        }

        let series = target
            .series
            .iter()
            .zip(&start.series)
            .map(|(t, s)| {
                EnergySeries::new(
                    t.values()
                        .iter()
                        .zip(s.values())
                        .map(|(a, b)| a - b)
                        .collect(),
                )
            })
            .collect();
        Ok(Self { series })
    }
}

/// Closed search interval for one coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Result<Self, FitError> {
        let bounds = Self { min, max };
        bounds.validate()?;
        Ok(bounds)
    }

    pub fn validate(&self) -> Result<(), FitError> {
        if !(self.min.is_finite() && self.max.is_finite()) {
            return Err(FitError::InvalidInput(format!(
                "bounds [{}, {}] must be finite",
                self.min, self.max
            )));
        }
        if self.min >= self.max {
            return Err(FitError::InvalidInput(format!(
                "bounds [{}, {}] must satisfy min < max",
                self.min, self.max
            )));
        }
        Ok(())
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.min && x <= self.max
    }
}

/// Parses `MIN:MAX`, e.g. `-50:50`.
impl FromStr for Bounds {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((lo, hi)) = s.split_once(':') else {
            return Err(format!("expected MIN:MAX, got '{s}'"));
        };
        let min: f64 = lo
            .trim()
            .parse()
            .map_err(|_| format!("invalid lower bound '{lo}'"))?;
        let max: f64 = hi
            .trim()
            .parse()
            .map_err(|_| format!("invalid upper bound '{hi}'"))?;
        Bounds::new(min, max).map_err(|e| e.to_string())
    }
}

/// Which optimizer runs the fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
pub enum Method {
    /// Local Levenberg-Marquardt least-squares refinement from a point guess.
    #[serde(rename = "lsq")]
    #[value(name = "lsq")]
    LeastSquares,
    /// Global differential-evolution search inside per-coefficient bounds.
    #[serde(rename = "de")]
    #[value(name = "de")]
    DifferentialEvolution,
}

impl Method {
    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            Method::LeastSquares => "least-squares",
            Method::DifferentialEvolution => "differential-evolution",
        }
    }
}

/// Why an optimizer stopped successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Residuals are orthogonal to the Jacobian columns up to `gtol`.
    GradientTolerance,
    /// Residuals are exactly zero.
    ResidualsZero,
    /// Relative cost reduction fell below `ftol`.
    CostTolerance,
    /// Relative step size fell below `xtol`.
    StepTolerance,
    /// Population energies collapsed below the spread tolerance.
    PopulationSpread,
}

impl Termination {
    pub fn describe(self) -> &'static str {
        match self {
            Termination::GradientTolerance => "gradient tolerance reached",
            Termination::ResidualsZero => "residuals are zero",
            Termination::CostTolerance => "cost reduction below tolerance",
            Termination::StepTolerance => "step size below tolerance",
            Termination::PopulationSpread => "population spread below tolerance",
        }
    }
}

/// Fitted RB coefficients and how they were obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    /// `C0..C{N-1}` of `E(φ) = Σ C_i cos(φ)^i`.
    pub coefficients: Vec<f64>,
    /// RMSD between the target energy difference and the fitted RB profile.
    pub deviation: f64,
    pub method: Method,
    pub iterations: usize,
    pub evaluations: usize,
    pub termination: Termination,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn uniform_grid_matches_torsion_scan() {
        let angles = AngleSeries::uniform(0.0, 10.0, 36).unwrap();
        assert_eq!(angles, AngleSeries::full_rotation_10deg());
        assert_eq!(angles.degrees()[35], 350.0);
    }

    #[test]
    fn empty_or_non_finite_angles_are_rejected() {
        let err = AngleSeries::from_degrees(vec![]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let err = AngleSeries::from_degrees(vec![0.0, f64::NAN]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn shifted_to_zero_moves_minimum_to_zero() {
        let s = EnergySeries::new(vec![5.0, 3.0, 7.5]).shifted_to_zero();
        assert_eq!(s.values(), &[2.0, 0.0, 4.5]);
    }

    #[test]
    fn batch_requires_equal_lengths() {
        let err = EnergySeriesBatch::new(vec![
            EnergySeries::new(vec![1.0, 2.0]),
            EnergySeries::new(vec![1.0]),
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn difference_is_target_minus_start() {
        let target = EnergySeriesBatch::single(EnergySeries::new(vec![3.0, 4.0]));
        let start = EnergySeriesBatch::single(EnergySeries::new(vec![1.0, 5.0]));
        let diff = EnergySeriesBatch::difference(&target, &start).unwrap();
        assert_eq!(diff.series()[0].values(), &[2.0, -1.0]);
    }

    #[test]
    fn difference_rejects_batch_size_mismatch() {
        let target = EnergySeriesBatch::new(vec![EnergySeries::zeros(3), EnergySeries::zeros(3)]).unwrap();
        let start = EnergySeriesBatch::single(EnergySeries::zeros(3));
        let err = EnergySeriesBatch::difference(&target, &start).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn bounds_parse_from_colon_pair() {
        let b: Bounds = "-50:50".parse().unwrap();
        assert_eq!(b, Bounds { min: -50.0, max: 50.0 });
        assert!("5:1".parse::<Bounds>().is_err());
        assert!("abc".parse::<Bounds>().is_err());
    }
}
