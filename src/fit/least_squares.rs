//! Local least-squares refinement (Levenberg-Marquardt).
//!
//! The iteration itself is the MINPACK port in the `levenberg-marquardt` crate; this
//! module adapts any [`Objective`] to its [`LeastSquaresProblem`] and maps the
//! crate's termination report onto [`Termination`] or [`FitError`].
//!
//! The result depends only on the starting point and the tolerances: the same guess
//! always yields the same vector.

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use nalgebra::storage::Owned;
use nalgebra::{DMatrix, DVector, Dyn};
use tracing::{debug, instrument};

use crate::domain::{Method, Termination};
use crate::error::FitError;
use crate::fit::objective::Objective;
use crate::fit::optimizer::{OptimizeOutcome, Optimizer};

const METHOD: &str = "least-squares";

#[derive(Debug, Clone, PartialEq)]
pub struct LeastSquaresOptions {
    /// Budget in units of `n + 1` residual evaluations (MINPACK "patience").
    pub max_iterations: usize,
    /// Stop when both the actual and predicted relative cost reductions are below `ftol`.
    pub ftol: f64,
    /// Stop when the relative step size falls below `xtol`.
    pub xtol: f64,
    /// Stop when the residuals are orthogonal to every Jacobian column up to `gtol`.
    pub gtol: f64,
    /// Initial trust-region radius factor.
    pub stepbound: f64,
}

impl Default for LeastSquaresOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-10,
            stepbound: 100.0,
        }
    }
}

impl LeastSquaresOptions {
    pub fn validate(&self) -> Result<(), FitError> {
        if self.max_iterations == 0 {
            return Err(FitError::InvalidInput(
                "least-squares max_iterations must be > 0".to_string(),
            ));
        }
        for (name, v) in [("ftol", self.ftol), ("xtol", self.xtol), ("gtol", self.gtol)] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(FitError::InvalidInput(format!(
                    "least-squares {name} must be finite and >= 0 (got {v})"
                )));
            }
        }
        if !(self.stepbound.is_finite() && self.stepbound > 0.0) {
            return Err(FitError::InvalidInput(format!(
                "least-squares stepbound must be finite and > 0 (got {})",
                self.stepbound
            )));
        }
        Ok(())
    }

    fn solver(&self) -> LevenbergMarquardt<f64> {
        LevenbergMarquardt::new()
            .with_ftol(self.ftol)
            .with_xtol(self.xtol)
            .with_gtol(self.gtol)
            .with_stepbound(self.stepbound)
            .with_patience(self.max_iterations)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LeastSquaresOptimizer {
    options: LeastSquaresOptions,
}

impl LeastSquaresOptimizer {
    pub fn new(options: LeastSquaresOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &LeastSquaresOptions {
        &self.options
    }
}

/// An [`Objective`] plus the parameter vector the solver is currently probing.
struct ObjectiveProblem<'a, O> {
    objective: &'a O,
    params: DVector<f64>,
}

impl<O> Clone for ObjectiveProblem<'_, O> {
    fn clone(&self) -> Self {
        Self {
            objective: self.objective,
            params: self.params.clone(),
        }
    }
}

impl<O: Objective> LeastSquaresProblem<f64, Dyn, Dyn> for ObjectiveProblem<'_, O> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.params.copy_from(x);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    // `None` tells the solver the point is unusable; it then stops with `User`.
    fn residuals(&self) -> Option<DVector<f64>> {
        self.objective.residuals(self.params.as_slice()).ok()
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        self.objective.jacobian(self.params.as_slice()).ok()
    }
}

impl Optimizer for LeastSquaresOptimizer {
    type Start = [f64];

    fn method(&self) -> Method {
        Method::LeastSquares
    }

    #[instrument(skip_all, name = "least_squares", fields(n = start.len()))]
    fn minimize<O: Objective>(
        &self,
        objective: &O,
        start: &[f64],
    ) -> Result<OptimizeOutcome, FitError> {
        let opts = &self.options;
        opts.validate()?;

        let n = objective.dimension();
        if start.len() != n {
            return Err(FitError::InvalidInput(format!(
                "initial guess has {} coefficients, expected {n}",
                start.len()
            )));
        }
        if let Some(pos) = start.iter().position(|v| !v.is_finite()) {
            return Err(FitError::InvalidValue(format!(
                "initial guess coefficient #{pos} is not finite"
            )));
        }
        // A start point the objective rejects keeps its own error kind.
        let r0 = objective.residuals(start)?;
        debug!(residuals = r0.len(), cost = 0.5 * r0.norm_squared(), "Starting Levenberg-Marquardt.");

        let problem = ObjectiveProblem {
            objective,
            params: DVector::from_column_slice(start),
        };
        let (problem, report) = opts.solver().minimize(problem);
        let evaluations = report.number_of_evaluations;

        let termination = match report.termination {
            TerminationReason::ResidualsZero => Termination::ResidualsZero,
            TerminationReason::Orthogonal => Termination::GradientTolerance,
            TerminationReason::Converged { ftol: true, .. } => Termination::CostTolerance,
            TerminationReason::Converged { .. } => Termination::StepTolerance,
            TerminationReason::LostPatience => {
                return Err(FitError::ConvergenceFailure {
                    method: METHOD,
                    iterations: evaluations,
                    reason: format!(
                        "iteration budget exhausted (cost={:e})",
                        report.objective_function
                    ),
                });
            }
            TerminationReason::NoParameters
            | TerminationReason::NoResiduals
            | TerminationReason::WrongDimensions(_) => {
                return Err(FitError::InvalidInput(format!(
                    "least-squares problem is malformed: {:?}",
                    report.termination
                )));
            }
            other => {
                return Err(FitError::ConvergenceFailure {
                    method: METHOD,
                    iterations: evaluations,
                    reason: format!("solver stopped: {other:?}"),
                });
            }
        };

        let x: Vec<f64> = problem.params.iter().copied().collect();
        let value = objective.value(&x)?;
        debug!(
            evaluations,
            value,
            reason = termination.describe(),
            "Least-squares converged."
        );
        Ok(OptimizeOutcome {
            x,
            value,
            // The solver counts residual evaluations only.
            iterations: evaluations,
            evaluations,
            termination,
        })
    }
}
