//! The optimizer interface.
//!
//! Each optimizer declares its own start parameter type: a point guess for local
//! least squares, a box of bounds for differential evolution. Callers cannot hand
//! a guess to a solver that needs bounds (or the other way round).

use crate::domain::{Method, Termination};
use crate::error::FitError;
use crate::fit::objective::Objective;

/// What an optimizer returns on success.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeOutcome {
    pub x: Vec<f64>,
    /// Objective value at `x`.
    pub value: f64,
    pub iterations: usize,
    /// Number of objective (residual) evaluations, Jacobians excluded.
    pub evaluations: usize,
    pub termination: Termination,
}

pub trait Optimizer {
    /// Starting information the search needs.
    type Start: ?Sized;

    fn method(&self) -> Method;

    /// Minimize `objective`, returning the best coefficients found.
    ///
    /// Stopping without meeting a convergence criterion is an error
    /// ([`FitError::ConvergenceFailure`]), never a silently returned vector.
    fn minimize<O: Objective>(
        &self,
        objective: &O,
        start: &Self::Start,
    ) -> Result<OptimizeOutcome, FitError>;
}
