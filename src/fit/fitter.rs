//! The fitting driver.
//!
//! Given:
//! - a start batch (force-field energies without dihedral terms)
//! - a target batch (reference energies)
//! - the angle grid and the number of RB coefficients
//! - an optimizer strategy
//!
//! we compute `target - start` once, wrap it in a [`TorsionObjective`], run the chosen
//! optimizer and return the fitted coefficients.
//!
//! A [`FitJob`] moves through `Configured -> Running -> Completed` exactly once. All
//! input validation happens in [`FitJob::new`], so a job that exists is runnable.

use tracing::{info, instrument, warn};

use crate::domain::{AngleSeries, Bounds, EnergySeriesBatch, FitResult, Method};
use crate::error::FitError;
use crate::fit::differential_evolution::{DifferentialEvolutionOptimizer, DifferentialEvolutionOptions};
use crate::fit::least_squares::{LeastSquaresOptimizer, LeastSquaresOptions};
use crate::fit::objective::{Objective, TorsionObjective};
use crate::fit::optimizer::{OptimizeOutcome, Optimizer};

/// Which optimizer runs, with the parameters that optimizer needs.
#[derive(Debug, Clone, PartialEq)]
pub enum FitStrategy {
    /// Local refinement from a point guess (`None` starts from all zeros).
    LeastSquares {
        initial_guess: Option<Vec<f64>>,
        options: LeastSquaresOptions,
    },
    /// Global search inside one `Bounds` per coefficient. Takes no point guess.
    DifferentialEvolution {
        bounds: Vec<Bounds>,
        options: DifferentialEvolutionOptions,
    },
}

impl FitStrategy {
    pub fn least_squares(initial_guess: Option<Vec<f64>>) -> Self {
        FitStrategy::LeastSquares {
            initial_guess,
            options: LeastSquaresOptions::default(),
        }
    }

    pub fn differential_evolution(bounds: Vec<Bounds>) -> Self {
        FitStrategy::DifferentialEvolution {
            bounds,
            options: DifferentialEvolutionOptions::default(),
        }
    }

    pub fn method(&self) -> Method {
        match self {
            FitStrategy::LeastSquares { .. } => Method::LeastSquares,
            FitStrategy::DifferentialEvolution { .. } => Method::DifferentialEvolution,
        }
    }

    fn validate(&self, num_coefficients: usize) -> Result<(), FitError> {
        match self {
            FitStrategy::LeastSquares {
                initial_guess,
                options,
            } => {
                if let Some(guess) = initial_guess {
                    if guess.len() != num_coefficients {
                        return Err(FitError::InvalidInput(format!(
                            "initial guess has {} values but {num_coefficients} coefficients were requested",
                            guess.len()
                        )));
                    }
                    if let Some(pos) = guess.iter().position(|v| !v.is_finite()) {
                        return Err(FitError::InvalidValue(format!(
                            "initial guess value #{pos} is not finite"
                        )));
                    }
                }
                options.validate()
            }
            FitStrategy::DifferentialEvolution { bounds, options } => {
                if bounds.len() != num_coefficients {
                    return Err(FitError::InvalidInput(format!(
                        "{} bounds given but {num_coefficients} coefficients were requested",
                        bounds.len()
                    )));
                }
                for b in bounds {
                    b.validate()?;
                }
                options.validate()
            }
        }
    }
}

/// Lifecycle of one fit.
#[derive(Debug, Clone, PartialEq)]
pub enum FitState {
    /// Inputs validated, optimizer not started.
    Configured,
    /// Optimizer iterating.
    Running,
    Converged(FitResult),
    Failed(FitError),
}

impl FitState {
    pub fn is_completed(&self) -> bool {
        matches!(self, FitState::Converged(_) | FitState::Failed(_))
    }
}

/// One validated, one-shot fit.
#[derive(Debug, Clone)]
pub struct FitJob {
    objective: TorsionObjective,
    strategy: FitStrategy,
    state: FitState,
}

impl FitJob {
    /// Validate inputs and build the objective. No optimizer work happens here.
    pub fn new(
        start: &EnergySeriesBatch,
        target: &EnergySeriesBatch,
        num_coefficients: usize,
        angles: &AngleSeries,
        strategy: FitStrategy,
    ) -> Result<Self, FitError> {
        check_batch("start", start, angles)?;
        check_batch("target", target, angles)?;
        let diff = EnergySeriesBatch::difference(target, start)?;
        Self::from_difference(diff, num_coefficients, angles, strategy)
    }

    /// Build a job from an already computed `target - start` batch.
    pub fn from_difference(
        diff: EnergySeriesBatch,
        num_coefficients: usize,
        angles: &AngleSeries,
        strategy: FitStrategy,
    ) -> Result<Self, FitError> {
        if num_coefficients == 0 {
            return Err(FitError::InvalidInput(
                "number of RB coefficients must be positive".to_string(),
            ));
        }
        if angles.is_empty() {
            return Err(FitError::InvalidInput("angle series is empty".to_string()));
        }
        check_batch("difference", &diff, angles)?;
        strategy.validate(num_coefficients)?;

        let objective = TorsionObjective::new(diff, angles.clone(), num_coefficients)?;

        Ok(Self {
            objective,
            strategy,
            state: FitState::Configured,
        })
    }

    pub fn state(&self) -> &FitState {
        &self.state
    }

    pub fn strategy(&self) -> &FitStrategy {
        &self.strategy
    }

    pub fn objective(&self) -> &TorsionObjective {
        &self.objective
    }

    /// Run the optimizer. A completed job returns its stored outcome without re-running.
    #[instrument(skip_all, name = "fit", fields(method = self.strategy.method().display_name()))]
    pub fn run(&mut self) -> Result<FitResult, FitError> {
        match &self.state {
            FitState::Converged(result) => return Ok(result.clone()),
            FitState::Failed(err) => return Err(err.clone()),
            FitState::Configured | FitState::Running => {}
        }

        info!(
            coefficients = self.objective.dimension(),
            series = self.objective.target_diff().len(),
            angles = self.objective.angles().len(),
            "Starting RB coefficient fit."
        );
        self.state = FitState::Running;

        let method = self.strategy.method();
        let outcome = match &self.strategy {
            FitStrategy::LeastSquares {
                initial_guess,
                options,
            } => {
                let guess = initial_guess
                    .clone()
                    .unwrap_or_else(|| vec![0.0; self.objective.dimension()]);
                LeastSquaresOptimizer::new(options.clone()).minimize(&self.objective, &guess)
            }
            FitStrategy::DifferentialEvolution { bounds, options } => {
                DifferentialEvolutionOptimizer::new(options.clone()).minimize(&self.objective, bounds)
            }
        };

        let result = outcome.map(|o| to_fit_result(o, method));
        match &result {
            Ok(fit) => {
                info!(
                    deviation = fit.deviation,
                    iterations = fit.iterations,
                    evaluations = fit.evaluations,
                    "Fit converged: {}.",
                    fit.termination.describe()
                );
                self.state = FitState::Converged(fit.clone());
            }
            Err(err) => {
                warn!("Fit failed: {err}");
                self.state = FitState::Failed(err.clone());
            }
        }
        result
    }
}

/// Fit with least squares from `initial_guess` (zeros when `None`).
pub fn fit(
    start: &EnergySeriesBatch,
    target: &EnergySeriesBatch,
    num_coefficients: usize,
    angles: &AngleSeries,
    initial_guess: Option<&[f64]>,
) -> Result<FitResult, FitError> {
    let strategy = FitStrategy::least_squares(initial_guess.map(<[f64]>::to_vec));
    fit_with_strategy(start, target, num_coefficients, angles, strategy)
}

pub fn fit_with_strategy(
    start: &EnergySeriesBatch,
    target: &EnergySeriesBatch,
    num_coefficients: usize,
    angles: &AngleSeries,
    strategy: FitStrategy,
) -> Result<FitResult, FitError> {
    FitJob::new(start, target, num_coefficients, angles, strategy)?.run()
}

fn check_batch(label: &str, batch: &EnergySeriesBatch, angles: &AngleSeries) -> Result<(), FitError> {
    if batch.series_len() != angles.len() {
        return Err(FitError::InvalidInput(format!(
            "{label} energies have {} samples per series but there are {} angles",
            batch.series_len(),
            angles.len()
        )));
    }
    for (idx, series) in batch.series().iter().enumerate() {
        if let Some(pos) = series.first_non_finite() {
            return Err(FitError::InvalidValue(format!(
                "{label} series #{idx} has a non-finite energy at sample {pos}"
            )));
        }
    }
    Ok(())
}

fn to_fit_result(outcome: OptimizeOutcome, method: Method) -> FitResult {
    FitResult {
        coefficients: outcome.x,
        deviation: outcome.value,
        method,
        iterations: outcome.iterations,
        evaluations: outcome.evaluations,
        termination: outcome.termination,
    }
}
