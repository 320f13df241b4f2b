//! Global search by differential evolution (DE/best/1/bin).
//!
//! Unlike the least-squares refinement this needs no starting point, only a search
//! box: one [`Bounds`] per coefficient. The population is seeded by Latin hypercube
//! sampling inside the box, then every generation:
//!
//! - draws one mutation factor `F` from the dither range
//! - builds a trial vector per member: `best + F (x_r1 - x_r2)`, binomially crossed
//!   with the member, components outside the box resampled uniformly inside it
//! - evaluates all trial vectors (parallel)
//! - keeps each trial that is no worse than the member it challenges
//!
//! All random draws for a generation happen before its evaluations, so a fixed seed
//! gives the same result regardless of thread count.
//!
//! The search stops once the population energies have collapsed:
//! `std(E) <= atol + tol * |mean(E)|`. The best member can then be polished with the
//! least-squares refinement.

use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;
use tracing::{debug, info, instrument, trace};

use crate::domain::{Bounds, Method, Termination};
use crate::error::FitError;
use crate::fit::least_squares::{LeastSquaresOptimizer, LeastSquaresOptions};
use crate::fit::objective::Objective;
use crate::fit::optimizer::{OptimizeOutcome, Optimizer};

const METHOD: &str = "differential-evolution";

/// Smallest population that still leaves two distinct donors per member.
const MIN_POPULATION: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct DifferentialEvolutionOptions {
    /// Population size is `population_factor × dimension` (at least 5).
    pub population_factor: usize,
    pub max_generations: usize,
    /// Dither range for the mutation factor `F`, redrawn every generation.
    pub mutation: (f64, f64),
    /// Crossover probability.
    pub recombination: f64,
    /// Relative tolerance on the population energy spread.
    pub tol: f64,
    /// Absolute tolerance on the population energy spread.
    pub atol: f64,
    /// `None` draws a seed from the OS.
    pub seed: Option<u64>,
    /// Refine the best member with least squares once the population has converged.
    pub polish: bool,
    pub polish_options: LeastSquaresOptions,
}

impl Default for DifferentialEvolutionOptions {
    fn default() -> Self {
        Self {
            population_factor: 15,
            max_generations: 1000,
            mutation: (0.5, 1.0),
            recombination: 0.7,
            tol: 0.01,
            atol: 1e-8,
            seed: None,
            polish: true,
            polish_options: LeastSquaresOptions::default(),
        }
    }
}

impl DifferentialEvolutionOptions {
    pub fn validate(&self) -> Result<(), FitError> {
        if self.population_factor == 0 {
            return Err(FitError::InvalidInput(
                "differential-evolution population_factor must be > 0".to_string(),
            ));
        }
        if self.max_generations == 0 {
            return Err(FitError::InvalidInput(
                "differential-evolution max_generations must be > 0".to_string(),
            ));
        }
        let (lo, hi) = self.mutation;
        if !(lo.is_finite() && hi.is_finite() && 0.0 <= lo && lo <= hi && hi <= 2.0) {
            return Err(FitError::InvalidInput(format!(
                "differential-evolution mutation range ({lo}, {hi}) must satisfy 0 <= lo <= hi <= 2"
            )));
        }
        if !(0.0..=1.0).contains(&self.recombination) {
            return Err(FitError::InvalidInput(format!(
                "differential-evolution recombination {} must lie in [0, 1]",
                self.recombination
            )));
        }
        for (name, v) in [("tol", self.tol), ("atol", self.atol)] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(FitError::InvalidInput(format!(
                    "differential-evolution {name} must be finite and >= 0 (got {v})"
                )));
            }
        }
        if self.polish {
            self.polish_options.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DifferentialEvolutionOptimizer {
    options: DifferentialEvolutionOptions,
}

impl DifferentialEvolutionOptimizer {
    pub fn new(options: DifferentialEvolutionOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DifferentialEvolutionOptions {
        &self.options
    }
}

impl Optimizer for DifferentialEvolutionOptimizer {
    type Start = [Bounds];

    fn method(&self) -> Method {
        Method::DifferentialEvolution
    }

    #[instrument(skip_all, name = "differential_evolution", fields(n = bounds.len()))]
    fn minimize<O: Objective>(
        &self,
        objective: &O,
        bounds: &[Bounds],
    ) -> Result<OptimizeOutcome, FitError> {
        let opts = &self.options;
        opts.validate()?;

        let n = objective.dimension();
        if bounds.len() != n {
            return Err(FitError::InvalidInput(format!(
                "{} bounds given for {n} coefficients",
                bounds.len()
            )));
        }
        for b in bounds {
            b.validate()?;
        }

        let np = (opts.population_factor * n).max(MIN_POPULATION);
        let mut rng = match opts.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut population = latin_hypercube(np, bounds, &mut rng);
        let mut energies = evaluate_all(objective, &population)?;
        let mut evaluations = np;
        let mut best = argmin(&energies);
        info!(population = np, best = energies[best], "Differential evolution started.");

        let mut generations = 0usize;
        let mut converged = false;
        while generations < opts.max_generations {
            generations += 1;

            let f = dither(opts.mutation, &mut rng);
            let trials: Vec<Vec<f64>> = (0..np)
                .map(|i| trial_vector(i, best, f, opts.recombination, &population, bounds, &mut rng))
                .collect();
            let trial_energies = evaluate_all(objective, &trials)?;
            evaluations += np;

            for (i, (trial, e)) in trials.into_iter().zip(trial_energies).enumerate() {
                if e <= energies[i] {
                    population[i] = trial;
                    energies[i] = e;
                }
            }
            best = argmin(&energies);
            trace!(generation = generations, best = energies[best], "Generation complete.");

            if population_converged(&energies, opts.tol, opts.atol) {
                converged = true;
                break;
            }
        }

        if !converged {
            return Err(FitError::ConvergenceFailure {
                method: METHOD,
                iterations: generations,
                reason: format!(
                    "population did not converge (best objective {:e})",
                    energies[best]
                ),
            });
        }

        let mut x = population.swap_remove(best);
        let mut value = energies[best];
        debug!(generations, value, "Population converged.");

        if opts.polish {
            let polisher = LeastSquaresOptimizer::new(opts.polish_options.clone());
            match polisher.minimize(objective, &x) {
                Ok(polished) => {
                    evaluations += polished.evaluations;
                    let inside = polished
                        .x
                        .iter()
                        .zip(bounds)
                        .all(|(&c, b)| b.contains(c));
                    if inside && polished.value < value {
                        debug!(before = value, after = polished.value, "Polish improved the best member.");
                        x = polished.x;
                        value = polished.value;
                    }
                }
                Err(e) => debug!(error = %e, "Polish failed; keeping the population best."),
            }
        }

        Ok(OptimizeOutcome {
            x,
            value,
            iterations: generations,
            evaluations,
            termination: Termination::PopulationSpread,
        })
    }
}

fn evaluate_all<O: Objective>(objective: &O, members: &[Vec<f64>]) -> Result<Vec<f64>, FitError> {
    members.par_iter().map(|c| objective.value(c)).collect()
}

/// One point per stratum in every dimension, strata paired up by random permutation.
fn latin_hypercube(np: usize, bounds: &[Bounds], rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut population = vec![vec![0.0; bounds.len()]; np];
    let mut strata: Vec<usize> = (0..np).collect();
    for (j, b) in bounds.iter().enumerate() {
        strata.shuffle(rng);
        for (member, &stratum) in population.iter_mut().zip(&strata) {
            let u = (stratum as f64 + rng.r#gen::<f64>()) / np as f64;
            member[j] = b.min + u * b.width();
        }
    }
    population
}

fn dither((lo, hi): (f64, f64), rng: &mut StdRng) -> f64 {
    if lo < hi { rng.gen_range(lo..hi) } else { lo }
}

fn trial_vector(
    i: usize,
    best: usize,
    f: f64,
    cr: f64,
    population: &[Vec<f64>],
    bounds: &[Bounds],
    rng: &mut StdRng,
) -> Vec<f64> {
    let np = population.len();
    let n = bounds.len();

    let r1 = pick_other(np, &[i], rng);
    let r2 = pick_other(np, &[i, r1], rng);

    let mut trial = population[i].clone();
    let forced = rng.gen_range(0..n);
    for j in 0..n {
        if j == forced || rng.r#gen::<f64>() < cr {
            trial[j] = population[best][j] + f * (population[r1][j] - population[r2][j]);
        }
    }
    for (x, b) in trial.iter_mut().zip(bounds) {
        if !b.contains(*x) {
            *x = rng.gen_range(b.min..=b.max);
        }
    }
    trial
}

/// Uniform index in `0..np` not contained in `exclude`.
fn pick_other(np: usize, exclude: &[usize], rng: &mut StdRng) -> usize {
    loop {
        let k = rng.gen_range(0..np);
        if !exclude.contains(&k) {
            return k;
        }
    }
}

fn argmin(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v < values[best] {
            best = i;
        }
    }
    best
}

fn population_converged(energies: &[f64], tol: f64, atol: f64) -> bool {
    let n = energies.len() as f64;
    let mean = energies.iter().sum::<f64>() / n;
    let var = energies.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / n;
    var.sqrt() <= atol + tol * mean.abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AngleSeries, EnergySeries, EnergySeriesBatch};
    use crate::error::ErrorKind;
    use crate::fit::objective::TorsionObjective;
    use crate::models::rb_profile;

    fn synthetic(c_true: &[f64]) -> TorsionObjective {
        let angles = AngleSeries::full_rotation_10deg();
        let diff = EnergySeriesBatch::single(EnergySeries::new(rb_profile(c_true, &angles)));
        TorsionObjective::new(diff, angles, c_true.len()).unwrap()
    }

    fn seeded(seed: u64) -> DifferentialEvolutionOptimizer {
        DifferentialEvolutionOptimizer::new(DifferentialEvolutionOptions {
            seed: Some(seed),
            ..DifferentialEvolutionOptions::default()
        })
    }

    #[test]
    fn recovers_known_coefficients_inside_bounds() {
        let obj = synthetic(&[1.0, 2.0, 3.0, 4.0]);
        let bounds = vec![Bounds::new(-10.0, 10.0).unwrap(); 4];
        let out = seeded(7).minimize(&obj, &bounds).unwrap();
        for (a, b) in out.x.iter().zip([1.0, 2.0, 3.0, 4.0]) {
            assert!((a - b).abs() < 1e-3, "got {:?}", out.x);
        }
        assert!(out.value < 1e-6);
        assert_eq!(out.termination, Termination::PopulationSpread);
    }

    #[test]
    fn converges_without_polish() {
        let obj = synthetic(&[1.0, 2.0, 3.0, 4.0]);
        let bounds = vec![Bounds::new(-10.0, 10.0).unwrap(); 4];
        let opt = DifferentialEvolutionOptimizer::new(DifferentialEvolutionOptions {
            seed: Some(3),
            polish: false,
            tol: 0.0,
            max_generations: 3000,
            ..DifferentialEvolutionOptions::default()
        });
        let out = opt.minimize(&obj, &bounds).unwrap();
        for (a, b) in out.x.iter().zip([1.0, 2.0, 3.0, 4.0]) {
            assert!((a - b).abs() < 1e-3, "got {:?}", out.x);
        }
    }

    #[test]
    fn same_seed_gives_same_result() {
        let obj = synthetic(&[0.5, -1.0, 2.0]);
        let bounds = vec![Bounds::new(-5.0, 5.0).unwrap(); 3];
        let a = seeded(11).minimize(&obj, &bounds).unwrap();
        let b = seeded(11).minimize(&obj, &bounds).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn bounds_count_must_match_dimension() {
        let obj = synthetic(&[1.0, 2.0, 3.0, 4.0]);
        let bounds = vec![Bounds::new(-1.0, 1.0).unwrap(); 3];
        let err = seeded(1).minimize(&obj, &bounds).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn generation_budget_exhaustion_is_reported() {
        let obj = synthetic(&[1.0, 2.0, 3.0, 4.0]);
        let bounds = vec![Bounds::new(-10.0, 10.0).unwrap(); 4];
        let opt = DifferentialEvolutionOptimizer::new(DifferentialEvolutionOptions {
            seed: Some(5),
            max_generations: 2,
            atol: 0.0,
            tol: 0.0,
            ..DifferentialEvolutionOptions::default()
        });
        let err = opt.minimize(&obj, &bounds).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConvergenceFailure);
    }

    #[test]
    fn latin_hypercube_covers_every_stratum() {
        let mut rng = StdRng::seed_from_u64(0);
        let bounds = [Bounds::new(0.0, 10.0).unwrap(), Bounds::new(-1.0, 1.0).unwrap()];
        let pop = latin_hypercube(10, &bounds, &mut rng);
        let mut strata: Vec<usize> = pop.iter().map(|m| m[0].floor() as usize).collect();
        strata.sort_unstable();
        assert_eq!(strata, (0..10).collect::<Vec<_>>());
        assert!(pop.iter().all(|m| bounds[1].contains(m[1])));
    }

    #[test]
    fn spread_criterion() {
        assert!(population_converged(&[1.0, 1.0, 1.0], 0.0, 0.0));
        assert!(!population_converged(&[1.0, 2.0, 3.0], 0.01, 0.0));
        assert!(population_converged(&[1.0, 1.001, 0.999], 0.01, 0.0));
    }
}
