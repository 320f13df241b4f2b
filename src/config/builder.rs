use std::path::PathBuf;

use tracing::debug;

use super::file::{
    FileAnglesConfig, FileConfig, FileDifferentialEvolutionConfig, FileLeastSquaresConfig,
};
use super::{
    DEFAULT_ANGLE_START, DEFAULT_ANGLE_STEP, DEFAULT_BOUNDS, DEFAULT_DEMO_COEFFICIENTS,
    DEFAULT_DEMO_SEED, DEFAULT_NUM_COEFFICIENTS, DemoConfig, FitConfig, MAX_SAMPLES, ScanConfig,
};
use crate::cli::{DemoArgs, FitArgs, OptimizerArgs, ScanArgs};
use crate::data::{SampleOptions, random_guess};
use crate::domain::{Bounds, Method};
use crate::error::AppError;
use crate::fit::{DifferentialEvolutionOptions, FitStrategy, LeastSquaresOptions};

pub fn build_fit_config(args: &FitArgs) -> Result<FitConfig, AppError> {
    let mut file_config = load_file(args.config.as_ref())?;

    if args.start.len() != args.target.len() {
        return Err(AppError::new(
            2,
            format!(
                "{} start files but {} target files; pass one of each per conformer.",
                args.start.len(),
                args.target.len()
            ),
        ));
    }

    let num_coefficients = args
        .coefficients
        .or(file_config.coefficients)
        .unwrap_or(DEFAULT_NUM_COEFFICIENTS);

    let scan = merge_scan(
        &args.scan,
        file_config.angles.take().unwrap_or_default(),
        file_config.shift_to_zero,
    )?;
    let strategy = merge_strategy(&args.optimizer, &mut file_config, num_coefficients, None)?;

    Ok(FitConfig {
        start_paths: args.start.clone(),
        target_paths: args.target.clone(),
        num_coefficients,
        scan,
        strategy,
        show_profile: args.profile,
    })
}

pub fn build_demo_config(args: &DemoArgs) -> Result<DemoConfig, AppError> {
    let mut file_config = load_file(args.config.as_ref())?;

    let coefficients = args
        .coefficients
        .clone()
        .unwrap_or_else(|| DEFAULT_DEMO_COEFFICIENTS.to_vec());
    let seed = args
        .optimizer
        .seed
        .or(file_config
            .differential_evolution
            .as_ref()
            .and_then(|de| de.seed))
        .unwrap_or(DEFAULT_DEMO_SEED);

    let sample = SampleOptions {
        coefficients,
        noise_sigma: args.noise.unwrap_or(0.0),
        conformers: args.conformers.unwrap_or(1),
        seed,
    };

    let scan = merge_scan(
        &args.scan,
        file_config.angles.take().unwrap_or_default(),
        file_config.shift_to_zero,
    )?;
    let random_seed = args.random_guess.then_some(seed);
    let mut strategy = merge_strategy(
        &args.optimizer,
        &mut file_config,
        sample.coefficients.len(),
        random_seed,
    )?;
    // A demo run is reproducible end to end.
    if let FitStrategy::DifferentialEvolution { options, .. } = &mut strategy {
        options.seed.get_or_insert(seed);
    }

    Ok(DemoConfig {
        sample,
        scan,
        strategy,
        show_profile: args.profile,
    })
}

fn load_file(path: Option<&PathBuf>) -> Result<FileConfig, AppError> {
    match path {
        Some(path) => FileConfig::from_file(path),
        None => {
            debug!("No config file given; using defaults and command-line flags.");
            Ok(FileConfig::default())
        }
    }
}

fn merge_scan(
    args: &ScanArgs,
    file: FileAnglesConfig,
    file_shift: Option<bool>,
) -> Result<ScanConfig, AppError> {
    let angle_start = args
        .angle_start
        .or(file.start)
        .unwrap_or(DEFAULT_ANGLE_START);
    let angle_step = args.angle_step.or(file.step).unwrap_or(DEFAULT_ANGLE_STEP);
    if !(angle_step.is_finite() && angle_step > 0.0) {
        return Err(AppError::new(
            2,
            format!("Angle step must be finite and > 0 (got {angle_step})."),
        ));
    }
    let samples = match args.samples.or(file.samples) {
        Some(samples) => samples,
        None => {
            let full_turn = (360.0 / angle_step).round().max(1.0);
            if !(full_turn.is_finite() && full_turn <= MAX_SAMPLES as f64) {
                return Err(AppError::new(
                    2,
                    format!("Angle step {angle_step} is too small; a full rotation would need more than {MAX_SAMPLES} samples."),
                ));
            }
            full_turn as usize
        }
    };
    if samples > MAX_SAMPLES {
        return Err(AppError::new(
            2,
            format!("{samples} samples requested; at most {MAX_SAMPLES} are supported."),
        ));
    }

    let shift_to_zero = if args.no_shift {
        false
    } else {
        file_shift.unwrap_or(true)
    };

    Ok(ScanConfig {
        angle_start,
        angle_step,
        samples,
        shift_to_zero,
    })
}

fn merge_strategy(
    args: &OptimizerArgs,
    file: &mut FileConfig,
    num_coefficients: usize,
    random_guess_seed: Option<u64>,
) -> Result<FitStrategy, AppError> {
    let method = args.method.or(file.method).unwrap_or(Method::LeastSquares);
    let ls_file = file.least_squares.take().unwrap_or_default();
    let de_file = file.differential_evolution.take().unwrap_or_default();

    let bounds = if args.bounds.is_empty() {
        de_file.bounds.clone().unwrap_or_default()
    } else {
        args.bounds.clone()
    };
    let ls_options = merge_least_squares(args, &ls_file);

    // Least squares only looks at the bounds when it has to draw a guess.
    let strategy = match method {
        Method::LeastSquares => {
            let explicit = args.guess.clone().or(ls_file.initial_guess);
            let initial_guess = match (explicit, random_guess_seed) {
                (Some(guess), _) => Some(guess),
                (None, Some(seed)) => {
                    Some(random_guess(&expand_bounds(bounds, num_coefficients)?, seed))
                }
                (None, None) => None,
            };
            FitStrategy::LeastSquares {
                initial_guess,
                options: ls_options,
            }
        }
        Method::DifferentialEvolution => FitStrategy::DifferentialEvolution {
            bounds: expand_bounds(bounds, num_coefficients)?,
            options: merge_differential_evolution(args, &de_file, ls_options),
        },
    };
    debug!("Resolved fit strategy: {:?}", strategy);
    Ok(strategy)
}

fn merge_least_squares(args: &OptimizerArgs, file: &FileLeastSquaresConfig) -> LeastSquaresOptions {
    let defaults = LeastSquaresOptions::default();
    LeastSquaresOptions {
        max_iterations: args
            .max_iterations
            .or(file.max_iterations)
            .unwrap_or(defaults.max_iterations),
        ftol: file.ftol.unwrap_or(defaults.ftol),
        xtol: file.xtol.unwrap_or(defaults.xtol),
        gtol: file.gtol.unwrap_or(defaults.gtol),
        stepbound: file.stepbound.unwrap_or(defaults.stepbound),
    }
}

fn merge_differential_evolution(
    args: &OptimizerArgs,
    file: &FileDifferentialEvolutionConfig,
    polish_options: LeastSquaresOptions,
) -> DifferentialEvolutionOptions {
    let defaults = DifferentialEvolutionOptions::default();
    DifferentialEvolutionOptions {
        population_factor: file.population_factor.unwrap_or(defaults.population_factor),
        max_generations: args
            .max_generations
            .or(file.max_generations)
            .unwrap_or(defaults.max_generations),
        mutation: file.mutation.unwrap_or(defaults.mutation),
        recombination: file.recombination.unwrap_or(defaults.recombination),
        tol: file.tol.unwrap_or(defaults.tol),
        atol: file.atol.unwrap_or(defaults.atol),
        seed: args.seed.or(file.seed),
        polish: !args.no_polish && file.polish.unwrap_or(defaults.polish),
        polish_options,
    }
}

/// One box per coefficient; a single box is broadcast, none means the default box.
fn expand_bounds(bounds: Vec<Bounds>, num_coefficients: usize) -> Result<Vec<Bounds>, AppError> {
    for b in &bounds {
        b.validate()
            .map_err(|e| AppError::new(2, format!("Invalid bounds: {e}")))?;
    }
    match bounds.len() {
        0 => Ok(vec![DEFAULT_BOUNDS; num_coefficients.max(1)]),
        1 => Ok(vec![bounds[0]; num_coefficients.max(1)]),
        n if n == num_coefficients => Ok(bounds),
        n => Err(AppError::new(
            2,
            format!("{n} bounds given for {num_coefficients} coefficients; pass one or one per coefficient."),
        )),
    }
}
