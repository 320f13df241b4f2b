//! Command-line parsing for the `rbfit` dihedral fitter.
//!
//! Valued options are `Option`s so the config builder can tell "not given" apart
//! from "given the default value" when layering over a TOML file.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::domain::{Bounds, Method};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "rbfit",
    version,
    about = "Fit Ryckaert-Bellemans dihedral coefficients to torsion energy scans"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Silence all log output.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Worker threads for population evaluation (defaults to one per core).
    #[arg(long, global = true, value_name = "N")]
    pub threads: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit coefficients to the difference between target and start energy files.
    Fit(FitArgs),
    /// Generate a synthetic scan from known coefficients and fit it back.
    Demo(DemoArgs),
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Energy files computed without the dihedral term, one per conformer.
    #[arg(long, required = true, num_args = 1.., value_name = "FILE")]
    pub start: Vec<PathBuf>,

    /// Reference energy files, in the same conformer order as `--start`.
    #[arg(long, required = true, num_args = 1.., value_name = "FILE")]
    pub target: Vec<PathBuf>,

    /// Number of RB coefficients to fit.
    #[arg(short = 'n', long, value_name = "N")]
    pub coefficients: Option<usize>,

    #[command(flatten)]
    pub optimizer: OptimizerArgs,

    #[command(flatten)]
    pub scan: ScanArgs,

    /// TOML configuration file; command-line flags take precedence over it.
    #[arg(long, value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Print the fitted vs. target profile table.
    #[arg(long)]
    pub profile: bool,
}

#[derive(Debug, Args, Clone)]
pub struct DemoArgs {
    /// Coefficients the synthetic target is built from.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, value_name = "C0,C1,...")]
    pub coefficients: Option<Vec<f64>>,

    /// Standard deviation of Gaussian noise added to the target energies.
    #[arg(long, value_name = "SIGMA")]
    pub noise: Option<f64>,

    /// Number of synthetic conformers in the batch.
    #[arg(long, value_name = "N")]
    pub conformers: Option<usize>,

    /// Start least squares from a random integer guess instead of zeros.
    #[arg(long)]
    pub random_guess: bool,

    #[command(flatten)]
    pub optimizer: OptimizerArgs,

    #[command(flatten)]
    pub scan: ScanArgs,

    /// TOML configuration file; command-line flags take precedence over it.
    #[arg(long, value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Print the fitted vs. target profile table.
    #[arg(long)]
    pub profile: bool,
}

/// Optimizer selection and tuning shared by `fit` and `demo`.
#[derive(Debug, Args, Clone, Default)]
pub struct OptimizerArgs {
    /// Optimizer to run.
    #[arg(long, value_enum)]
    pub method: Option<Method>,

    /// Least-squares starting point, comma separated.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, value_name = "C0,C1,...")]
    pub guess: Option<Vec<f64>>,

    /// Differential-evolution search box, one MIN:MAX per coefficient or a single
    /// one applied to all.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, value_name = "MIN:MAX")]
    pub bounds: Vec<Bounds>,

    /// Seed for differential evolution and random guesses.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Least-squares iteration budget.
    #[arg(long, value_name = "N")]
    pub max_iterations: Option<usize>,

    /// Differential-evolution generation budget.
    #[arg(long, value_name = "N")]
    pub max_generations: Option<usize>,

    /// Skip the least-squares polish after differential evolution.
    #[arg(long)]
    pub no_polish: bool,
}

/// Layout of the scan shared by every series.
#[derive(Debug, Args, Clone, Default)]
pub struct ScanArgs {
    /// First dihedral angle in degrees.
    #[arg(long, allow_hyphen_values = true, value_name = "DEG")]
    pub angle_start: Option<f64>,

    /// Angle increment in degrees.
    #[arg(long, allow_hyphen_values = true, value_name = "DEG")]
    pub angle_step: Option<f64>,

    /// Samples per series (defaults to one full rotation).
    #[arg(long, value_name = "N")]
    pub samples: Option<usize>,

    /// Fit the raw difference instead of shifting each conformer's `target - start` minimum to zero.
    #[arg(long)]
    pub no_shift: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_fit_with_negative_values() {
        let cli = Cli::try_parse_from([
            "rbfit", "-vv", "fit", "--start", "a.dat", "b.dat", "--target", "c.dat", "d.dat",
            "-n", "4", "--method", "de", "--bounds", "-10:10,-5:5", "--guess", "-1,0,1,2",
            "--angle-start", "-180",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.start.len(), 2);
        assert_eq!(args.target.len(), 2);
        assert_eq!(args.coefficients, Some(4));
        assert_eq!(args.optimizer.method, Some(Method::DifferentialEvolution));
        assert_eq!(args.optimizer.bounds.len(), 2);
        assert_eq!(args.optimizer.bounds[0], Bounds { min: -10.0, max: 10.0 });
        assert_eq!(args.optimizer.guess, Some(vec![-1.0, 0.0, 1.0, 2.0]));
        assert_eq!(args.scan.angle_start, Some(-180.0));
    }

    #[test]
    fn fit_requires_start_and_target() {
        assert!(Cli::try_parse_from(["rbfit", "fit", "--start", "a.dat"]).is_err());
    }

    #[test]
    fn demo_needs_no_arguments() {
        let cli = Cli::try_parse_from(["rbfit", "demo"]).unwrap();
        let Command::Demo(args) = cli.command else {
            panic!("expected demo");
        };
        assert!(args.coefficients.is_none());
        assert!(!args.random_guess);
    }

    #[test]
    fn malformed_bounds_are_rejected() {
        assert!(Cli::try_parse_from(["rbfit", "demo", "--bounds", "5:-5"]).is_err());
        assert!(Cli::try_parse_from(["rbfit", "demo", "--bounds", "5"]).is_err());
    }
}
