//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - sets up logging and the worker pool
//! - resolves the layered configuration
//! - runs the fit pipeline and prints the report

use clap::Parser;
use tracing::{debug, info};

use crate::cli::{Cli, Command, DemoArgs, FitArgs};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `rbfit` binary.
pub fn run() -> Result<(), AppError> {
    // A missing `.env` is the normal case.
    let dotenv = dotenvy::dotenv().ok();

    let cli = Cli::parse();
    crate::logging::setup_logging(cli.verbose, cli.quiet)?;
    if let Some(path) = dotenv {
        debug!("Loaded environment from {}", path.display());
    }
    debug!("Parsed CLI arguments: {:?}", cli);

    if let Some(threads) = cli.threads {
        info!("Setting Rayon global thread pool to {threads} threads.");
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|e| AppError::new(2, format!("Failed to build thread pool: {e}")))?;
    }

    match cli.command {
        Command::Fit(args) => handle_fit(&args),
        Command::Demo(args) => handle_demo(&args),
    }
}

fn handle_fit(args: &FitArgs) -> Result<(), AppError> {
    let config = crate::config::build_fit_config(args)?;
    let run = pipeline::run_fit(&config)?;

    println!(
        "{}",
        crate::report::format_fit_summary(&run.result, &run.summary)
    );
    if config.show_profile {
        println!("{}", crate::report::format_profile(&run.profile));
    }
    Ok(())
}

fn handle_demo(args: &DemoArgs) -> Result<(), AppError> {
    let config = crate::config::build_demo_config(args)?;
    let out = pipeline::run_demo(&config)?;

    println!(
        "{}",
        crate::report::format_fit_summary(&out.run.result, &out.run.summary)
    );
    println!(
        "{}",
        crate::report::format_recovery(&out.true_coefficients, &out.run.result.coefficients)
    );
    if config.show_profile {
        println!("{}", crate::report::format_profile(&out.run.profile));
    }
    Ok(())
}
