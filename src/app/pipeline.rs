//! Shared fit pipeline used by both subcommands.
//!
//! energies -> target - start -> optional shift -> FitJob -> profile
//!
//! `fit` reads its energies from disk while `demo` synthesizes them; everything
//! after that is the same.

use tracing::{debug, info};

use crate::config::{DemoConfig, FitConfig, ScanConfig};
use crate::data::generate_scan;
use crate::domain::{AngleSeries, EnergySeriesBatch, FitResult};
use crate::error::AppError;
use crate::fit::{FitJob, FitStrategy};
use crate::io::read_energy_batch;
use crate::report::{ProfileRow, RunSummary, compute_profile};

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub result: FitResult,
    pub summary: RunSummary,
    pub profile: Vec<ProfileRow>,
}

/// `rbfit demo` output: the fit plus the coefficients the scan was built from.
#[derive(Debug, Clone)]
pub struct DemoOutput {
    pub run: RunOutput,
    pub true_coefficients: Vec<f64>,
}

pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    let angles = config.scan.angles()?;

    let start = read_energy_batch(&config.start_paths, angles.len())?;
    let target = read_energy_batch(&config.target_paths, angles.len())?;
    info!(
        "Read {} conformer(s) with {} samples each.",
        start.len(),
        angles.len()
    );

    fit_energies(
        &start,
        &target,
        config.num_coefficients,
        &angles,
        &config.scan,
        config.strategy.clone(),
    )
}

pub fn run_demo(config: &DemoConfig) -> Result<DemoOutput, AppError> {
    let angles = config.scan.angles()?;
    let scan = generate_scan(&angles, &config.sample)?;
    info!(
        "Generated {} synthetic conformer(s) from {:?} (noise sigma {}).",
        scan.start.len(),
        scan.coefficients,
        config.sample.noise_sigma
    );

    let run = fit_energies(
        &scan.start,
        &scan.target,
        scan.coefficients.len(),
        &angles,
        &config.scan,
        config.strategy.clone(),
    )?;
    Ok(DemoOutput {
        run,
        true_coefficients: scan.coefficients,
    })
}

fn fit_energies(
    start: &EnergySeriesBatch,
    target: &EnergySeriesBatch,
    num_coefficients: usize,
    angles: &AngleSeries,
    scan: &ScanConfig,
    strategy: FitStrategy,
) -> Result<RunOutput, AppError> {
    let diff = EnergySeriesBatch::difference(target, start)?;
    // Shift per conformer after differencing so all conformers share one C0.
    let diff = if scan.shift_to_zero {
        debug!("Shifting every difference series so its minimum is zero.");
        diff.shifted_to_zero()
    } else {
        diff
    };

    let mut job = FitJob::from_difference(diff, num_coefficients, angles, strategy)?;
    let result = job.run()?;

    let profile = compute_profile(job.objective().target_diff(), angles, &result.coefficients)?;

    Ok(RunOutput {
        result,
        summary: RunSummary {
            series: start.len(),
            samples: angles.len(),
            angle_start: scan.angle_start,
            angle_step: scan.angle_step,
            shifted_to_zero: scan.shift_to_zero,
        },
        profile,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SampleOptions;
    use crate::models::rb_profile;
    use std::io::Write;
    use std::path::{Path, PathBuf};

    fn scan_config() -> ScanConfig {
        ScanConfig {
            angle_start: 0.0,
            angle_step: 10.0,
            samples: 36,
            shift_to_zero: true,
        }
    }

    fn write_series(dir: &Path, name: &str, angles: &AngleSeries, values: &[f64]) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "# angle energy").unwrap();
        for (a, e) in angles.degrees().iter().zip(values) {
            writeln!(f, "{a} {e}").unwrap();
        }
        path
    }

    #[test]
    fn fit_from_files_recovers_coefficients() {
        let dir = tempfile::tempdir().unwrap();
        let angles = AngleSeries::full_rotation_10deg();
        let truth = [1.0, 2.0, 3.0, 4.0];
        let start: Vec<f64> = (0..36).map(|i| 5.0 + 0.1 * i as f64).collect();
        let target: Vec<f64> = start
            .iter()
            .zip(rb_profile(&truth, &angles))
            .map(|(s, d)| s + d)
            .collect();

        let config = FitConfig {
            start_paths: vec![write_series(dir.path(), "a.mm", &angles, &start)],
            target_paths: vec![write_series(dir.path(), "a.qm", &angles, &target)],
            num_coefficients: 4,
            scan: ScanConfig {
                shift_to_zero: false,
                ..scan_config()
            },
            strategy: FitStrategy::least_squares(None),
            show_profile: true,
        };

        let out = run_fit(&config).unwrap();
        for (c, t) in out.result.coefficients.iter().zip(truth) {
            assert!((c - t).abs() < 1e-6, "{:?}", out.result.coefficients);
        }
        assert!(out.result.deviation < 1e-8);
        assert_eq!(out.profile.len(), 36);
        assert_eq!(out.summary.series, 1);
    }

    #[test]
    fn shifting_only_moves_the_constant_term() {
        let config = DemoConfig {
            sample: SampleOptions {
                coefficients: vec![1.0, 2.0, 3.0, 4.0],
                noise_sigma: 0.0,
                conformers: 1,
                seed: 5,
            },
            scan: scan_config(),
            strategy: FitStrategy::least_squares(None),
            show_profile: false,
        };
        let out = run_demo(&config).unwrap();
        let c = &out.run.result.coefficients;
        // Higher-order terms survive the shift; C0 absorbs the offset.
        for k in 1..4 {
            assert!((c[k] - out.true_coefficients[k]).abs() < 1e-4, "{c:?}");
        }
        assert!(out.run.summary.shifted_to_zero);
    }

    #[test]
    fn shifted_conformers_with_different_offsets_fit_exactly() {
        let config = DemoConfig {
            sample: SampleOptions {
                coefficients: vec![1.0, 2.0, 3.0, 4.0],
                noise_sigma: 0.0,
                conformers: 3,
                seed: 11,
            },
            scan: scan_config(),
            strategy: FitStrategy::least_squares(None),
            show_profile: false,
        };
        let out = run_demo(&config).unwrap();
        assert_eq!(out.run.summary.series, 3);
        assert!(out.run.result.deviation < 1e-8, "{}", out.run.result.deviation);
        let c = &out.run.result.coefficients;
        for k in 1..4 {
            assert!((c[k] - out.true_coefficients[k]).abs() < 1e-6, "{c:?}");
        }
    }

    #[test]
    fn shift_is_applied_to_the_difference() {
        let angles = AngleSeries::full_rotation_10deg();
        let truth = [0.5, -1.0, 2.0];
        let profile = rb_profile(&truth, &angles);
        // Start series with different shapes: shifting them separately would
        // distort the difference.
        let start: Vec<f64> = (0..36).map(|i| 3.0 * (i as f64 / 6.0).sin()).collect();
        let target: Vec<f64> = start.iter().zip(&profile).map(|(s, d)| s + d + 40.0).collect();
        let batch = |v: &[f64]| EnergySeriesBatch::single(crate::domain::EnergySeries::new(v.to_vec()));

        let out = fit_energies(
            &batch(&start),
            &batch(&target),
            3,
            &angles,
            &scan_config(),
            FitStrategy::least_squares(None),
        )
        .unwrap();
        assert!(out.result.deviation < 1e-8, "{}", out.result.deviation);
        let min = profile.iter().copied().fold(f64::INFINITY, f64::min);
        assert!((out.result.coefficients[0] - (truth[0] - min)).abs() < 1e-6);
        assert!((out.result.coefficients[1] - truth[1]).abs() < 1e-6);
        assert!((out.result.coefficients[2] - truth[2]).abs() < 1e-6);
    }

    #[test]
    fn wrong_sample_count_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let angles = AngleSeries::uniform(0.0, 10.0, 10).unwrap();
        let values = vec![0.0; 10];
        let config = FitConfig {
            start_paths: vec![write_series(dir.path(), "a.mm", &angles, &values)],
            target_paths: vec![write_series(dir.path(), "a.qm", &angles, &values)],
            num_coefficients: 4,
            scan: scan_config(),
            strategy: FitStrategy::least_squares(None),
            show_profile: false,
        };
        assert_eq!(run_fit(&config).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn bad_guess_length_maps_to_exit_code_2() {
        let config = DemoConfig {
            sample: SampleOptions {
                coefficients: vec![1.0, 2.0],
                noise_sigma: 0.0,
                conformers: 1,
                seed: 1,
            },
            scan: scan_config(),
            strategy: FitStrategy::least_squares(Some(vec![0.0; 3])),
            show_profile: false,
        };
        assert_eq!(run_demo(&config).unwrap_err().exit_code(), 2);
    }
}
