//! Terminal formatting for fit results.

use crate::domain::FitResult;
use crate::report::ProfileRow;

/// Series columns beyond this are summarized instead of printed.
const MAX_PROFILE_SERIES: usize = 4;

/// Inputs of a run, echoed in the summary header.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub series: usize,
    pub samples: usize,
    pub angle_start: f64,
    pub angle_step: f64,
    pub shifted_to_zero: bool,
}

/// Format the run header, the fitted coefficients and the convergence diagnostics.
pub fn format_fit_summary(result: &FitResult, summary: &RunSummary) -> String {
    let mut out = String::new();

    out.push_str("=== rbfit - Ryckaert-Bellemans dihedral fit ===\n");
    out.push_str(&format!(
        "Scan: {} series x {} samples | angles from {:.1} deg, step {:.1} deg\n",
        summary.series, summary.samples, summary.angle_start, summary.angle_step
    ));
    if summary.shifted_to_zero {
        out.push_str("Energies shifted so each scan minimum is zero.\n");
    }

    out.push_str(&format!(
        "\nMethod: {} ({}; iterations={}, evaluations={})\n",
        result.method.display_name(),
        result.termination.describe(),
        result.iterations,
        result.evaluations
    ));
    out.push_str(&format!("RMSD: {:.6}\n", result.deviation));

    out.push_str("\nCoefficients:\n");
    for (i, c) in result.coefficients.iter().enumerate() {
        out.push_str(&format!("  C{i} = {c:>14.6}\n"));
    }
    out.push_str(&format!("  vector: {}\n", fmt_vec(&result.coefficients)));

    out
}

/// Table of fitted vs. target energy differences, one row per angle.
pub fn format_profile(rows: &[ProfileRow]) -> String {
    let mut out = String::new();
    let n_series = rows.first().map_or(0, |r| r.targets.len());
    let shown = n_series.min(MAX_PROFILE_SERIES);

    let mut header = format!("{:>8} {:>12}", "angle", "fitted");
    let mut rule = format!("{:->8} {:->12}", "", "");
    for s in 0..shown {
        header.push_str(&format!(" {:>12} {:>10}", format!("target#{}", s + 1), "resid"));
        rule.push_str(&format!(" {:->12} {:->10}", "", ""));
    }
    out.push_str(header.trim_end());
    out.push('\n');
    out.push_str(&rule);
    out.push('\n');

    for row in rows {
        let mut line = format!("{:>8.1} {:>12.4}", row.angle, row.fitted);
        for target in row.targets.iter().take(shown) {
            line.push_str(&format!(" {:>12.4} {:>10.4}", target, target - row.fitted));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }

    if n_series > shown {
        out.push_str(&format!(
            "({} more series not shown)\n",
            n_series - shown
        ));
    }

    out
}

/// Side-by-side true vs. fitted coefficients for a synthetic run.
pub fn format_recovery(truth: &[f64], fitted: &[f64]) -> String {
    let mut out = String::from("Recovery:\n");
    out.push_str(&format!("  {:>4} {:>14} {:>14} {:>12}\n", "", "true", "fitted", "error"));
    for (i, (t, f)) in truth.iter().zip(fitted).enumerate() {
        out.push_str(&format!("  {:>4} {t:>14.6} {f:>14.6} {:>12.2e}\n", format!("C{i}"), f - t));
    }
    out
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.6}")).collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Method, Termination};

    #[test]
    fn summary_lists_every_coefficient() {
        let result = FitResult {
            coefficients: vec![1.0, 2.0, 3.0, 4.0],
            deviation: 0.0,
            method: Method::LeastSquares,
            iterations: 3,
            evaluations: 4,
            termination: Termination::GradientTolerance,
        };
        let summary = RunSummary {
            series: 1,
            samples: 36,
            angle_start: 0.0,
            angle_step: 10.0,
            shifted_to_zero: true,
        };
        let text = format_fit_summary(&result, &summary);
        for i in 0..4 {
            assert!(text.contains(&format!("C{i} =")), "{text}");
        }
        assert!(text.contains("[1.000000, 2.000000, 3.000000, 4.000000]"));
        assert!(text.contains("least-squares"));
    }

    #[test]
    fn profile_table_has_one_line_per_angle() {
        let rows: Vec<ProfileRow> = (0..3)
            .map(|i| ProfileRow {
                angle: 10.0 * i as f64,
                fitted: 1.0,
                targets: vec![1.5; 6],
            })
            .collect();
        let text = format_profile(&rows);
        // header + rule + rows + overflow note
        assert_eq!(text.lines().count(), 2 + 3 + 1);
        assert!(text.contains("target#4"));
        assert!(!text.contains("target#5"));
        assert!(text.contains("2 more series"));
    }

    #[test]
    fn recovery_lists_true_and_fitted() {
        let text = format_recovery(&[1.0, 2.0], &[1.5, 2.0]);
        assert_eq!(text.lines().count(), 4);
        assert!(text.contains("C1"));
        assert!(text.contains("5.00e-1"));
    }
}
