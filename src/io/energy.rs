//! Energy scan files.
//!
//! One sample per line, in angle order. A line may hold several columns separated by
//! whitespace or commas (e.g. `angle energy`); the last column is the energy. Blank
//! lines and lines starting with `#` are ignored.
//!
//! The reader knows nothing about angles: it only checks that the file holds exactly
//! the expected number of finite energies. Pairing samples with angles is the
//! caller's job.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::{EnergySeries, EnergySeriesBatch};
use crate::error::AppError;

/// Read one energy scan, requiring exactly `expected_count` samples.
pub fn read_energy_series(path: &Path, expected_count: usize) -> Result<EnergySeries, AppError> {
    let text = fs::read_to_string(path).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to read energy file '{}': {e}", path.display()),
        )
    })?;

    let series = parse_energy_series(&text, expected_count)
        .map_err(|e| AppError::new(2, format!("Energy file '{}': {e}", path.display())))?;
    debug!(path = %path.display(), samples = series.len(), "Read energy scan.");
    Ok(series)
}

/// Read several scans of equal length into a batch (file order is kept).
pub fn read_energy_batch(paths: &[PathBuf], expected_count: usize) -> Result<EnergySeriesBatch, AppError> {
    let series = paths
        .iter()
        .map(|p| read_energy_series(p, expected_count))
        .collect::<Result<Vec<_>, _>>()?;
    EnergySeriesBatch::new(series).map_err(|e| AppError::new(2, e.to_string()))
}

pub fn parse_energy_series(text: &str, expected_count: usize) -> Result<EnergySeries, String> {
    let mut values = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim().trim_start_matches('\u{feff}');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some(token) = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .next_back()
        else {
            continue;
        };

        let value: f64 = token
            .parse()
            .map_err(|_| format!("line {line_no}: invalid energy '{token}'"))?;
        if !value.is_finite() {
            return Err(format!("line {line_no}: energy '{token}' is not finite"));
        }
        values.push(value);
    }

    if values.len() != expected_count {
        return Err(format!(
            "expected {expected_count} energies, found {}",
            values.len()
        ));
    }
    Ok(EnergySeries::new(values))
}
