//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - input series (`AngleSeries`, `EnergySeries`, `EnergySeriesBatch`)
//! - optimizer selection and search boxes (`Method`, `Bounds`)
//! - fit outputs (`FitResult`, `Termination`)

pub mod types;

pub use types::*;
