//! Synthetic input data.

pub mod sample;

pub use sample::{SampleOptions, SampleScan, generate_scan, random_guess};
