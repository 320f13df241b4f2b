//! Mathematical utilities: deviation metrics.

pub mod deviation;

pub use deviation::*;
