//! Input helpers.
//!
//! - energy scan files (`energy`)

pub mod energy;

pub use energy::*;
