//! RB coefficient fitting.
//!
//! Responsibilities:
//!
//! - wrap the energy difference in an objective (`objective`)
//! - minimize it locally (`least_squares`) or globally (`differential_evolution`)
//!   behind one interface (`optimizer`)
//! - validate inputs and drive one fit end to end (`fitter`)

pub mod differential_evolution;
pub mod fitter;
pub mod least_squares;
pub mod objective;
pub mod optimizer;

pub use differential_evolution::*;
pub use fitter::*;
pub use least_squares::*;
pub use objective::*;
pub use optimizer::*;
