//! Torsion energy model.
//!
//! Ryckaert-Bellemans energy as small, pure functions of the coefficients and the
//! dihedral angle in degrees.

pub mod rb;

pub use rb::*;
