//! `rb-fit` library crate.
//!
//! Fits Ryckaert-Bellemans dihedral coefficients to the energy difference between
//! a reference torsion scan and a scan computed without the dihedral term.
//!
//! The binary (`rbfit`) is a thin wrapper around this library so that:
//!
//! - the fitting core is testable without spawning processes
//! - callers can drive [`fit::fit`] or [`fit::FitJob`] directly

pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod logging;
pub mod math;
pub mod models;
pub mod report;
