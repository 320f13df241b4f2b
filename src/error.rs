//! Error types.
//!
//! - [`FitError`] is the typed error of the fitting core (library callers match on
//!   [`FitError::kind`]).
//! - [`AppError`] is what the `rbfit` binary reports: a message plus a process exit code.

use thiserror::Error;

/// Coarse classification of a [`FitError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A precondition on the inputs was violated (lengths, counts, bounds).
    InvalidInput,
    /// The deviation metric was given collections of different shape.
    ShapeMismatch,
    /// A NaN or infinite value was found in inputs or intermediate results.
    InvalidValue,
    /// The optimizer stopped without a usable result.
    ConvergenceFailure,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FitError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("{method} did not converge after {iterations} iterations: {reason}")]
    ConvergenceFailure {
        method: &'static str,
        iterations: usize,
        reason: String,
    },
}

impl FitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FitError::InvalidInput(_) => ErrorKind::InvalidInput,
            FitError::ShapeMismatch(_) => ErrorKind::ShapeMismatch,
            FitError::InvalidValue(_) => ErrorKind::InvalidValue,
            FitError::ConvergenceFailure { .. } => ErrorKind::ConvergenceFailure,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let exit_code = match err.kind() {
            ErrorKind::ConvergenceFailure => 4,
            ErrorKind::InvalidInput | ErrorKind::ShapeMismatch | ErrorKind::InvalidValue => 2,
        };
        AppError::new(exit_code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convergence_failures_map_to_exit_code_4() {
        let err = FitError::ConvergenceFailure {
            method: "least-squares",
            iterations: 10,
            reason: "iteration budget exhausted".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::ConvergenceFailure);
        assert_eq!(AppError::from(err).exit_code(), 4);
    }

    #[test]
    fn input_errors_map_to_exit_code_2() {
        for err in [
            FitError::InvalidInput("x".into()),
            FitError::ShapeMismatch("x".into()),
            FitError::InvalidValue("x".into()),
        ] {
            assert_eq!(AppError::from(err).exit_code(), 2);
        }
    }
}
