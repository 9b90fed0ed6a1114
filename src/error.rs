// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;

/// Errors that can occur during solver setup, I/O, or execution.
#[derive(Debug)]
pub enum RelaxError {
    /// Grid shape is invalid (dimension too small to hold an interior cell).
    InvalidGridShape {
        /// The axis index (0 = rows, 1 = columns).
        axis: usize,
        /// The size provided.
        size: usize,
    },
    /// Worker count is zero.
    InvalidWorkerCount(usize),
    /// Tolerance is not positive and finite.
    InvalidTolerance(f64),
    /// Relaxation step size is not positive and finite.
    InvalidStepSize(f64),
    /// Convergence check interval is zero.
    InvalidCheckInterval(usize),
    /// Linear system has no unknowns.
    EmptySystem,
    /// Buffer allocation failed or the requested size overflows.
    AllocationError {
        /// Requested rows.
        rows: usize,
        /// Requested columns.
        cols: usize,
    },
    /// Array shape does not match expected shape.
    ShapeMismatch {
        /// The expected shape.
        expected: Vec<usize>,
        /// The actual shape encountered.
        got: Vec<usize>,
    },
    /// The convergence statistic became non-finite.
    Diverged {
        /// Iteration at which the non-finite value was observed.
        iteration: usize,
        /// The offending value.
        error: f64,
    },
    /// Unsupported file format (unrecognized extension).
    UnsupportedFileFormat(String),
    /// I/O error occurred.
    IoError(std::io::Error),
    /// Other error with a descriptive message.
    Other(String),
}

impl RelaxError {
    /// True for the configuration errors that are rejected before any allocation.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RelaxError::InvalidGridShape { .. }
                | RelaxError::InvalidWorkerCount(_)
                | RelaxError::InvalidTolerance(_)
                | RelaxError::InvalidStepSize(_)
                | RelaxError::InvalidCheckInterval(_)
                | RelaxError::EmptySystem
        )
    }
}

impl fmt::Display for RelaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelaxError::InvalidGridShape { axis, size } => {
                write!(
                    f,
                    "invalid grid shape: axis {} has size {} (must be >= 3)",
                    axis, size
                )
            }
            RelaxError::InvalidWorkerCount(n) => {
                write!(f, "invalid worker count: {} (must be >= 1)", n)
            }
            RelaxError::InvalidTolerance(tol) => {
                write!(
                    f,
                    "invalid tolerance: {} (must be positive and finite)",
                    tol
                )
            }
            RelaxError::InvalidStepSize(tau) => {
                write!(
                    f,
                    "invalid step size: {} (must be positive and finite)",
                    tau
                )
            }
            RelaxError::InvalidCheckInterval(k) => {
                write!(f, "invalid check interval: {} (must be >= 1)", k)
            }
            RelaxError::EmptySystem => write!(f, "linear system has no unknowns"),
            RelaxError::AllocationError { rows, cols } => {
                write!(f, "failed to allocate {}x{} field buffers", rows, cols)
            }
            RelaxError::ShapeMismatch { expected, got } => {
                write!(f, "shape mismatch: expected {:?}, got {:?}", expected, got)
            }
            RelaxError::Diverged { iteration, error } => {
                write!(
                    f,
                    "diverged at iteration {}: error is {}",
                    iteration, error
                )
            }
            RelaxError::UnsupportedFileFormat(ext) => {
                write!(f, "unsupported file format: {}", ext)
            }
            RelaxError::IoError(e) => write!(f, "I/O error: {}", e),
            RelaxError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for RelaxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelaxError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RelaxError {
    fn from(e: std::io::Error) -> Self {
        RelaxError::IoError(e)
    }
}

/// Convenience type alias for Results with RelaxError.
pub type Result<T> = std::result::Result<T, RelaxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_grid_shape() {
        let e = RelaxError::InvalidGridShape { axis: 0, size: 1 };
        assert_eq!(
            e.to_string(),
            "invalid grid shape: axis 0 has size 1 (must be >= 3)"
        );
    }

    #[test]
    fn display_invalid_worker_count() {
        let e = RelaxError::InvalidWorkerCount(0);
        assert_eq!(e.to_string(), "invalid worker count: 0 (must be >= 1)");
    }

    #[test]
    fn display_allocation_error() {
        let e = RelaxError::AllocationError {
            rows: usize::MAX,
            cols: 2,
        };
        assert!(e.to_string().starts_with("failed to allocate"));
    }

    #[test]
    fn display_diverged() {
        let e = RelaxError::Diverged {
            iteration: 12,
            error: f64::INFINITY,
        };
        assert_eq!(e.to_string(), "diverged at iteration 12: error is inf");
    }

    #[test]
    fn configuration_errors_are_classified() {
        assert!(RelaxError::InvalidTolerance(-1.0).is_configuration());
        assert!(RelaxError::InvalidWorkerCount(0).is_configuration());
        assert!(RelaxError::InvalidCheckInterval(0).is_configuration());
        assert!(!RelaxError::AllocationError { rows: 1, cols: 1 }.is_configuration());
        assert!(!RelaxError::Other("x".into()).is_configuration());
    }

    #[test]
    fn display_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let e = RelaxError::IoError(io_err);
        assert!(e.to_string().contains("file not found"));
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let e: RelaxError = io_err.into();
        assert!(matches!(e, RelaxError::IoError(_)));
        assert!(std::error::Error::source(&e).is_some());
    }
}
