// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Parallel double-buffered relaxation solvers.
//!
//! The main solver relaxes a 2-D scalar field with the Jacobi five-point
//! stencil until the largest per-iteration change drops below a tolerance.
//! Interior rows are split into one contiguous chunk per worker; each
//! iteration is a fork-join over a Rayon pool that reads the current buffer,
//! writes the next one, reduces the per-worker errors and swaps the buffers.
//! A simple-iteration solver for dense linear systems `A x = b` shares the
//! same decomposition, double buffering and reduction.

#![warn(missing_docs)]

/// Field storage, double buffering and boundary initializers.
pub mod core;
/// Row partitioning of the iteration space across workers.
pub mod decomposition;
/// Error types for the library.
pub mod error;
/// Text, .npy and .mat output, and loading of initial grids.
pub mod io;
/// Simple-iteration solver for dense linear systems.
pub mod linear;
/// Per-worker partial statistics and their combination.
pub mod reduction;
/// The parallel relaxation loop.
pub mod scheduler;
/// Stencil and matrix-row update kernels.
pub mod update_kernels;

pub use crate::core::{BoundaryCondition, CornerInterpolation, Field, FixedTopEdge, FromGrid};
pub use crate::error::{RelaxError, Result};
pub use crate::linear::{solve_linear, LinearSolution, LinearSystem, SimpleIteration};
pub use crate::scheduler::{
    solve_laplace, JacobiSolver, LaplaceParams, ProgressInfo, SolveOutcome, SolveStatus,
};
