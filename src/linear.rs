// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Simple-iteration (Richardson) solver for dense linear systems `A x = b`.
//!
//! Each iteration computes the residual `r = A x - b` and the update
//! `x_next = x - tau * r` row-parallel, with the same chunked fork-join
//! structure as the stencil solver. The stopping rule is the relative
//! residual `|r| / |b|` (absolute `|r|` when `b` is zero).

use std::time::Instant;

use log::{debug, info, warn};

use crate::core::DoubleBuffer;
use crate::decomposition::{partition_from, split_rows_mut, Chunk};
use crate::error::{RelaxError, Result};
use crate::reduction::{l2_norm, PartialCollector, Statistic};
use crate::scheduler::{
    build_pool, default_threads, validate_tolerance, SolveOutcome, SolveStatus,
    DEFAULT_MAX_ITERATIONS,
};
use crate::update_kernels::{matvec_rows, simple_iteration_rows};

/// A square dense system `A x = b` with `A` stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSystem {
    n: usize,
    matrix: Vec<f64>,
    rhs: Vec<f64>,
}

impl LinearSystem {
    /// Build a system from an `n` x `n` row-major matrix and a length-`n` right-hand side.
    ///
    /// # Errors
    /// Returns `EmptySystem` if `rhs` is empty, or `ShapeMismatch` if the
    /// matrix is not `n * n` long.
    pub fn new(matrix: Vec<f64>, rhs: Vec<f64>) -> Result<Self> {
        let n = rhs.len();
        if n == 0 {
            return Err(RelaxError::EmptySystem);
        }
        if n.checked_mul(n) != Some(matrix.len()) {
            return Err(RelaxError::ShapeMismatch {
                expected: vec![n, n],
                got: vec![matrix.len()],
            });
        }
        Ok(LinearSystem { n, matrix, rhs })
    }

    /// Number of unknowns.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Row-major coefficient matrix.
    pub fn matrix(&self) -> &[f64] {
        &self.matrix
    }

    /// Right-hand side.
    pub fn rhs(&self) -> &[f64] {
        &self.rhs
    }

    /// `A x`, computed sequentially.
    pub fn apply(&self, x: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.n];
        matvec_rows(&self.matrix, x, &mut out, Chunk { lo: 0, hi: self.n });
        out
    }

    /// `|A x - b|`.
    pub fn residual_norm(&self, x: &[f64]) -> f64 {
        let ax = self.apply(x);
        let r: Vec<f64> = ax.iter().zip(&self.rhs).map(|(a, b)| a - b).collect();
        l2_norm(&r)
    }
}

/// The test system used by the benchmarks: 2 on the diagonal, 1 elsewhere,
/// right-hand side `n + 1`. Its exact solution is all ones.
pub fn diagonally_dominant_system(n: usize) -> Result<LinearSystem> {
    if n == 0 {
        return Err(RelaxError::EmptySystem);
    }
    let mut matrix = vec![1.0; n * n];
    for i in 0..n {
        matrix[i * n + i] = 2.0;
    }
    LinearSystem::new(matrix, vec![(n + 1) as f64; n])
}

/// Solution vector and outcome of a linear solve.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSolution {
    /// The last iterate. Its relative residual is `outcome.error`.
    pub x: Vec<f64>,
    /// Termination state, iteration count and relative residual.
    pub outcome: SolveOutcome,
}

/// Parallel simple-iteration solver.
pub struct SimpleIteration {
    system: LinearSystem,
    tau: f64,
    tolerance: f64,
    max_iterations: usize,
    num_threads: usize,
}

impl SimpleIteration {
    /// Create a solver with relaxation step `tau` and relative-residual tolerance.
    ///
    /// # Errors
    /// Returns an error if `tau` or `tolerance` is not positive and finite.
    pub fn new(system: LinearSystem, tau: f64, tolerance: f64) -> Result<Self> {
        if !tau.is_finite() || tau <= 0.0 {
            return Err(RelaxError::InvalidStepSize(tau));
        }
        validate_tolerance(tolerance)?;
        Ok(SimpleIteration {
            system,
            tau,
            tolerance,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            num_threads: default_threads(),
        })
    }

    /// Set the number of workers (builder method).
    ///
    /// # Errors
    /// Returns `InvalidWorkerCount` if `threads` is zero.
    pub fn with_threads(mut self, threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(RelaxError::InvalidWorkerCount(threads));
        }
        self.num_threads = threads;
        Ok(self)
    }

    /// Set the iteration budget (builder method). Default is 1,000,000.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// The system being solved.
    pub fn system(&self) -> &LinearSystem {
        &self.system
    }

    /// Iterate from `initial_guess` until the relative residual meets the tolerance.
    ///
    /// The residual is measured for the current iterate in the same pass that
    /// produces the next one; on convergence the measured iterate is returned.
    ///
    /// # Errors
    /// Returns `ShapeMismatch` if the guess has the wrong length, or `Diverged`
    /// if the residual becomes non-finite.
    pub fn solve(&self, initial_guess: Vec<f64>) -> Result<LinearSolution> {
        let n = self.system.n();
        if initial_guess.len() != n {
            return Err(RelaxError::ShapeMismatch {
                expected: vec![n],
                got: vec![initial_guess.len()],
            });
        }
        let start = Instant::now();
        let chunks = partition_from(0, n, self.num_threads)?;
        let pool = build_pool(self.num_threads)?;
        let matrix = self.system.matrix();
        let rhs = self.system.rhs();
        let norm_b = l2_norm(rhs);
        let scale = if norm_b > 0.0 { norm_b } else { 1.0 };
        let tau = self.tau;

        let mut x = DoubleBuffer::from_initial(initial_guess);
        let mut done = 0usize;
        let (status, residual) = loop {
            let (current, next) = x.split_mut();
            let views = split_rows_mut(next, &chunks, 1);
            let collector = PartialCollector::new(chunks.len());
            pool.scope(|s| {
                for (worker, (&chunk, rows)) in chunks.iter().zip(views).enumerate() {
                    let collector = &collector;
                    s.spawn(move |_| {
                        let sum_sq = simple_iteration_rows(matrix, current, rhs, tau, rows, chunk);
                        collector.submit(worker, sum_sq);
                    });
                }
            });
            let residual = collector.finish(Statistic::L2Norm)? / scale;

            if !residual.is_finite() {
                warn!("residual became {} at iteration {}", residual, done);
                return Err(RelaxError::Diverged {
                    iteration: done,
                    error: residual,
                });
            }
            if done % 1000 == 0 {
                debug!("{:>8}, {:.6e}", done, residual);
            }
            if residual <= self.tolerance {
                break (SolveStatus::Converged, residual);
            }
            if done >= self.max_iterations {
                break (SolveStatus::Exhausted, residual);
            }
            x.swap();
            done += 1;
        };

        let outcome = SolveOutcome {
            status,
            iterations: done,
            error: residual,
            elapsed: start.elapsed(),
        };
        info!(
            "{:?} after {} iterations, relative residual {:e} ({:.3}s)",
            outcome.status,
            outcome.iterations,
            outcome.error,
            outcome.elapsed.as_secs_f64()
        );
        Ok(LinearSolution {
            x: x.into_current(),
            outcome,
        })
    }
}

/// Solve `A x = b` by simple iteration with default worker count and budget.
///
/// `matrix` is `n` x `n` row-major, where `n = rhs.len()`.
pub fn solve_linear(
    matrix: Vec<f64>,
    initial_guess: Vec<f64>,
    rhs: Vec<f64>,
    tau: f64,
    tolerance: f64,
) -> Result<LinearSolution> {
    let system = LinearSystem::new(matrix, rhs)?;
    SimpleIteration::new(system, tau, tolerance)?.solve(initial_guess)
}
