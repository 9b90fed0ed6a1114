// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::core::{validate_shape, BoundaryCondition, Field};
use crate::decomposition::{partition, split_rows_mut, Chunk};
use crate::error::{RelaxError, Result};
use crate::reduction::{max_abs_diff_rows, PartialCollector, Statistic};
use crate::update_kernels::stencil_rows;

/// Default iteration budget for one solve call.
pub const DEFAULT_MAX_ITERATIONS: usize = 1_000_000;

/// Progress information passed to the optional callback at each convergence check.
#[derive(Debug, Clone, Copy)]
pub struct ProgressInfo {
    /// Iterations completed so far in this solve call.
    pub iteration: usize,
    /// Error measured at this check.
    pub error: f64,
    /// Elapsed time since the solve started.
    pub elapsed: Duration,
}

/// Terminal state of a relaxation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// The measured error dropped to or below the tolerance.
    Converged,
    /// The iteration budget ran out first. Not an error.
    Exhausted,
}

/// Result of a solve call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveOutcome {
    /// How the run terminated.
    pub status: SolveStatus,
    /// Iterations performed.
    pub iterations: usize,
    /// Last computed error (or residual, for the linear solver).
    pub error: f64,
    /// Wall-clock time spent.
    pub elapsed: Duration,
}

impl SolveOutcome {
    /// True if the run met its tolerance.
    pub fn converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }
}

/// Number of workers to use when none is configured.
pub(crate) fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

pub(crate) fn build_pool(workers: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("relax-worker-{}", i))
        .build()
        .map_err(|e| RelaxError::Other(e.to_string()))
}

pub(crate) fn validate_tolerance(tolerance: f64) -> Result<()> {
    if !tolerance.is_finite() || tolerance <= 0.0 {
        return Err(RelaxError::InvalidTolerance(tolerance));
    }
    Ok(())
}

/// Run the stencil over every chunk in parallel and join.
///
/// When `measure` is set, each worker also reduces its chunk's max change and
/// the combined value is returned. The error always comes from the
/// `(current, next)` pair written in this call, before any swap.
fn relax_once(
    pool: &rayon::ThreadPool,
    field: &mut Field,
    chunks: &[Chunk],
    measure: bool,
) -> Result<Option<f64>> {
    let cols = field.cols();
    let (current, next) = field.split_mut();
    let views = split_rows_mut(next, chunks, cols);
    let collector = PartialCollector::new(chunks.len());

    pool.scope(|s| {
        for (worker, (&chunk, rows)) in chunks.iter().zip(views).enumerate() {
            let collector = &collector;
            s.spawn(move |_| {
                stencil_rows(current, rows, chunk, cols);
                if measure {
                    collector.submit(worker, max_abs_diff_rows(current, rows, chunk, cols));
                }
            });
        }
    });

    if measure {
        collector.finish(Statistic::MaxAbsDiff).map(Some)
    } else {
        Ok(None)
    }
}

/// Reduce the error of the pair as it stands, without running the kernel.
fn measure_pair(pool: &rayon::ThreadPool, field: &Field, chunks: &[Chunk]) -> Result<f64> {
    let cols = field.cols();
    let (current, next) = (field.current(), field.next());
    let collector = PartialCollector::new(chunks.len());
    pool.scope(|s| {
        for (worker, &chunk) in chunks.iter().enumerate() {
            let collector = &collector;
            s.spawn(move |_| {
                let rows = &next[chunk.lo * cols..chunk.hi * cols];
                collector.submit(worker, max_abs_diff_rows(current, rows, chunk, cols));
            });
        }
    });
    collector.finish(Statistic::MaxAbsDiff)
}

/// Parallel Jacobi relaxation solver for the 2-D Laplace stencil.
///
/// The interior rows are split into one chunk per worker. Every iteration is a
/// fork-join: all chunks are relaxed from `current` into `next`, the workers
/// are joined, the error is optionally reduced, and the buffers are swapped.
///
/// Results are bitwise identical for any worker count: each cell is computed
/// from the same four inputs, and the max reduction is exact.
pub struct JacobiSolver {
    field: Field,
    tolerance: f64,
    max_iterations: usize,
    check_interval: usize,
    num_threads: usize,
    chunks: Vec<Chunk>,
    pool: Option<rayon::ThreadPool>,
    progress_callback: Option<Box<dyn Fn(ProgressInfo) + Send + Sync>>,
    total_iterations: usize,
}

impl JacobiSolver {
    /// Create a solver over `field` with the given convergence tolerance.
    ///
    /// # Errors
    /// Returns an error if the tolerance is not positive and finite.
    pub fn new(field: Field, tolerance: f64) -> Result<Self> {
        validate_tolerance(tolerance)?;
        let num_threads = default_threads();
        let chunks = partition(field.interior_rows(), num_threads)?;
        Ok(JacobiSolver {
            field,
            tolerance,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            check_interval: 1,
            num_threads,
            chunks,
            pool: None,
            progress_callback: None,
            total_iterations: 0,
        })
    }

    /// Set the number of workers (builder method).
    /// If not specified, defaults to the number of available CPU cores.
    ///
    /// # Errors
    /// Returns `InvalidWorkerCount` if `threads` is zero.
    pub fn with_threads(mut self, threads: usize) -> Result<Self> {
        self.chunks = partition(self.field.interior_rows(), threads)?;
        self.num_threads = threads;
        self.pool = None;
        Ok(self)
    }

    /// Set the iteration budget per solve call (builder method). Default is 1,000,000.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Measure the error every `k` iterations (builder method). Default is 1.
    ///
    /// The final iteration of a budget is always measured so the reported
    /// error is never stale.
    ///
    /// # Errors
    /// Returns `InvalidCheckInterval` if `k` is zero.
    pub fn with_check_interval(mut self, k: usize) -> Result<Self> {
        if k == 0 {
            return Err(RelaxError::InvalidCheckInterval(k));
        }
        self.check_interval = k;
        Ok(self)
    }

    /// Set a progress callback invoked at every convergence check (builder method).
    pub fn with_progress(mut self, callback: Box<dyn Fn(ProgressInfo) + Send + Sync>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Get a reference to the field.
    pub fn field(&self) -> &Field {
        &self.field
    }

    /// Consume the solver and return the field.
    pub fn into_field(self) -> Field {
        self.field
    }

    /// Row chunks assigned to the workers.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Configured worker count.
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Iterations performed over the lifetime of this solver.
    pub fn total_iterations(&self) -> usize {
        self.total_iterations
    }

    /// Save the current buffer to a file. Format is inferred from the extension.
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        crate::io::save_field(&self.field, path.as_ref())
    }

    fn ensure_pool(&mut self) -> Result<()> {
        if self.pool.is_none() {
            self.pool = Some(build_pool(self.num_threads)?);
        }
        Ok(())
    }

    /// Max change between the current and next buffers as they stand.
    pub fn current_error(&mut self) -> Result<f64> {
        self.ensure_pool()?;
        let pool = self.pool.as_ref().ok_or_else(|| RelaxError::Other("no pool".into()))?;
        measure_pair(pool, &self.field, &self.chunks)
    }

    /// Perform exactly one measured iteration and swap. Returns its error.
    pub fn step(&mut self) -> Result<f64> {
        self.ensure_pool()?;
        let pool = self.pool.as_ref().ok_or_else(|| RelaxError::Other("no pool".into()))?;
        let error = relax_once(pool, &mut self.field, &self.chunks, true)?
            .ok_or_else(|| RelaxError::Other("unmeasured step".into()))?;
        self.field.swap();
        self.total_iterations += 1;
        Ok(error)
    }

    /// Iterate until the error meets the tolerance or the budget runs out.
    ///
    /// Continues from the field's present state, so calling `solve` again
    /// resumes where the previous call stopped.
    ///
    /// # Parameters
    /// - `progress_cb`: Optional callback for progress updates (overrides builder-set callback)
    ///
    /// # Errors
    /// Returns `Diverged` if a measured error is not finite.
    pub fn solve(
        &mut self,
        progress_cb: Option<&(dyn Fn(ProgressInfo) + Sync)>,
    ) -> Result<SolveOutcome> {
        let start = Instant::now();
        self.ensure_pool()?;
        let pool = self.pool.as_ref().ok_or_else(|| RelaxError::Other("no pool".into()))?;

        debug!(
            "relaxing {}x{} field: {} workers, tolerance {:e}, budget {}",
            self.field.rows(),
            self.field.cols(),
            self.num_threads,
            self.tolerance,
            self.max_iterations
        );

        let mut done = 0usize;
        let mut last_error = None;
        let status = loop {
            if done >= self.max_iterations {
                break SolveStatus::Exhausted;
            }
            let due = (done + 1) % self.check_interval == 0 || done + 1 == self.max_iterations;
            let measured = relax_once(pool, &mut self.field, &self.chunks, due)?;
            self.field.swap();
            done += 1;
            self.total_iterations += 1;

            let Some(error) = measured else { continue };
            if !error.is_finite() {
                warn!("error became {} at iteration {}", error, done);
                return Err(RelaxError::Diverged {
                    iteration: done,
                    error,
                });
            }
            debug!("{:>8}, {:.6}", done, error);
            let info = ProgressInfo {
                iteration: done,
                error,
                elapsed: start.elapsed(),
            };
            if let Some(cb) = progress_cb {
                cb(info);
            } else if let Some(cb) = &self.progress_callback {
                cb(info);
            }
            last_error = Some(error);
            if error <= self.tolerance {
                break SolveStatus::Converged;
            }
        };

        let error = match last_error {
            Some(e) => e,
            None => measure_pair(pool, &self.field, &self.chunks)?,
        };
        let outcome = SolveOutcome {
            status,
            iterations: done,
            error,
            elapsed: start.elapsed(),
        };
        info!(
            "{:?} after {} iterations, error {:e} ({:.3}s)",
            outcome.status,
            outcome.iterations,
            outcome.error,
            outcome.elapsed.as_secs_f64()
        );
        Ok(outcome)
    }
}

/// Parameters for a complete Laplace solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaplaceParams {
    /// Grid rows (>= 3).
    pub rows: usize,
    /// Grid columns (>= 3).
    pub cols: usize,
    /// Convergence tolerance on the max change per iteration.
    pub tolerance: f64,
    /// Iteration budget.
    pub max_iterations: usize,
    /// Worker count.
    pub workers: usize,
    /// Measure the error every this many iterations.
    pub check_interval: usize,
}

impl Default for LaplaceParams {
    fn default() -> Self {
        LaplaceParams {
            rows: 128,
            cols: 128,
            tolerance: 1e-6,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            workers: default_threads(),
            check_interval: 1,
        }
    }
}

impl LaplaceParams {
    /// Check every parameter without allocating anything.
    pub fn validate(&self) -> Result<()> {
        validate_shape(self.rows, self.cols)?;
        if self.workers == 0 {
            return Err(RelaxError::InvalidWorkerCount(self.workers));
        }
        validate_tolerance(self.tolerance)?;
        if self.check_interval == 0 {
            return Err(RelaxError::InvalidCheckInterval(self.check_interval));
        }
        Ok(())
    }

    /// Validate, then allocate a field seeded with `boundary` and wrap it in
    /// a configured solver.
    ///
    /// # Errors
    /// Configuration errors are returned before any buffer is allocated.
    pub fn build_solver<B>(&self, boundary: &B) -> Result<JacobiSolver>
    where
        B: BoundaryCondition + ?Sized,
    {
        self.validate()?;
        let field = Field::with_boundary(self.rows, self.cols, boundary)?;
        JacobiSolver::new(field, self.tolerance)?
            .with_threads(self.workers)?
            .with_max_iterations(self.max_iterations)
            .with_check_interval(self.check_interval)
    }
}

/// Allocate a field, seed it with `boundary`, and relax it to convergence.
///
/// Configuration is validated before any buffer is allocated. Returns the
/// final field (its `current` buffer holds the last iterate) and the outcome.
pub fn solve_laplace<B>(params: &LaplaceParams, boundary: &B) -> Result<(Field, SolveOutcome)>
where
    B: BoundaryCondition + ?Sized,
{
    let mut solver = params.build_solver(boundary)?;
    let outcome = solver.solve(None)?;
    Ok((solver.into_field(), outcome))
}
