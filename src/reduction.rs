// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_queue::ArrayQueue;

use crate::decomposition::Chunk;
use crate::error::{RelaxError, Result};

/// The convergence statistic and the operator used to combine worker partials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    /// Maximum absolute change between `current` and `next`. Combined with max.
    MaxAbsDiff,
    /// Euclidean norm. Partials are sums of squares, combined with `+`,
    /// and the square root is taken once at the end.
    L2Norm,
}

impl Statistic {
    /// Neutral element of the combine operator.
    pub fn identity(self) -> f64 {
        0.0
    }

    /// Merge two partial values. NaN is sticky for both operators.
    pub fn combine(self, a: f64, b: f64) -> f64 {
        match self {
            Statistic::MaxAbsDiff => nan_max(a, b),
            Statistic::L2Norm => a + b,
        }
    }

    /// Turn the combined accumulator into the reported statistic.
    pub fn finish(self, acc: f64) -> f64 {
        match self {
            Statistic::MaxAbsDiff => acc,
            Statistic::L2Norm => acc.sqrt(),
        }
    }

    /// Combine partials in iteration order and finish.
    pub fn reduce<I: IntoIterator<Item = f64>>(self, partials: I) -> f64 {
        let acc = partials
            .into_iter()
            .fold(self.identity(), |acc, p| self.combine(acc, p));
        self.finish(acc)
    }
}

// f64::max drops NaN, which would hide a diverged cell from the convergence test.
fn nan_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.max(b)
    }
}

/// Largest `|next - current|` over the interior cells of the rows in `chunk`.
///
/// `next_rows` covers exactly the rows of `chunk`; `current` is the full buffer.
pub fn max_abs_diff_rows(current: &[f64], next_rows: &[f64], chunk: Chunk, cols: usize) -> f64 {
    let mut err = 0.0;
    for (r, row) in next_rows.chunks_exact(cols).enumerate() {
        let base = (chunk.lo + r) * cols;
        for i in 1..cols - 1 {
            err = nan_max(err, (row[i] - current[base + i]).abs());
        }
    }
    err
}

/// Sum of squares of `v`.
pub fn sum_squares(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum()
}

/// Euclidean norm of `v`.
pub fn l2_norm(v: &[f64]) -> f64 {
    Statistic::L2Norm.finish(sum_squares(v))
}

/// Lock-free collector for per-worker partial results.
///
/// Each worker submits one value tagged with its index. After the fork-join
/// barrier a single aggregator combines them in worker order, so the result
/// does not depend on which worker finished first.
pub struct PartialCollector {
    slots: ArrayQueue<(usize, f64)>,
    expected: usize,
    // worker index + 1 of a rejected submission, 0 if none
    overflow: AtomicUsize,
}

impl PartialCollector {
    /// Create a collector for `workers` partial values.
    pub fn new(workers: usize) -> Self {
        PartialCollector {
            slots: ArrayQueue::new(workers.max(1)),
            expected: workers,
            overflow: AtomicUsize::new(0),
        }
    }

    /// Record the partial result of `worker`.
    ///
    /// A submission beyond the collector's capacity is remembered and
    /// reported by [`PartialCollector::finish`].
    pub fn submit(&self, worker: usize, value: f64) {
        if self.slots.push((worker, value)).is_err() {
            self.overflow.store(worker + 1, Ordering::Relaxed);
        }
    }

    /// Combine all submitted partials with `statistic`.
    ///
    /// # Errors
    /// Returns an error if a partial did not fit or a worker did not submit one.
    pub fn finish(self, statistic: Statistic) -> Result<f64> {
        let overflow = self.overflow.load(Ordering::Relaxed);
        if overflow != 0 {
            return Err(RelaxError::Other(format!(
                "reduction overflowed: partial from worker {} exceeds {} slots",
                overflow - 1,
                self.expected
            )));
        }
        let mut partials: Vec<(usize, f64)> = Vec::with_capacity(self.expected);
        while let Some(p) = self.slots.pop() {
            partials.push(p);
        }
        if partials.len() != self.expected {
            return Err(RelaxError::Other(format!(
                "reduction received {} of {} partial results",
                partials.len(),
                self.expected
            )));
        }
        partials.sort_unstable_by_key(|&(worker, _)| worker);
        Ok(statistic.reduce(partials.into_iter().map(|(_, v)| v)))
    }
}
