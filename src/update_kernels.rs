// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use crate::decomposition::Chunk;

/// Five-point Jacobi average for interior cell `(j, i)` of `current`.
#[inline]
pub fn stencil_point(current: &[f64], j: usize, i: usize, cols: usize) -> f64 {
    let idx = j * cols + i;
    0.25 * (current[idx + 1] + current[idx - 1] + current[idx - cols] + current[idx + cols])
}

/// Apply the Jacobi stencil to every interior cell of the rows in `chunk`.
///
/// `current` is the full read buffer. `next_rows` is the slice of the write
/// buffer covering exactly `chunk` (see [`crate::decomposition::split_rows_mut`]).
/// Columns 0 and `cols - 1` of each row are left untouched.
#[allow(clippy::needless_range_loop)]
pub fn stencil_rows(current: &[f64], next_rows: &mut [f64], chunk: Chunk, cols: usize) {
    debug_assert_eq!(next_rows.len(), chunk.len() * cols);
    for (r, row) in next_rows.chunks_exact_mut(cols).enumerate() {
        let j = chunk.lo + r;
        let above = &current[(j - 1) * cols..j * cols];
        let here = &current[j * cols..(j + 1) * cols];
        let below = &current[(j + 1) * cols..(j + 2) * cols];
        for i in 1..cols - 1 {
            row[i] = 0.25 * (here[i + 1] + here[i - 1] + above[i] + below[i]);
        }
    }
}

/// Dot product of a matrix row with a vector.
#[inline]
pub fn row_dot(row: &[f64], vector: &[f64]) -> f64 {
    row.iter().zip(vector).map(|(a, x)| a * x).sum()
}

/// Matrix-vector product restricted to the rows of `chunk`.
///
/// `matrix` is `n` x `n` row-major; `out_rows[k]` receives row `chunk.lo + k`.
pub fn matvec_rows(matrix: &[f64], vector: &[f64], out_rows: &mut [f64], chunk: Chunk) {
    let n = vector.len();
    for (k, out) in out_rows.iter_mut().enumerate() {
        let i = chunk.lo + k;
        *out = row_dot(&matrix[i * n..(i + 1) * n], vector);
    }
}

/// One simple-iteration update for the rows in `chunk`.
///
/// Computes the residual `r_i = (A x)_i - b_i` and writes
/// `x_next_i = x_i - tau * r_i`. Returns the chunk's sum of squared residuals.
pub fn simple_iteration_rows(
    matrix: &[f64],
    x: &[f64],
    rhs: &[f64],
    tau: f64,
    next_rows: &mut [f64],
    chunk: Chunk,
) -> f64 {
    let n = x.len();
    let mut sum_sq = 0.0;
    for (k, out) in next_rows.iter_mut().enumerate() {
        let i = chunk.lo + k;
        let r = row_dot(&matrix[i * n..(i + 1) * n], x) - rhs[i];
        *out = x[i] - tau * r;
        sum_sq += r * r;
    }
    sum_sq
}
