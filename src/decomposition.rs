// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::ops::Range;

use crate::error::{RelaxError, Result};

/// A contiguous half-open row range `[lo, hi)` owned by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// First row (inclusive).
    pub lo: usize,
    /// One past the last row.
    pub hi: usize,
}

impl Chunk {
    /// Number of rows in the chunk.
    pub fn len(&self) -> usize {
        self.hi - self.lo
    }

    /// True if the chunk holds no rows.
    pub fn is_empty(&self) -> bool {
        self.lo == self.hi
    }

    /// The chunk's rows as a range.
    pub fn rows(&self) -> Range<usize> {
        self.lo..self.hi
    }
}

/// Partition the interior rows `[1, interior_extent + 1)` among `worker_count` workers.
///
/// Every worker but the last gets `interior_extent / worker_count` rows; the last
/// absorbs the remainder. With more workers than rows the leading chunks are empty.
///
/// # Errors
/// Returns `InvalidWorkerCount` if `worker_count` is zero.
pub fn partition(interior_extent: usize, worker_count: usize) -> Result<Vec<Chunk>> {
    partition_from(1, interior_extent, worker_count)
}

/// Partition `[offset, offset + extent)` with the same remainder policy as [`partition`].
pub fn partition_from(offset: usize, extent: usize, worker_count: usize) -> Result<Vec<Chunk>> {
    if worker_count == 0 {
        return Err(RelaxError::InvalidWorkerCount(worker_count));
    }
    let base = extent / worker_count;
    let last = extent - base * (worker_count - 1);

    let mut chunks = Vec::with_capacity(worker_count);
    let mut lo = offset;
    for w in 0..worker_count {
        let len = if w + 1 == worker_count { last } else { base };
        chunks.push(Chunk { lo, hi: lo + len });
        lo += len;
    }
    Ok(chunks)
}

/// Split a row-major buffer into one disjoint mutable view per chunk.
///
/// `chunks` must be contiguous and ascending, as produced by [`partition`].
/// View `k` covers exactly the rows of `chunks[k]`.
pub fn split_rows_mut<'a>(buf: &'a mut [f64], chunks: &[Chunk], cols: usize) -> Vec<&'a mut [f64]> {
    let mut views = Vec::with_capacity(chunks.len());
    let start = chunks.first().map_or(0, |c| c.lo * cols);
    let (_, mut rest) = buf.split_at_mut(start);
    let mut expected_lo = chunks.first().map_or(0, |c| c.lo);
    for chunk in chunks {
        debug_assert_eq!(chunk.lo, expected_lo, "chunks must be contiguous");
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(chunk.len() * cols);
        views.push(head);
        rest = tail;
        expected_lo = chunk.hi;
    }
    views
}
