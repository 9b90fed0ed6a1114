// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{RelaxError, Result};

/// Allocate a zero-filled buffer, reporting failure instead of aborting.
fn try_zeroed(len: usize) -> Option<Box<[f64]>> {
    let mut data: Vec<f64> = Vec::new();
    data.try_reserve_exact(len).ok()?;
    data.resize(len, 0.0);
    Some(data.into_boxed_slice())
}

/// Two same-length buffers, one designated "current" and the other "next".
///
/// Swapping flips which buffer plays which role; no element is ever copied.
#[derive(Debug, Clone)]
pub struct DoubleBuffer {
    buffers: [Box<[f64]>; 2],
    current: usize,
}

impl DoubleBuffer {
    /// Allocate two zero-filled buffers of `len` elements.
    /// Returns `None` if memory cannot be obtained.
    pub fn zeroed(len: usize) -> Option<Self> {
        Some(DoubleBuffer {
            buffers: [try_zeroed(len)?, try_zeroed(len)?],
            current: 0,
        })
    }

    /// Create a double buffer whose two halves both start as `initial`.
    pub fn from_initial(initial: Vec<f64>) -> Self {
        let next = initial.clone().into_boxed_slice();
        DoubleBuffer {
            buffers: [initial.into_boxed_slice(), next],
            current: 0,
        }
    }

    /// Number of elements in each buffer.
    pub fn len(&self) -> usize {
        self.buffers[0].len()
    }

    /// True if the buffers hold no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read view of the current buffer.
    pub fn current(&self) -> &[f64] {
        &self.buffers[self.current]
    }

    /// Read view of the next buffer.
    pub fn next(&self) -> &[f64] {
        &self.buffers[self.current ^ 1]
    }

    /// Read the current buffer while writing the next one.
    pub fn split_mut(&mut self) -> (&[f64], &mut [f64]) {
        let [a, b] = &mut self.buffers;
        if self.current == 0 {
            (&a[..], &mut b[..])
        } else {
            (&b[..], &mut a[..])
        }
    }

    /// Mutable access to both buffers as `(current, next)`.
    pub fn both_mut(&mut self) -> (&mut [f64], &mut [f64]) {
        let [a, b] = &mut self.buffers;
        if self.current == 0 {
            (&mut a[..], &mut b[..])
        } else {
            (&mut b[..], &mut a[..])
        }
    }

    /// Exchange the roles of the two buffers in O(1).
    pub fn swap(&mut self) {
        self.current ^= 1;
    }

    /// Consume the double buffer and return the current buffer.
    pub fn into_current(self) -> Vec<f64> {
        let [a, b] = self.buffers;
        if self.current == 0 {
            a.into_vec()
        } else {
            b.into_vec()
        }
    }
}

/// Seeds the fixed edge values of a field before the first iteration.
///
/// Implementations receive both buffers (current, next) in row-major order and
/// must write the same boundary values into each. Interior cells should be
/// left untouched unless the initializer deliberately supplies a full grid.
pub trait BoundaryCondition {
    /// Write boundary values into both buffers of a `rows` x `cols` grid.
    fn apply(&self, current: &mut [f64], next: &mut [f64], rows: usize, cols: usize)
        -> Result<()>;
}

impl<F> BoundaryCondition for F
where
    F: Fn(&mut [f64], &mut [f64], usize, usize),
{
    fn apply(
        &self,
        current: &mut [f64],
        next: &mut [f64],
        rows: usize,
        cols: usize,
    ) -> Result<()> {
        self(current, next, rows, cols);
        Ok(())
    }
}

/// Corner values linearly interpolated along all four edges.
///
/// Corners are given clockwise from the top-left:
/// `[top_left, top_right, bottom_right, bottom_left]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerInterpolation {
    /// Corner values, clockwise from the top-left.
    pub corners: [f64; 4],
}

impl CornerInterpolation {
    /// Create an initializer from clockwise corner values.
    pub fn new(corners: [f64; 4]) -> Self {
        CornerInterpolation { corners }
    }
}

impl Default for CornerInterpolation {
    fn default() -> Self {
        CornerInterpolation::new([10.0, 20.0, 30.0, 20.0])
    }
}

fn lerp(a: f64, b: f64, k: usize, n: usize) -> f64 {
    a + (b - a) * k as f64 / (n - 1) as f64
}

impl BoundaryCondition for CornerInterpolation {
    fn apply(
        &self,
        current: &mut [f64],
        next: &mut [f64],
        rows: usize,
        cols: usize,
    ) -> Result<()> {
        let [tl, tr, br, bl] = self.corners;
        let last_row = (rows - 1) * cols;
        for buf in [current, next] {
            for i in 0..cols {
                buf[i] = lerp(tl, tr, i, cols);
                buf[last_row + i] = lerp(bl, br, i, cols);
            }
            for j in 0..rows {
                buf[j * cols] = lerp(tl, bl, j, rows);
                buf[j * cols + cols - 1] = lerp(tr, br, j, rows);
            }
        }
        Ok(())
    }
}

/// Top row held at a constant value; all other edges stay zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedTopEdge {
    /// Value written to every cell of row 0.
    pub value: f64,
}

impl BoundaryCondition for FixedTopEdge {
    fn apply(
        &self,
        current: &mut [f64],
        next: &mut [f64],
        _rows: usize,
        cols: usize,
    ) -> Result<()> {
        current[..cols].fill(self.value);
        next[..cols].fill(self.value);
        Ok(())
    }
}

/// Seeds both buffers from a complete grid, interior included.
#[derive(Debug, Clone, PartialEq)]
pub struct FromGrid {
    shape: [usize; 2],
    data: Vec<f64>,
}

impl FromGrid {
    /// Wrap row-major `data` of the given `[rows, cols]` shape.
    ///
    /// # Errors
    /// Returns `ShapeMismatch` if `data.len()` differs from `rows * cols`.
    pub fn new(shape: [usize; 2], data: Vec<f64>) -> Result<Self> {
        if shape[0].checked_mul(shape[1]) != Some(data.len()) {
            return Err(RelaxError::ShapeMismatch {
                expected: shape.to_vec(),
                got: vec![data.len()],
            });
        }
        Ok(FromGrid { shape, data })
    }

    /// Shape of the wrapped grid.
    pub fn shape(&self) -> [usize; 2] {
        self.shape
    }
}

impl BoundaryCondition for FromGrid {
    fn apply(
        &self,
        current: &mut [f64],
        next: &mut [f64],
        rows: usize,
        cols: usize,
    ) -> Result<()> {
        if self.shape != [rows, cols] {
            return Err(RelaxError::ShapeMismatch {
                expected: vec![rows, cols],
                got: self.shape.to_vec(),
            });
        }
        current.copy_from_slice(&self.data);
        next.copy_from_slice(&self.data);
        Ok(())
    }
}

/// A 2-D scalar field stored as a row-major double buffer.
///
/// Both buffers share the shape `(rows, cols)` for the lifetime of the field.
/// Only the stencil kernel writes to `next`, and only interior cells; the
/// boundary ring keeps whatever the boundary initializer wrote.
#[derive(Debug, Clone)]
pub struct Field {
    rows: usize,
    cols: usize,
    buffers: DoubleBuffer,
}

impl Field {
    /// Allocate a zero-initialized `rows` x `cols` field.
    ///
    /// # Errors
    /// Returns `InvalidGridShape` if either dimension is below 3 (no interior
    /// cell), or `AllocationError` if the size overflows or memory is unavailable.
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        validate_shape(rows, cols)?;
        let len = rows
            .checked_mul(cols)
            .filter(|n| n.checked_mul(std::mem::size_of::<f64>()).is_some())
            .ok_or(RelaxError::AllocationError { rows, cols })?;
        let buffers =
            DoubleBuffer::zeroed(len).ok_or(RelaxError::AllocationError { rows, cols })?;
        Ok(Field {
            rows,
            cols,
            buffers,
        })
    }

    /// Allocate a field and seed it with the given boundary initializer.
    pub fn with_boundary<B>(rows: usize, cols: usize, boundary: &B) -> Result<Self>
    where
        B: BoundaryCondition + ?Sized,
    {
        let mut field = Field::new(rows, cols)?;
        field.apply_boundary(boundary)?;
        Ok(field)
    }

    /// Run a boundary initializer over both buffers.
    pub fn apply_boundary<B>(&mut self, boundary: &B) -> Result<()>
    where
        B: BoundaryCondition + ?Sized,
    {
        let (rows, cols) = (self.rows, self.cols);
        let (current, next) = self.buffers.both_mut();
        boundary.apply(current, next, rows, cols)
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Shape as `[rows, cols]`.
    pub fn shape(&self) -> [usize; 2] {
        [self.rows, self.cols]
    }

    /// Number of interior rows (rows excluding the top and bottom boundary).
    pub fn interior_rows(&self) -> usize {
        self.rows - 2
    }

    /// Row-major index of `(row, col)`.
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    /// Value of the current buffer at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.buffers.current()[self.index(row, col)]
    }

    /// True if `(row, col)` lies on the fixed boundary ring.
    pub fn is_boundary(&self, row: usize, col: usize) -> bool {
        row == 0 || col == 0 || row + 1 == self.rows || col + 1 == self.cols
    }

    /// Read view of the current buffer.
    pub fn current(&self) -> &[f64] {
        self.buffers.current()
    }

    /// Read view of the next buffer.
    pub fn next(&self) -> &[f64] {
        self.buffers.next()
    }

    /// Read `current` while writing `next`.
    pub fn split_mut(&mut self) -> (&[f64], &mut [f64]) {
        self.buffers.split_mut()
    }

    /// Exchange current and next in O(1).
    pub fn swap(&mut self) {
        self.buffers.swap();
    }

    /// Consume the field and return the current buffer.
    pub fn into_current(self) -> Vec<f64> {
        self.buffers.into_current()
    }
}

/// Reject shapes with no interior cell.
pub fn validate_shape(rows: usize, cols: usize) -> Result<()> {
    for (axis, size) in [rows, cols].into_iter().enumerate() {
        if size < 3 {
            return Err(RelaxError::InvalidGridShape { axis, size });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_field_is_zeroed() {
        let field = Field::new(5, 4).unwrap();
        assert_eq!(field.shape(), [5, 4]);
        assert_eq!(field.current().len(), 20);
        assert!(field.current().iter().all(|&v| v == 0.0));
        assert!(field.next().iter().all(|&v| v == 0.0));
        assert_eq!(field.interior_rows(), 3);
    }

    #[test]
    fn invalid_grid_shape() {
        assert!(matches!(
            Field::new(2, 10),
            Err(RelaxError::InvalidGridShape { axis: 0, size: 2 })
        ));
        assert!(matches!(
            Field::new(10, 0),
            Err(RelaxError::InvalidGridShape { axis: 1, size: 0 })
        ));
    }

    #[test]
    fn overflowing_shape_is_allocation_error() {
        let result = Field::new(usize::MAX / 2, 3);
        assert!(matches!(result, Err(RelaxError::AllocationError { .. })));
    }

    #[test]
    fn swap_exchanges_roles_without_copying() {
        let mut field = Field::new(3, 3).unwrap();
        let before_current = field.current().as_ptr();
        let before_next = field.next().as_ptr();
        {
            let (_, next) = field.split_mut();
            next[4] = 7.0;
        }
        field.swap();
        assert_eq!(field.current().as_ptr(), before_next);
        assert_eq!(field.next().as_ptr(), before_current);
        assert_eq!(field.get(1, 1), 7.0);
        field.swap();
        assert_eq!(field.get(1, 1), 0.0);
    }

    #[test]
    fn into_current_follows_swaps() {
        let mut buf = DoubleBuffer::from_initial(vec![1.0, 2.0]);
        buf.split_mut().1.copy_from_slice(&[3.0, 4.0]);
        buf.swap();
        assert_eq!(buf.into_current(), vec![3.0, 4.0]);
    }

    #[test]
    fn corner_interpolation_4x4() {
        let field = Field::with_boundary(4, 4, &CornerInterpolation::default()).unwrap();
        let step = 10.0 / 3.0;
        for k in 0..4 {
            let kf = k as f64;
            assert!((field.get(0, k) - (10.0 + kf * step)).abs() < 1e-12);
            assert!((field.get(k, 0) - (10.0 + kf * step)).abs() < 1e-12);
            assert!((field.get(k, 3) - (20.0 + kf * step)).abs() < 1e-12);
            assert!((field.get(3, k) - (20.0 + kf * step)).abs() < 1e-12);
        }
        assert_eq!(field.get(1, 1), 0.0);
        assert_eq!(field.get(2, 2), 0.0);
        assert_eq!(field.current(), field.next());
    }

    #[test]
    fn fixed_top_edge_only_touches_row_zero() {
        let field = Field::with_boundary(4, 5, &FixedTopEdge { value: 1.0 }).unwrap();
        for i in 0..5 {
            assert_eq!(field.get(0, i), 1.0);
        }
        assert!(field.current()[5..].iter().all(|&v| v == 0.0));
        assert_eq!(field.current(), field.next());
    }

    #[test]
    fn closure_boundary() {
        let seed = |cur: &mut [f64], next: &mut [f64], _rows: usize, _cols: usize| {
            cur[0] = 5.0;
            next[0] = 5.0;
        };
        let field = Field::with_boundary(3, 3, &seed).unwrap();
        assert_eq!(field.get(0, 0), 5.0);
        assert_eq!(field.next()[0], 5.0);
    }

    #[test]
    fn from_grid_checks_shape() {
        let grid = FromGrid::new([3, 3], (0..9).map(|v| v as f64).collect()).unwrap();
        let field = Field::with_boundary(3, 3, &grid).unwrap();
        assert_eq!(field.get(2, 2), 8.0);

        let result = Field::with_boundary(4, 3, &grid);
        assert!(matches!(result, Err(RelaxError::ShapeMismatch { .. })));
        assert!(FromGrid::new([2, 2], vec![0.0; 3]).is_err());
    }

    #[test]
    fn boundary_classification() {
        let field = Field::new(4, 5).unwrap();
        assert!(field.is_boundary(0, 2));
        assert!(field.is_boundary(3, 2));
        assert!(field.is_boundary(2, 0));
        assert!(field.is_boundary(2, 4));
        assert!(!field.is_boundary(1, 1));
        assert!(!field.is_boundary(2, 3));
    }
}
