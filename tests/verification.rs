// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use approx::assert_abs_diff_eq;

use jacobi_relax::core::{CornerInterpolation, Field, FixedTopEdge, FromGrid};
use jacobi_relax::decomposition::partition;
use jacobi_relax::error::RelaxError;
use jacobi_relax::io;
use jacobi_relax::linear::{diagonally_dominant_system, solve_linear, SimpleIteration};
use jacobi_relax::scheduler::{solve_laplace, JacobiSolver, LaplaceParams, SolveStatus};

fn corner_solver(rows: usize, cols: usize, tolerance: f64, threads: usize) -> JacobiSolver {
    let field = Field::with_boundary(rows, cols, &CornerInterpolation::default()).unwrap();
    JacobiSolver::new(field, tolerance)
        .unwrap()
        .with_threads(threads)
        .unwrap()
}

/// Plain nested-loop Jacobi sweep with no decomposition, returning the
/// current buffer after `iterations` sweeps and the last max change.
fn sequential_reference(field: &Field, iterations: usize) -> (Vec<f64>, f64) {
    let (rows, cols) = (field.rows(), field.cols());
    let mut cur = field.current().to_vec();
    let mut next = field.next().to_vec();
    let mut err = 0.0_f64;
    for _ in 0..iterations {
        err = 0.0;
        for j in 1..rows - 1 {
            for i in 1..cols - 1 {
                let v = 0.25
                    * (cur[j * cols + i + 1]
                        + cur[j * cols + i - 1]
                        + cur[(j - 1) * cols + i]
                        + cur[(j + 1) * cols + i]);
                next[j * cols + i] = v;
                err = err.max((v - cur[j * cols + i]).abs());
            }
        }
        std::mem::swap(&mut cur, &mut next);
    }
    (cur, err)
}

/// Test 1: Worker-count independence.
/// For w in {1, 2, 4, extent, extent + 5} the chunks tile the interior
/// exactly and the relaxed field is identical after the same iterations.
#[test]
fn worker_count_does_not_change_results() {
    let (rows, cols) = (18, 11);
    let extent = rows - 2;
    let iterations = 60;

    let mut fields = Vec::new();
    for w in [1, 2, 4, extent, extent + 5] {
        let chunks = partition(extent, w).unwrap();
        assert_eq!(chunks.len(), w);
        let mut next_row = 1;
        for c in &chunks {
            assert_eq!(c.lo, next_row);
            next_row = c.hi;
        }
        assert_eq!(next_row, extent + 1);

        let mut solver = corner_solver(rows, cols, 1e-30, w).with_max_iterations(iterations);
        let outcome = solver.solve(None).unwrap();
        assert_eq!(outcome.iterations, iterations);
        fields.push((w, outcome.error, solver.into_field().into_current()));
    }

    let (_, ref_error, reference) = &fields[0];
    for (w, error, field) in &fields[1..] {
        assert_eq!(field.len(), reference.len(), "w={}", w);
        for (a, b) in reference.iter().zip(field) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(*ref_error, *error, epsilon = 1e-12);
    }
}

/// Test 2: Idempotence after convergence.
/// One more iteration past convergence changes the field by less than the tolerance.
#[test]
fn extra_iteration_after_convergence_is_small() {
    let tolerance = 1e-6;
    let mut solver = corner_solver(24, 24, tolerance, 4);
    let outcome = solver.solve(None).unwrap();
    assert!(outcome.converged());

    let extra = solver.step().unwrap();
    assert!(extra < tolerance, "extra step changed field by {}", extra);
    assert!(extra <= outcome.error);
}

/// Test 3: Boundary cells are never written by the kernel.
#[test]
fn boundary_cells_unchanged() {
    let (rows, cols) = (20, 15);
    let field = Field::with_boundary(rows, cols, &FixedTopEdge { value: 7.5 }).unwrap();
    let before = field.current().to_vec();

    let mut solver = JacobiSolver::new(field, 1e-30)
        .unwrap()
        .with_threads(3)
        .unwrap()
        .with_max_iterations(137);
    solver.solve(None).unwrap();

    let after = solver.field();
    for r in 0..rows {
        for c in 0..cols {
            if after.is_boundary(r, c) {
                assert_eq!(after.get(r, c), before[r * cols + c], "cell ({}, {})", r, c);
            }
        }
    }
    // the interior actually moved
    assert!(after.get(1, cols / 2) > 0.0);
}

/// Test 4: 4x4 corner scenario.
/// Corners {10, 20, 30, 20} interpolated along the edges describe the bilinear
/// function 10 + 10/3 * (r + c), which is harmonic, so the discrete solution
/// matches it exactly.
#[test]
fn corner_scenario_4x4() {
    let params = LaplaceParams {
        rows: 4,
        cols: 4,
        tolerance: 1e-6,
        max_iterations: 10_000,
        workers: 2,
        check_interval: 1,
    };
    let (field, outcome) = solve_laplace(&params, &CornerInterpolation::default()).unwrap();
    assert_eq!(outcome.status, SolveStatus::Converged);
    assert!(outcome.error <= 1e-6);
    assert!(outcome.iterations < 100);

    for r in 0..4 {
        for c in 0..4 {
            let expected = 10.0 + 10.0 / 3.0 * (r + c) as f64;
            assert_abs_diff_eq!(field.get(r, c), expected, epsilon = 1e-5);
        }
    }
}

/// Test 5: Single worker on 128x128 is bit-identical to a sequential loop.
#[test]
fn single_worker_matches_sequential_reference() {
    let iterations = 250;
    let mut solver = corner_solver(128, 128, 1e-30, 1).with_max_iterations(iterations);
    let (expected, expected_error) = sequential_reference(solver.field(), iterations);

    let outcome = solver.solve(None).unwrap();
    assert_eq!(outcome.status, SolveStatus::Exhausted);
    assert_eq!(outcome.iterations, iterations);
    assert_eq!(outcome.error, expected_error);
    assert_eq!(solver.field().current(), &expected[..]);
}

/// Test 6: A zero budget returns Exhausted with the error of the untouched field.
#[test]
fn zero_budget_reports_initial_error() {
    let mut solver = corner_solver(9, 9, 1e-6, 2).with_max_iterations(0);
    let before = solver.field().current().to_vec();
    let outcome = solver.solve(None).unwrap();
    assert_eq!(outcome.status, SolveStatus::Exhausted);
    assert_eq!(outcome.iterations, 0);
    // boundary initializers seed both buffers identically
    assert_eq!(outcome.error, 0.0);
    assert_eq!(solver.field().current(), &before[..]);

    // a grid whose buffers differ reports the real difference
    let mut data = vec![0.0; 25];
    data[12] = 3.0;
    let mut field = Field::with_boundary(5, 5, &FromGrid::new([5, 5], data).unwrap()).unwrap();
    let seeded_next = |_cur: &mut [f64], next: &mut [f64], _rows: usize, _cols: usize| {
        next[12] = 0.5;
    };
    field.apply_boundary(&seeded_next).unwrap();
    let mut solver = JacobiSolver::new(field, 1e-6).unwrap().with_max_iterations(0);
    let outcome = solver.solve(None).unwrap();
    assert_eq!(outcome.status, SolveStatus::Exhausted);
    assert_abs_diff_eq!(outcome.error, 2.5, epsilon = 1e-15);
}

/// Test 7: Configuration errors are rejected before allocation.
#[test]
fn invalid_configuration_rejected() {
    let base = LaplaceParams {
        rows: 8,
        cols: 8,
        workers: 2,
        ..LaplaceParams::default()
    };
    let boundary = CornerInterpolation::default();

    let cases = [
        LaplaceParams { rows: 2, ..base },
        LaplaceParams { cols: 0, ..base },
        LaplaceParams { workers: 0, ..base },
        LaplaceParams { tolerance: 0.0, ..base },
        LaplaceParams { tolerance: -1.0, ..base },
        LaplaceParams { check_interval: 0, ..base },
    ];
    for params in cases {
        let err = solve_laplace(&params, &boundary).unwrap_err();
        assert!(err.is_configuration(), "{:?} gave {}", params, err);
    }
}

/// Test 8: 1x1 linear system [2] x = [3].
#[test]
fn scalar_linear_system() {
    let sol = solve_linear(vec![2.0], vec![0.0], vec![3.0], 0.25, 1e-12).unwrap();
    assert!(sol.outcome.converged());
    assert_abs_diff_eq!(sol.x[0], 1.5, epsilon = 1e-10);
}

/// Test 9: The benchmark system converges to all ones for any worker count.
#[test]
fn dominant_system_worker_counts() {
    let n = 64;
    let mut solutions = Vec::new();
    for w in [1, 3, n, n + 5] {
        let sol = SimpleIteration::new(diagonally_dominant_system(n).unwrap(), 0.01, 1e-9)
            .unwrap()
            .with_threads(w)
            .unwrap()
            .solve(vec![0.0; n])
            .unwrap();
        assert!(sol.outcome.converged(), "w={}", w);
        for &v in &sol.x {
            assert_abs_diff_eq!(v, 1.0, epsilon = 1e-7);
        }
        solutions.push(sol);
    }
    for sol in &solutions[1..] {
        assert_eq!(sol.outcome.iterations, solutions[0].outcome.iterations);
        for (a, b) in sol.x.iter().zip(&solutions[0].x) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
    }
}

/// Test 10: The final field is written as one text line per grid row.
#[test]
fn output_file_written() {
    let mut solver = corner_solver(6, 5, 1e-8, 2);
    solver.solve(None).unwrap();

    let path = std::env::temp_dir().join("jacobi_relax_verification_out.txt");
    solver.save(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 6);
    for (r, line) in lines.iter().enumerate() {
        let values: Vec<f64> = line
            .split_whitespace()
            .map(|t| t.parse().unwrap())
            .collect();
        assert_eq!(values.len(), 5);
        for (c, v) in values.iter().enumerate() {
            assert_abs_diff_eq!(*v, solver.field().get(r, c), epsilon = 1e-5);
        }
    }
    std::fs::remove_file(&path).ok();

    let npy = std::env::temp_dir().join("jacobi_relax_verification_out.npy");
    solver.save(&npy).unwrap();
    let loaded = io::load_grid(&npy, [6, 5]).unwrap();
    assert_eq!(&loaded[..], solver.field().current());
    std::fs::remove_file(&npy).ok();
}

/// Test 11: Diverging input is reported, not silently propagated.
#[test]
fn nan_field_diverges() {
    let poison = |cur: &mut [f64], next: &mut [f64], _rows: usize, cols: usize| {
        cur[cols + 1] = f64::NAN;
        next[cols + 1] = f64::NAN;
    };
    let field = Field::with_boundary(6, 6, &poison).unwrap();
    let mut solver = JacobiSolver::new(field, 1e-6).unwrap().with_threads(2).unwrap();
    assert!(matches!(
        solver.solve(None),
        Err(RelaxError::Diverged { .. })
    ));
}
