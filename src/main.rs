// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use jacobi_relax::core::{BoundaryCondition, CornerInterpolation, FixedTopEdge, FromGrid};
use jacobi_relax::io;
use jacobi_relax::linear::{diagonally_dominant_system, SimpleIteration};
use jacobi_relax::scheduler::{LaplaceParams, ProgressInfo, DEFAULT_MAX_ITERATIONS};

#[derive(Parser)]
#[command(name = "jacobi-relax", about = "Parallel Jacobi relaxation solvers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Relax a 2-D Laplace field with the five-point stencil
    Laplace(LaplaceArgs),
    /// Solve the diagonally dominant test system by simple iteration
    Linear(LinearArgs),
}

#[derive(Args)]
struct LaplaceArgs {
    /// Grid rows, boundary included
    #[arg(short = 'n', long, default_value = "128")]
    rows: usize,

    /// Grid columns, boundary included (defaults to --rows)
    #[arg(short = 'm', long)]
    cols: Option<usize>,

    /// Convergence tolerance on the max change per iteration
    #[arg(short = 't', long, default_value = "1e-6")]
    tolerance: f64,

    /// Iteration budget
    #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,

    /// Measure the error every this many iterations
    #[arg(long, default_value = "100")]
    check_interval: usize,

    /// Number of Rayon worker threads
    #[arg(long)]
    threads: Option<usize>,

    /// Boundary values: "corners:<tl>,<tr>,<br>,<bl>", "top:<v>",
    /// or "file:<path>" (.npy or .mat)
    #[arg(long, default_value = "corners:10,20,30,20")]
    boundary: String,

    /// Output file path (.txt, .dat, .npy or .mat)
    #[arg(short = 'o', long, default_value = "out.txt")]
    output: PathBuf,

    /// Print iteration and error at every convergence check
    #[arg(long)]
    progress: bool,
}

#[derive(Args)]
struct LinearArgs {
    /// Number of unknowns
    #[arg(short = 'n', long, default_value = "1000")]
    size: usize,

    /// Relaxation step
    #[arg(long, default_value = "1e-3")]
    tau: f64,

    /// Tolerance on the relative residual
    #[arg(short = 't', long, default_value = "1e-5")]
    tolerance: f64,

    /// Iteration budget
    #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,

    /// Number of Rayon worker threads
    #[arg(long)]
    threads: Option<usize>,

    /// Write the solution vector here (.txt, .dat, .npy or .mat)
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
}

fn parse_values(s: &str, what: &str) -> Result<Vec<f64>> {
    s.split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("invalid {}: expected comma-separated numbers", what))
}

fn build_boundary(mode: &str, shape: [usize; 2]) -> Result<Box<dyn BoundaryCondition>> {
    if let Some(values) = mode.strip_prefix("corners:") {
        let v = parse_values(values, "corner values")?;
        if v.len() != 4 {
            bail!("corners mode expects 4 values, got {}", v.len());
        }
        return Ok(Box::new(CornerInterpolation::new([v[0], v[1], v[2], v[3]])));
    }

    if let Some(value) = mode.strip_prefix("top:") {
        let value: f64 = value.trim().parse().context("invalid top edge value")?;
        return Ok(Box::new(FixedTopEdge { value }));
    }

    if let Some(path) = mode.strip_prefix("file:") {
        let data = io::load_grid(Path::new(path), shape)
            .with_context(|| format!("failed to load initial grid from {}", path))?;
        return Ok(Box::new(FromGrid::new(shape, data)?));
    }

    bail!(
        "unknown --boundary mode: '{}'. Expected 'corners:<tl>,<tr>,<br>,<bl>', \
         'top:<v>', or 'file:<path>'",
        mode
    );
}

fn run_laplace(args: &LaplaceArgs) -> Result<()> {
    let defaults = LaplaceParams::default();
    let params = LaplaceParams {
        rows: args.rows,
        cols: args.cols.unwrap_or(args.rows),
        tolerance: args.tolerance,
        max_iterations: args.max_iterations,
        workers: args.threads.unwrap_or(defaults.workers),
        check_interval: args.check_interval,
    };
    // Reject bad settings before a boundary file is read or a grid allocated.
    params.validate()?;
    let boundary = build_boundary(&args.boundary, [params.rows, params.cols])?;
    let mut solver = params.build_solver(boundary.as_ref())?;

    let progress_cb: Option<Box<dyn Fn(ProgressInfo) + Sync>> = if args.progress {
        Some(Box::new(|info: ProgressInfo| {
            eprintln!("{:>5}, {:.6}", info.iteration, info.error);
        }))
    } else {
        None
    };

    let outcome = solver.solve(progress_cb.as_deref())?;
    println!(
        "{:?}: {} iterations, error {:.6e}, {:.3}s",
        outcome.status,
        outcome.iterations,
        outcome.error,
        outcome.elapsed.as_secs_f64()
    );

    solver
        .save(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    Ok(())
}

fn run_linear(args: &LinearArgs) -> Result<()> {
    let system = diagonally_dominant_system(args.size)?;
    let mut solver = SimpleIteration::new(system, args.tau, args.tolerance)?
        .with_max_iterations(args.max_iterations);
    if let Some(threads) = args.threads {
        solver = solver.with_threads(threads)?;
    }

    let solution = solver.solve(vec![0.0; args.size])?;
    let outcome = solution.outcome;
    println!(
        "{:?}: {} iterations, relative residual {:.6e}, {:.3}s",
        outcome.status,
        outcome.iterations,
        outcome.error,
        outcome.elapsed.as_secs_f64()
    );

    if let Some(path) = &args.output {
        io::save_array(&solution.x, &[solution.x.len()], path)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match &cli.command {
        Command::Laplace(args) => run_laplace(args),
        Command::Linear(args) => run_linear(args),
    }
}
