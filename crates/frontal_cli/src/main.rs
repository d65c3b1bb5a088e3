// SPDX-License-Identifier: LGPL-2.1-or-later
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use frontal_solver::matrix::load_matrix_market_csc_file;
use frontal_solver::{
    ColumnOrdering, Control, CscMatrix, Elapsed, Entry, Info, MatrixMarketData, Numeric,
    OrderingMethod, SolveMode, SolverError, Strategy, analyze, tic, toc,
};
use log::{LevelFilter, Log, Metadata, Record};

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyArg {
    Auto,
    Symmetric,
    Unsymmetric,
}

impl From<StrategyArg> for Strategy {
    fn from(s: StrategyArg) -> Self {
        match s {
            StrategyArg::Auto => Strategy::Auto,
            StrategyArg::Symmetric => Strategy::Symmetric,
            StrategyArg::Unsymmetric => Strategy::Unsymmetric,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    about = "Loads a MatrixMarket coordinate matrix (.mtx), solves Ax=b with the multifrontal LU solver, and prints stats.",
    after_help = "The right-hand side is b[i] = 1 + (i+1)/n.",
    version
)]
struct Args {
    /// Ordering and pivoting strategy.
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Keep the natural column order instead of minimum degree.
    #[arg(long)]
    natural: bool,

    /// Solve A^T x = b (A^H x = b for complex matrices).
    #[arg(long)]
    transpose: bool,

    /// Skip iterative refinement.
    #[arg(long)]
    no_refine: bool,

    /// Print the diagnostics as JSON.
    #[arg(long)]
    json: bool,

    /// Control parameters as JSON; missing fields keep their defaults.
    #[arg(long, value_name = "FILE")]
    control: Option<PathBuf>,

    /// Log per-stage details to stderr.
    #[arg(short, long)]
    verbose: bool,

    /// Path to MatrixMarket coordinate matrix (.mtx)
    #[arg(value_name = "PATH")]
    path: PathBuf,
}

fn fmt_seconds(secs: f64) -> String {
    if secs >= 1.0 {
        format!("{secs:.3}s")
    } else if secs >= 1e-3 {
        format!("{:.3}ms", secs * 1e3)
    } else {
        format!("{:.1}us", secs * 1e6)
    }
}

fn print_timing_breakdown(stages: &[(&str, Elapsed)], total: Elapsed) {
    let accounted: f64 = stages.iter().map(|(_, e)| e.wall).sum();
    println!();
    println!(
        "timing breakdown (accounted {}, total {}, cpu {}):",
        fmt_seconds(accounted),
        fmt_seconds(total.wall),
        fmt_seconds(total.cpu)
    );
    for (name, e) in stages {
        let pct = if total.wall > 0.0 {
            e.wall / total.wall * 100.0
        } else {
            0.0
        };
        println!(
            "  {name:<12} {:>12} cpu {:>12} ({pct:>6.2}%)",
            fmt_seconds(e.wall),
            fmt_seconds(e.cpu)
        );
    }
}

fn make_demo_rhs(n: usize) -> Vec<f64> {
    let nf = n as f64;
    (0..n).map(|i| 1.0 + ((i + 1) as f64) / nf).collect()
}

fn inf_norm<T: Entry>(x: &[T]) -> f64 {
    x.iter().map(|v| v.magnitude()).fold(0.0, f64::max)
}

/// Max absolute row sum (column sum when transposed).
fn matrix_inf_norm<T: Entry>(a: &CscMatrix<T>, transpose: bool) -> f64 {
    if transpose {
        return (0..a.dim.ncols)
            .map(|j| a.col(j).1.iter().map(|v| v.magnitude()).sum::<f64>())
            .fold(0.0, f64::max);
    }
    let mut sums = vec![0.0f64; a.dim.nrows];
    for (&i, v) in a.row_indices.iter().zip(&a.values) {
        sums[i] += v.magnitude();
    }
    sums.into_iter().fold(0.0, f64::max)
}

fn load_control(args: &Args) -> Result<Control> {
    let mut control = match &args.control {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read control file {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("invalid control file {}", path.display()))?
        }
        None => Control::default(),
    };
    if let Some(s) = args.strategy {
        control.strategy = s.into();
    }
    if args.natural {
        control.ordering = OrderingMethod::Natural;
    }
    if args.no_refine {
        control.refine_steps = 0;
    }
    Ok(control)
}

fn print_matrix_stats(path: &Path, nrows: usize, ncols: usize, nnz: usize, complex: bool) {
    println!("matrix: {}", path.display());
    println!("dim: {nrows} x {ncols}");
    println!("nnz: {nnz}");
    println!("entries: {}", if complex { "complex" } else { "real" });
}

fn run_system<T: Entry>(a: &CscMatrix<T>, args: &Args, control: &Control) -> Result<()> {
    let total = tic();
    let mut stages: Vec<(&str, Elapsed)> = Vec::new();
    let mut info = Info::default();
    let n = a.dim.ncols;

    let t = tic();
    let b: Vec<T> = make_demo_rhs(a.dim.nrows).into_iter().map(T::from_real).collect();
    stages.push(("make_rhs", toc(&t)));

    let t = tic();
    let symbolic = analyze(&a.pattern(), ColumnOrdering::Auto, control, &mut info)
        .context("analyze failed")?;
    stages.push(("analyze", toc(&t)));

    let t = tic();
    let numeric = Numeric::factorize(&symbolic, &a.values, control, &mut info)
        .context("factorization failed")?;
    stages.push(("factorize", toc(&t)));

    let mode = match (args.transpose, T::IS_COMPLEX) {
        (false, _) => SolveMode::A,
        (true, false) => SolveMode::Transpose,
        (true, true) => SolveMode::ConjugateTranspose,
    };
    let t = tic();
    let x = numeric
        .solve(Some(a), &b, mode, control, &mut info)
        .context("solve failed")?;
    stages.push(("solve", toc(&t)));

    let t = tic();
    let ax = match mode {
        SolveMode::A => a.matvec(&x),
        SolveMode::Transpose => a.matvec_transpose(&x, false),
        SolveMode::ConjugateTranspose => a.matvec_transpose(&x, true),
    };
    let r: Vec<T> = b.iter().zip(&ax).map(|(&bi, &axi)| bi - axi).collect();
    let rnorm = inf_norm(&r);
    let denom = matrix_inf_norm(a, args.transpose) * inf_norm(&x) + inf_norm(&b);
    let eta = if denom > 0.0 { rnorm / denom } else { 0.0 };
    stages.push(("residual", toc(&t)));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!();
        println!(
            "n {} nnz(A) {} nnz(L+U) {} resid {:.5e}",
            n,
            a.nnz(),
            info.lnz + info.unz - n,
            rnorm
        );
        println!("backward_error_eta {eta:.5e}");
        println!();
        println!("{info}");
        print_timing_breakdown(&stages, toc(&total));
    }
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let control = load_control(args)?;
    let t = tic();
    let data = load_matrix_market_csc_file(&args.path)
        .with_context(|| format!("failed to load MatrixMarket file {}", args.path.display()))?;
    let load = toc(&t);
    let dim = data.dim();
    if !args.json {
        print_matrix_stats(
            &args.path,
            dim.nrows,
            dim.ncols,
            data.nnz(),
            matches!(data, MatrixMarketData::Complex(_)),
        );
        println!("load: {}", fmt_seconds(load.wall));
    }
    match &data {
        MatrixMarketData::Real(a) => run_system(a, args, &control),
        MatrixMarketData::Complex(a) => run_system(a, args, &control),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Warn };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            let non_square = e
                .chain()
                .any(|c| matches!(c.downcast_ref::<SolverError>(), Some(SolverError::NonSquare { .. })));
            if non_square {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
