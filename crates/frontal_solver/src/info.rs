// SPDX-License-Identifier: LGPL-2.1-or-later
use std::fmt;

use serde::Serialize;

use crate::control::Strategy;
use crate::error::{SolverResult, Status};
use crate::timing::Elapsed;

/// Where the column pre-order came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingSource {
    MinimumDegree,
    Natural,
    Given,
    Custom,
}

/// Statistics reported by analyze, factorize and solve.
///
/// Each entry point overwrites the fields it owns and sets `status`, whether
/// it succeeds or fails.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Info {
    pub status: Status,

    pub nrow: usize,
    pub ncol: usize,
    pub nz: usize,

    // analysis
    pub strategy: Strategy,
    pub ordering: Option<OrderingSource>,
    pub symmetry: f64,
    pub nz_diag: usize,
    pub dense_rows: usize,
    pub n_fronts: usize,
    pub max_front_rows: usize,
    pub max_front_cols: usize,
    pub max_col_count: usize,
    pub est_lnz: usize,
    pub est_unz: usize,
    pub est_flops: f64,
    pub est_peak_memory: usize,

    // factorization
    pub lnz: usize,
    pub unz: usize,
    pub flops: f64,
    pub peak_memory: usize,
    pub nrealloc: usize,
    pub n_delayed: usize,
    pub noffdiag: usize,
    pub rank: usize,
    pub min_pivot: f64,
    pub max_pivot: f64,
    pub rcond: f64,
    pub rgrowth: f64,

    // solve
    pub refine_steps: usize,
    pub residual_norm: f64,

    pub analyze_time: Elapsed,
    pub factor_time: Elapsed,
    pub solve_time: Elapsed,
}

impl Info {
    /// Sets the status from an error and passes the result through.
    pub(crate) fn record<T>(&mut self, result: SolverResult<T>) -> SolverResult<T> {
        if let Err(e) = &result {
            self.status = e.status();
        }
        result
    }
}

impl fmt::Display for Info {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "status           {:?}", self.status)?;
        writeln!(f, "matrix           {} x {}, nnz {}", self.nrow, self.ncol, self.nz)?;
        writeln!(
            f,
            "strategy         {:?} (symmetry {:.3}, nz diag {}, dense rows {})",
            self.strategy, self.symmetry, self.nz_diag, self.dense_rows
        )?;
        if let Some(ordering) = self.ordering {
            writeln!(f, "ordering         {ordering:?}")?;
        }
        writeln!(
            f,
            "fronts           {} (largest {} x {})",
            self.n_fronts, self.max_front_rows, self.max_front_cols
        )?;
        writeln!(
            f,
            "estimates        nnz(L) {}, nnz(U) {}, flops {:.3e}, memory {}",
            self.est_lnz, self.est_unz, self.est_flops, self.est_peak_memory
        )?;
        writeln!(
            f,
            "factors          nnz(L) {}, nnz(U) {}, flops {:.3e}, memory {}, reallocs {}",
            self.lnz, self.unz, self.flops, self.peak_memory, self.nrealloc
        )?;
        writeln!(
            f,
            "pivots           rank {}, delayed {}, off-diagonal {}",
            self.rank, self.n_delayed, self.noffdiag
        )?;
        writeln!(
            f,
            "pivot range      min {:.3e}, max {:.3e}, rcond {:.3e}, rgrowth {:.3e}",
            self.min_pivot, self.max_pivot, self.rcond, self.rgrowth
        )?;
        write!(
            f,
            "refinement       {} steps, residual {:.3e}",
            self.refine_steps, self.residual_norm
        )
    }
}
