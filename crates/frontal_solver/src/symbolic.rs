// SPDX-License-Identifier: LGPL-2.1-or-later
//! Symbolic analysis: column order, front tree and size estimates.
//!
//! Nothing here depends on numeric values, so one [`Symbolic`] serves any
//! number of factorizations of matrices with the same pattern.

use log::debug;
use serde::Serialize;

use crate::control::{Control, Strategy};
use crate::error::{SolverError, SolverResult, Status};
use crate::info::Info;
use crate::matrix::CscPattern;
use crate::matrix::csc::RowPattern;
use crate::ordering::{ColumnOrdering, column_etree, pattern_stats, postorder, pre_order, resolve_strategy};
use crate::timing::Stopwatch;
use crate::utils::{checked_add, checked_mul, inverse_permutation, try_vec};

/// Estimates from a pattern-only run of the multifrontal assembly, assuming
/// no delayed pivots.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Estimates {
    /// Entries of L, unit diagonal included.
    pub lnz: usize,
    /// Entries of U, diagonal included.
    pub unz: usize,
    pub flops: f64,
    /// Largest front plus live contribution blocks plus LU storage, in entries.
    pub peak_memory: usize,
    pub max_front_rows: usize,
    pub max_front_cols: usize,
    pub max_col_count: usize,
}

#[derive(Debug, Clone)]
pub struct Symbolic {
    pattern: CscPattern,
    rows: RowPattern,
    strategy: Strategy,
    /// `col_order[k]` is the column pivoted at position `k` (before delays).
    col_order: Vec<usize>,
    /// Pivot columns of front f are positions `front_ptr[f]..front_ptr[f + 1]`.
    front_ptr: Vec<usize>,
    front_parent: Vec<Option<usize>>,
    child_ptr: Vec<usize>,
    children: Vec<usize>,
    /// Original rows whose leftmost column belongs to front f.
    front_row_ptr: Vec<usize>,
    front_rows: Vec<usize>,
    estimates: Estimates,
}

/// Pattern analysis with the given column ordering.
///
/// Fills the analysis part of `info`, including `status` on failure.
pub fn analyze(
    pattern: &CscPattern,
    ordering: ColumnOrdering<'_>,
    control: &Control,
    info: &mut Info,
) -> SolverResult<Symbolic> {
    let sw = Stopwatch::start();
    let control = control.validated();
    info.status = Status::Ok;
    info.nrow = pattern.dim.nrows;
    info.ncol = pattern.dim.ncols;
    info.nz = pattern.nnz();
    let result = Symbolic::build(pattern, ordering, &control, info);
    info.analyze_time = sw.stop();
    info.record(result)
}

impl Symbolic {
    fn build(
        pattern: &CscPattern,
        ordering: ColumnOrdering<'_>,
        control: &Control,
        info: &mut Info,
    ) -> SolverResult<Self> {
        pattern.check_invariants()?;
        if !pattern.is_square() {
            return Err(SolverError::NonSquare {
                nrows: pattern.dim.nrows,
                ncols: pattern.dim.ncols,
            });
        }
        let n = pattern.dim.ncols;

        let stats = pattern_stats(pattern);
        let strategy = resolve_strategy(control, pattern, &stats);
        info.strategy = strategy;
        info.symmetry = stats.symmetry;
        info.nz_diag = stats.nz_diag;

        let rows = pattern.transpose_pattern();
        let pre = pre_order(pattern, &rows, ordering, strategy, control)?;
        info.ordering = Some(pre.source);
        info.dense_rows = pre.dense_rows;

        let mut col_order = pre.order;
        let mut parent = column_etree(pattern, &col_order);
        if strategy == Strategy::Unsymmetric {
            let post = postorder(&parent);
            col_order = post.iter().map(|&k| col_order[k]).collect();
            parent = column_etree(pattern, &col_order);
        }
        let col_position = inverse_permutation(&col_order);

        // fundamental supernodes: j joins the front of j - 1 when it is the
        // only child's parent
        let mut n_children = try_vec(n, 0usize, "column tree")?;
        for p in parent.iter().flatten() {
            n_children[*p] += 1;
        }
        let mut front_of = try_vec(n, 0usize, "column tree")?;
        let mut front_ptr = Vec::with_capacity(n + 1);
        for k in 0..n {
            let joins = k > 0 && parent[k - 1] == Some(k) && n_children[k] == 1;
            if !joins {
                front_ptr.push(k);
            }
            front_of[k] = front_ptr.len() - 1;
        }
        let nf = front_ptr.len();
        front_ptr.push(n);

        let front_parent: Vec<Option<usize>> = (0..nf)
            .map(|f| parent[front_ptr[f + 1] - 1].map(|p| front_of[p]))
            .collect();

        let mut child_ptr = vec![0usize; nf + 1];
        for p in front_parent.iter().flatten() {
            child_ptr[*p + 1] += 1;
        }
        for f in 0..nf {
            child_ptr[f + 1] += child_ptr[f];
        }
        let mut children = vec![0usize; child_ptr[nf]];
        let mut next = child_ptr.clone();
        for (f, p) in front_parent.iter().enumerate() {
            if let Some(p) = *p {
                children[next[p]] = f;
                next[p] += 1;
            }
        }

        // each row goes to the front of its leftmost column
        let mut row_front: Vec<Option<usize>> = try_vec(n, None, "row assignment")?;
        let mut front_row_ptr = vec![0usize; nf + 1];
        for (i, slot) in row_front.iter_mut().enumerate() {
            if let Some(leftmost) = rows.cols(i).iter().map(|&j| col_position[j]).min() {
                let f = front_of[leftmost];
                *slot = Some(f);
                front_row_ptr[f + 1] += 1;
            }
        }
        for f in 0..nf {
            front_row_ptr[f + 1] += front_row_ptr[f];
        }
        let mut front_rows = try_vec(front_row_ptr[nf], 0usize, "row assignment")?;
        let mut next = front_row_ptr.clone();
        for (i, f) in row_front.iter().enumerate() {
            if let Some(f) = *f {
                front_rows[next[f]] = i;
                next[f] += 1;
            }
        }

        let mut symbolic = Symbolic {
            pattern: pattern.clone(),
            rows,
            strategy,
            col_order,
            front_ptr,
            front_parent,
            child_ptr,
            children,
            front_row_ptr,
            front_rows,
            estimates: Estimates::default(),
        };
        symbolic.estimates = symbolic.simulate(&col_position)?;

        let est = &symbolic.estimates;
        info.n_fronts = nf;
        info.est_lnz = est.lnz;
        info.est_unz = est.unz;
        info.est_flops = est.flops;
        info.est_peak_memory = est.peak_memory;
        info.max_front_rows = est.max_front_rows;
        info.max_front_cols = est.max_front_cols;
        info.max_col_count = est.max_col_count;
        debug!(
            "analyze: n={} nnz={} strategy={:?} fronts={} est nnz(L)={} nnz(U)={} flops={:.3e}",
            n,
            pattern.nnz(),
            strategy,
            nf,
            est.lnz,
            est.unz,
            est.flops
        );
        Ok(symbolic)
    }

    /// Runs the assembly on patterns only.
    fn simulate(&self, col_position: &[usize]) -> SolverResult<Estimates> {
        let n = self.n();
        let nf = self.n_fronts();
        let mut est = Estimates::default();
        let mut contrib_cols: Vec<Vec<usize>> = vec![Vec::new(); nf];
        let mut contrib_rows = vec![0usize; nf];
        let mut mark = try_vec(n, usize::MAX, "symbolic assembly")?;
        let mut live = 0usize;
        let mut work_peak = 0usize;

        for f in 0..nf {
            let (c0, c1) = (self.front_ptr[f], self.front_ptr[f + 1]);
            let mut cols: Vec<usize> = (c0..c1).collect();
            for p in c0..c1 {
                mark[p] = f;
            }
            let mut nrows = 0usize;
            for &i in self.front_rows(f) {
                nrows += 1;
                for &j in self.rows.cols(i) {
                    let p = col_position[j];
                    if mark[p] != f {
                        mark[p] = f;
                        cols.push(p);
                    }
                }
            }
            for &c in self.children(f) {
                nrows += contrib_rows[c];
                let child_cols = std::mem::take(&mut contrib_cols[c]);
                live = live.saturating_sub(contrib_rows[c] * child_cols.len());
                for p in child_cols {
                    if mark[p] != f {
                        mark[p] = f;
                        cols.push(p);
                    }
                }
            }

            let npiv = c1 - c0;
            let ncols = cols.len();
            let front_words = checked_mul(nrows, ncols, "front size")?;
            work_peak = work_peak.max(checked_add(live, front_words, "working memory")?);
            est.max_front_rows = est.max_front_rows.max(nrows);
            est.max_front_cols = est.max_front_cols.max(ncols);

            for t in 0..npiv {
                let lcount = nrows.saturating_sub(t + 1);
                let ucount = ncols - t - 1;
                est.lnz = checked_add(est.lnz, lcount + 1, "nnz(L)")?;
                est.unz = checked_add(est.unz, ucount + 1, "nnz(U)")?;
                est.flops += lcount as f64 * (1.0 + 2.0 * ucount as f64);
                est.max_col_count = est.max_col_count.max(lcount + 1);
            }

            if self.front_parent[f].is_some() {
                let r = nrows.saturating_sub(npiv);
                cols.drain(..npiv);
                live = checked_add(live, checked_mul(r, cols.len(), "contribution block")?, "working memory")?;
                contrib_rows[f] = r;
                contrib_cols[f] = cols;
            }
        }
        est.peak_memory = work_peak.saturating_add(est.lnz).saturating_add(est.unz);
        Ok(est)
    }

    pub fn n(&self) -> usize {
        self.pattern.dim.ncols
    }

    pub fn nnz(&self) -> usize {
        self.pattern.nnz()
    }

    pub fn pattern(&self) -> &CscPattern {
        &self.pattern
    }

    /// The strategy actually used (never `Auto`).
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Column pre-order after postordering, `q[k]` is the column at position k.
    pub fn column_order(&self) -> &[usize] {
        &self.col_order
    }

    pub fn n_fronts(&self) -> usize {
        self.front_parent.len()
    }

    pub fn front_parent(&self, f: usize) -> Option<usize> {
        self.front_parent[f]
    }

    /// Columns pivoted in front f when no pivot is delayed.
    pub fn front_pivot_cols(&self, f: usize) -> &[usize] {
        &self.col_order[self.front_ptr[f]..self.front_ptr[f + 1]]
    }

    pub fn front_rows(&self, f: usize) -> &[usize] {
        &self.front_rows[self.front_row_ptr[f]..self.front_row_ptr[f + 1]]
    }

    pub fn children(&self, f: usize) -> &[usize] {
        &self.children[self.child_ptr[f]..self.child_ptr[f + 1]]
    }

    pub fn estimates(&self) -> &Estimates {
        &self.estimates
    }

    pub(crate) fn rows(&self) -> &RowPattern {
        &self.rows
    }

    /// Releases the analysis; same as dropping it.
    pub fn destroy(self) {}
}
