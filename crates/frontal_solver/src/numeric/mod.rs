// SPDX-License-Identifier: LGPL-2.1-or-later
//! Multifrontal numeric factorization `P R A Q = L U`.

mod element;
mod front;
mod lu;
mod memory;
mod scale;

use log::{debug, warn};
use serde::Serialize;

use crate::control::{Control, Strategy};
use crate::entry::Entry;
use crate::error::{SolverError, SolverResult, Status};
use crate::info::Info;
use crate::matrix::{CscMatrix, MatrixBuilder};
use crate::symbolic::Symbolic;
use crate::timing::Stopwatch;
use crate::utils::{checked_mul, inverse_permutation, try_vec};

use element::{Element, ElementArena};
use front::{ColumnStatus, FrontalMatrix, PivotRule};
pub(crate) use lu::LuFactors;
use memory::MemoryBudget;

const UNMAPPED: usize = usize::MAX;
const RECORDED: usize = usize::MAX - 1;

/// Quality and size figures of one factorization.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    /// Number of nonzero pivots.
    pub rank: usize,
    pub min_pivot: f64,
    pub max_pivot: f64,
    pub rcond: f64,
    /// Reciprocal pivot growth, `min_j max|a_j| / max|u_j|`.
    pub rgrowth: f64,
    pub lnz: usize,
    pub unz: usize,
    pub flops: f64,
    pub n_delayed: usize,
    pub noffdiag: usize,
    pub nrealloc: usize,
    pub peak_memory: usize,
}

/// LU factors with their permutations, scale factors and pivot record.
pub struct Numeric<T: Entry = f64> {
    pub(crate) n: usize,
    pub(crate) nnz: usize,
    pub(crate) lu: LuFactors<T>,
    /// Original row pivoted at each position.
    pub(crate) row_perm: Vec<usize>,
    /// Original column pivoted at each position.
    pub(crate) col_perm: Vec<usize>,
    pub(crate) row_scale: Option<Vec<f64>>,
    /// Pivot positions `front_steps[f]..front_steps[f + 1]` belong to front f.
    front_steps: Vec<usize>,
    dropped_at: Vec<Option<usize>>,
    diagnostics: Diagnostics,
    pub(crate) valid: bool,
}

impl<T: Entry> std::fmt::Debug for Numeric<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // factors themselves are left out, they can be huge
        f.debug_struct("Numeric")
            .field("n", &self.n)
            .field("row_perm", &self.row_perm)
            .field("col_perm", &self.col_perm)
            .field("lnz", &self.lu.lnz())
            .field("unz", &self.lu.unz())
            .field("rank", &self.diagnostics.rank)
            .field("valid", &self.valid)
            .finish()
    }
}

enum Plan<'p> {
    Search,
    Replay {
        row_perm: &'p [usize],
        col_perm: &'p [usize],
        front_steps: &'p [usize],
        dropped_at: &'p [Option<usize>],
    },
}

impl<T: Entry> Numeric<T> {
    pub fn factorize(
        symbolic: &Symbolic,
        values: &[T],
        control: &Control,
        info: &mut Info,
    ) -> SolverResult<Self> {
        let sw = Stopwatch::start();
        let control = control.validated();
        info.status = Status::Ok;
        let result = run(symbolic, values, &control, Plan::Search);
        info.factor_time = sw.stop();
        if let Ok(numeric) = &result {
            numeric.report(info);
        }
        info.record(result)
    }

    /// Like [`Numeric::factorize`], but checks that `a` has the analyzed
    /// pattern first.
    pub fn factorize_matrix(
        symbolic: &Symbolic,
        a: &CscMatrix<T>,
        control: &Control,
        info: &mut Info,
    ) -> SolverResult<Self> {
        if !a.has_pattern(symbolic.pattern()) {
            info.status = Status::InvalidSymbolicObject;
            return Err(SolverError::InvalidSymbolicObject {
                reason: "matrix pattern differs from the analyzed one",
            });
        }
        Self::factorize(symbolic, &a.values, control, info)
    }

    /// Factors new values of the same pattern with the recorded pivot
    /// sequence. A failure leaves the object invalid until the next
    /// successful call.
    pub fn refactorize(
        &mut self,
        symbolic: &Symbolic,
        values: &[T],
        control: &Control,
        info: &mut Info,
    ) -> SolverResult<()> {
        let sw = Stopwatch::start();
        let control = control.validated();
        info.status = Status::Ok;
        let result = if symbolic.n() != self.n
            || symbolic.nnz() != self.nnz
            || symbolic.n_fronts() + 1 != self.front_steps.len()
        {
            Err(SolverError::InvalidSymbolicObject {
                reason: "symbolic object does not match the factorization",
            })
        } else {
            let plan = Plan::Replay {
                row_perm: &self.row_perm,
                col_perm: &self.col_perm,
                front_steps: &self.front_steps,
                dropped_at: &self.dropped_at,
            };
            run(symbolic, values, &control, plan)
        };
        info.factor_time = sw.stop();
        match result {
            Ok(numeric) => {
                *self = numeric;
                self.report(info);
                Ok(())
            }
            Err(e) => {
                self.valid = false;
                info.record(Err(e))
            }
        }
    }

    fn report(&self, info: &mut Info) {
        let d = &self.diagnostics;
        info.lnz = d.lnz;
        info.unz = d.unz;
        info.flops = d.flops;
        info.peak_memory = d.peak_memory;
        info.nrealloc = d.nrealloc;
        info.n_delayed = d.n_delayed;
        info.noffdiag = d.noffdiag;
        info.rank = d.rank;
        info.min_pivot = d.min_pivot;
        info.max_pivot = d.max_pivot;
        info.rcond = d.rcond;
        info.rgrowth = d.rgrowth;
        if d.rank < self.n {
            info.status = Status::Singular;
            warn!("matrix is singular: rank {} of {}", d.rank, self.n);
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn rank(&self) -> usize {
        self.diagnostics.rank
    }

    pub fn is_singular(&self) -> bool {
        self.diagnostics.rank < self.n
    }

    /// False after a failed refactorization.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// `P`: the original row pivoted at each position.
    pub fn row_permutation(&self) -> &[usize] {
        &self.row_perm
    }

    /// `Q`: the original column pivoted at each position.
    pub fn column_permutation(&self) -> &[usize] {
        &self.col_perm
    }

    /// Row scale factors, the factored matrix being `a_ij / rs_i`.
    pub fn row_scale(&self) -> Option<&[f64]> {
        self.row_scale.as_deref()
    }

    /// Unit lower triangular factor in pivot positions.
    pub fn lower(&self) -> SolverResult<CscMatrix<T>> {
        let mut b = MatrixBuilder::new(self.n, self.n);
        b.reserve(self.lu.lnz());
        for k in 0..self.n {
            b.push(k, k, T::one())?;
            for (i, v) in self.lu.l_col(k) {
                b.push(k, i, v)?;
            }
        }
        Ok(b.build_csc()?)
    }

    /// Upper triangular factor in pivot positions.
    pub fn upper(&self) -> SolverResult<CscMatrix<T>> {
        let mut b = MatrixBuilder::new(self.n, self.n);
        b.reserve(self.lu.unz());
        for k in 0..self.n {
            b.push(k, k, self.lu.u_diag[k])?;
            for (j, v) in self.lu.u_row(k) {
                b.push(j, k, v)?;
            }
        }
        Ok(b.build_csc()?)
    }

    pub fn destroy(self) {}
}

fn run<T: Entry>(
    symbolic: &Symbolic,
    values: &[T],
    control: &Control,
    plan: Plan<'_>,
) -> SolverResult<Numeric<T>> {
    if values.len() != symbolic.nnz() {
        return Err(SolverError::InvalidSymbolicObject {
            reason: "number of values differs from the analyzed pattern",
        });
    }
    let n = symbolic.n();
    let pattern = symbolic.pattern();
    let row_scale = scale::row_scale_factors(pattern, values, control.scale);
    let col_max = scale::column_max(pattern, values, row_scale.as_deref());
    let rows = symbolic.rows();
    let row_degree: Vec<usize> = (0..n).map(|i| rows.row_len(i)).collect();

    let est = symbolic.estimates();
    let l_cap = (control.alloc_init * est.lnz.saturating_sub(n) as f64).ceil() as usize;
    let u_cap = (control.alloc_init * est.unz.saturating_sub(n) as f64).ceil() as usize;
    let mut budget = MemoryBudget::new(control.memory_limit);
    let lu = LuFactors::with_capacity(n, l_cap, u_cap, &mut budget)?;

    let mut fz = Factorizer {
        symbolic,
        values,
        control,
        row_scale: row_scale.as_deref(),
        col_max: &col_max,
        row_degree: &row_degree,
        budget,
        arena: ElementArena::new(symbolic.n_fronts()),
        lu,
        col_local: try_vec(n, UNMAPPED, "front workspace")?,
        row_local: try_vec(n, UNMAPPED, "front workspace")?,
        row_perm: Vec::with_capacity(n),
        col_perm: Vec::with_capacity(n),
        front_steps: Vec::with_capacity(symbolic.n_fronts() + 1),
        dropped_at: try_vec(n, None, "front workspace")?,
        singular_cols: Vec::new(),
        flops: 0.0,
        n_delayed: 0,
        noffdiag: 0,
    };
    fz.front_steps.push(0);
    for f in 0..symbolic.n_fronts() {
        fz.front(f, &plan)?;
    }
    fz.pair_singular(&plan)?;
    debug_assert_eq!(fz.arena.live(), 0);

    let row_pos = inverse_permutation(&fz.row_perm);
    let col_pos = inverse_permutation(&fz.col_perm);
    fz.lu.finalize(&row_pos, &col_pos);

    let diagnostics = fz.diagnostics();
    debug!(
        "factorize: n={} nnz(L)={} nnz(U)={} rank={} delayed={} rcond={:.3e}",
        n, diagnostics.lnz, diagnostics.unz, diagnostics.rank, diagnostics.n_delayed, diagnostics.rcond
    );
    if diagnostics.n_delayed > 0 {
        warn!("{} pivot columns were delayed", diagnostics.n_delayed);
    }
    let Factorizer {
        lu,
        row_perm,
        col_perm,
        front_steps,
        dropped_at,
        ..
    } = fz;
    Ok(Numeric {
        n,
        nnz: values.len(),
        lu,
        row_perm,
        col_perm,
        row_scale,
        front_steps,
        dropped_at,
        diagnostics,
        valid: true,
    })
}

struct Factorizer<'a, T: Entry> {
    symbolic: &'a Symbolic,
    values: &'a [T],
    control: &'a Control,
    row_scale: Option<&'a [f64]>,
    col_max: &'a [f64],
    row_degree: &'a [usize],
    budget: MemoryBudget,
    arena: ElementArena<T>,
    lu: LuFactors<T>,
    col_local: Vec<usize>,
    row_local: Vec<usize>,
    row_perm: Vec<usize>,
    col_perm: Vec<usize>,
    front_steps: Vec<usize>,
    dropped_at: Vec<Option<usize>>,
    singular_cols: Vec<usize>,
    flops: f64,
    n_delayed: usize,
    noffdiag: usize,
}

fn add_col(cols: &mut Vec<usize>, status: &mut Vec<ColumnStatus>, local: &mut [usize], j: usize, s: ColumnStatus) {
    if local[j] == UNMAPPED {
        local[j] = cols.len();
        cols.push(j);
        status.push(s);
    }
}

/// Moves the recorded ids to the front of `list`, keeping the rest in order.
fn move_to_front(list: &mut Vec<usize>, first: &[usize], local: &mut [usize]) -> SolverResult<()> {
    for &x in first {
        if local[x] == UNMAPPED || local[x] == RECORDED {
            return Err(SolverError::InvalidNumericObject {
                reason: "pivot record does not match the front structure",
            });
        }
        local[x] = RECORDED;
    }
    let mut reordered = Vec::with_capacity(list.len());
    reordered.extend_from_slice(first);
    reordered.extend(list.iter().copied().filter(|&x| local[x] != RECORDED));
    for (pos, &x) in reordered.iter().enumerate() {
        local[x] = pos;
    }
    *list = reordered;
    Ok(())
}

impl<T: Entry> Factorizer<'_, T> {
    fn scaled(&self, i: usize, v: T) -> T {
        match self.row_scale {
            Some(rs) => v.div_real(rs[i]),
            None => v,
        }
    }

    fn front(&mut self, f: usize, plan: &Plan<'_>) -> SolverResult<()> {
        let sym = self.symbolic;
        let children: Vec<Element<T>> = sym
            .children(f)
            .iter()
            .filter_map(|&c| self.arena.take(c))
            .collect();

        // columns: pivot columns, delayed columns, then the contribution
        let mut cols = Vec::new();
        let mut status = Vec::new();
        for &j in sym.front_pivot_cols(f) {
            add_col(&mut cols, &mut status, &mut self.col_local, j, ColumnStatus::Candidate);
        }
        for e in &children {
            for (&j, &delayed) in e.cols.iter().zip(&e.delayed) {
                if delayed {
                    add_col(&mut cols, &mut status, &mut self.col_local, j, ColumnStatus::Candidate);
                }
            }
        }
        let mut n_candidates = cols.len();
        for &i in sym.front_rows(f) {
            for &j in sym.rows().cols(i) {
                add_col(&mut cols, &mut status, &mut self.col_local, j, ColumnStatus::Contribution);
            }
        }
        for e in &children {
            for &j in &e.cols {
                add_col(&mut cols, &mut status, &mut self.col_local, j, ColumnStatus::Contribution);
            }
        }

        let mut rows: Vec<usize> = sym.front_rows(f).to_vec();
        for e in &children {
            rows.extend_from_slice(&e.rows);
        }
        for (pos, &i) in rows.iter().enumerate() {
            self.row_local[i] = pos;
        }

        if let Plan::Replay {
            row_perm,
            col_perm,
            front_steps,
            ..
        } = plan
        {
            let steps = front_steps[f]..front_steps[f + 1];
            move_to_front(&mut cols, &col_perm[steps.clone()], &mut self.col_local)?;
            move_to_front(&mut rows, &row_perm[steps.clone()], &mut self.row_local)?;
            n_candidates = steps.len();
            for (k, s) in status.iter_mut().enumerate() {
                *s = if k < n_candidates {
                    ColumnStatus::Candidate
                } else {
                    ColumnStatus::Contribution
                };
            }
        }

        let (m, c) = (rows.len(), cols.len());
        let len = checked_mul(m, c, "frontal matrix")?;
        let mut values = self.arena.acquire(len, &mut self.budget)?;

        for &i in sym.front_rows(f) {
            let r = self.row_local[i];
            for (j, p) in sym.rows().entries(i) {
                let v = self.scaled(i, self.values[p]);
                values[r * c + self.col_local[j]] += v;
            }
        }
        for e in children {
            for (a, &i) in e.rows.iter().enumerate() {
                let r = self.row_local[i];
                for (b, &j) in e.cols.iter().enumerate() {
                    values[r * c + self.col_local[j]] += e.get(a, b);
                }
            }
            self.arena.recycle(e.values, &mut self.budget);
        }
        for &j in &cols {
            self.col_local[j] = UNMAPPED;
        }
        for &i in &rows {
            self.row_local[i] = UNMAPPED;
        }

        let mut front = FrontalMatrix {
            rows,
            cols,
            status,
            n_candidates,
            values,
        };
        let has_parent = sym.front_parent(f).is_some();
        let rule = match plan {
            Plan::Search => {
                let symmetric = sym.strategy() == Strategy::Symmetric;
                PivotRule::Search {
                    tolerance: if symmetric {
                        self.control.sym_pivot_tolerance
                    } else {
                        self.control.pivot_tolerance
                    },
                    prefer_diagonal: symmetric,
                    can_defer: has_parent,
                    defer_tolerance: self.control.defer_tolerance,
                    col_max: self.col_max,
                    row_degree: self.row_degree,
                }
            }
            Plan::Replay { .. } => PivotRule::Fixed,
        };
        let npiv = front.factor(&rule, self.control.block_size)?;
        if let Plan::Replay { front_steps, .. } = plan {
            if npiv != front_steps[f + 1] - front_steps[f] {
                return Err(SolverError::InvalidNumericObject {
                    reason: "pivot record does not match the front structure",
                });
            }
        }

        self.extract_pivots(&front, npiv)?;
        self.front_steps.push(self.row_perm.len());
        self.pass_on(f, front, npiv, has_parent, plan)
    }

    fn extract_pivots(&mut self, front: &FrontalMatrix<T>, npiv: usize) -> SolverResult<()> {
        let (m, c) = (front.rows.len(), front.cols.len());
        for t in 0..npiv {
            let l_count = (t + 1..m).filter(|&r| !front.get(r, t).is_zero()).count();
            let u_count = (t + 1..c).filter(|&q| !front.get(t, q).is_zero()).count();
            self.lu
                .reserve(l_count, u_count, self.control.mem_grow, &mut self.budget)?;
            self.lu.push_pivot(
                front.get(t, t),
                (t + 1..m).filter_map(|r| {
                    let v = front.get(r, t);
                    (!v.is_zero()).then_some((front.rows[r], v))
                }),
                (t + 1..c).filter_map(|q| {
                    let v = front.get(t, q);
                    (!v.is_zero()).then_some((front.cols[q], v))
                }),
            );
            if front.rows[t] != front.cols[t] {
                self.noffdiag += 1;
            }
            self.row_perm.push(front.rows[t]);
            self.col_perm.push(front.cols[t]);
            self.flops += (m - t - 1) as f64 * (1.0 + 2.0 * (c - t - 1) as f64);
        }
        Ok(())
    }

    /// Stores the contribution block for the parent and drops singular
    /// columns.
    fn pass_on(
        &mut self,
        f: usize,
        front: FrontalMatrix<T>,
        npiv: usize,
        has_parent: bool,
        plan: &Plan<'_>,
    ) -> SolverResult<()> {
        let (m, c) = (front.rows.len(), front.cols.len());
        let mut keep = Vec::with_capacity(c - npiv);
        for q in npiv..c {
            let col = front.cols[q];
            let dropped = match plan {
                Plan::Search => front.status[q] == ColumnStatus::Singular || !has_parent,
                Plan::Replay { dropped_at, .. } => dropped_at[col] == Some(f) || !has_parent,
            };
            if !dropped {
                if front.status[q] == ColumnStatus::Deferred {
                    self.n_delayed += 1;
                }
                keep.push(q);
            } else if matches!(plan, Plan::Search) && front.status[q] != ColumnStatus::Contribution {
                self.singular_cols.push(col);
                self.dropped_at[col] = Some(f);
            }
        }

        let delayed: Vec<bool> = keep
            .iter()
            .map(|&q| front.status[q] == ColumnStatus::Deferred)
            .collect();
        if has_parent && (m > npiv || delayed.contains(&true)) {
            let w = keep.len();
            let mut values = self.arena.acquire((m - npiv) * w, &mut self.budget)?;
            for (a, r) in (npiv..m).enumerate() {
                for (b, &q) in keep.iter().enumerate() {
                    values[a * w + b] = front.get(r, q);
                }
            }
            self.arena.store(
                f,
                Element {
                    rows: front.rows[npiv..].to_vec(),
                    cols: keep.iter().map(|&q| front.cols[q]).collect(),
                    delayed,
                    values,
                },
            );
        }
        self.arena.recycle(front.values, &mut self.budget);
        Ok(())
    }

    /// Pairs columns that never found a pivot with the rows that were never
    /// used, as zero pivots at the end of the order.
    fn pair_singular(&mut self, plan: &Plan<'_>) -> SolverResult<()> {
        let n = self.symbolic.n();
        match plan {
            Plan::Search => {
                let mut pivoted = try_vec(n, false, "singular columns")?;
                for &i in &self.row_perm {
                    pivoted[i] = true;
                }
                let leftover: Vec<usize> = (0..n).filter(|&i| !pivoted[i]).collect();
                if leftover.len() != self.singular_cols.len() {
                    return Err(SolverError::InvalidSymbolicObject {
                        reason: "pivot count does not match the matrix dimension",
                    });
                }
                for (col, row) in std::mem::take(&mut self.singular_cols).into_iter().zip(leftover) {
                    self.push_zero_pivot(row, col)?;
                }
            }
            Plan::Replay {
                row_perm, col_perm, ..
            } => {
                for k in self.row_perm.len()..n {
                    self.push_zero_pivot(row_perm[k], col_perm[k])?;
                }
            }
        }
        Ok(())
    }

    fn push_zero_pivot(&mut self, row: usize, col: usize) -> SolverResult<()> {
        self.lu.reserve(0, 0, self.control.mem_grow, &mut self.budget)?;
        self.lu
            .push_pivot(T::zero(), std::iter::empty(), std::iter::empty());
        if row != col {
            self.noffdiag += 1;
        }
        self.row_perm.push(row);
        self.col_perm.push(col);
        Ok(())
    }

    fn diagnostics(&self) -> Diagnostics {
        let n = self.lu.n_pivots();
        let mut rank = 0;
        let mut min_pivot = f64::INFINITY;
        let mut max_pivot = 0.0f64;
        let mut umax = vec![0.0f64; n];
        for (k, d) in self.lu.u_diag.iter().enumerate() {
            let m = d.magnitude();
            if m != 0.0 {
                rank += 1;
            }
            min_pivot = min_pivot.min(m);
            max_pivot = max_pivot.max(m);
            umax[k] = umax[k].max(m);
            for (j, v) in self.lu.u_row(k) {
                umax[j] = umax[j].max(v.magnitude());
            }
        }
        if n == 0 {
            min_pivot = 0.0;
        }
        let rcond = if max_pivot > 0.0 { min_pivot / max_pivot } else { 0.0 };
        let rgrowth = self
            .col_perm
            .iter()
            .zip(&umax)
            .filter(|&(_, &u)| u > 0.0)
            .map(|(&col, &u)| self.col_max[col] / u)
            .fold(f64::INFINITY, f64::min);
        Diagnostics {
            rank,
            min_pivot,
            max_pivot,
            rcond,
            rgrowth: if rgrowth.is_finite() { rgrowth } else { 1.0 },
            lnz: self.lu.lnz(),
            unz: self.lu.unz(),
            flops: self.flops,
            n_delayed: self.n_delayed,
            noffdiag: self.noffdiag,
            nrealloc: self.lu.nrealloc,
            peak_memory: self.budget.peak(),
        }
    }
}
