// SPDX-License-Identifier: LGPL-2.1-or-later
//! Dense partial factorization of one frontal matrix.
//!
//! The front is `rows x cols`, row-major. Columns `0..n_candidates` may be
//! pivoted here; the rest only receive updates. Pivots end up in the leading
//! positions: after [`FrontalMatrix::factor`] returns `npiv`, the block
//! `[..npiv, ..npiv]` holds L (unit diagonal, below) and U (on and above), the
//! rows below hold L multipliers, and `[npiv.., npiv..]` is the Schur
//! complement.

use ndarray::linalg::general_mat_mul;
use ndarray::{ArrayViewMut2, Axis, s};

use crate::entry::Entry;
use crate::error::{SolverError, SolverResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnStatus {
    Candidate,
    Contribution,
    /// No acceptable pivot yet, offered again to the parent.
    Deferred,
    /// Every remaining entry is exactly zero.
    Singular,
}

pub(crate) enum PivotRule<'a> {
    Search {
        tolerance: f64,
        prefer_diagonal: bool,
        can_defer: bool,
        defer_tolerance: f64,
        /// Largest scaled original entry, by original column.
        col_max: &'a [f64],
        /// Original entries per row, by original row.
        row_degree: &'a [usize],
    },
    /// Rows and columns are already in pivot order.
    Fixed,
}

enum Choice {
    Row(usize),
    Reject(ColumnStatus),
}

#[derive(Debug)]
pub(crate) struct FrontalMatrix<T> {
    pub rows: Vec<usize>,
    pub cols: Vec<usize>,
    pub status: Vec<ColumnStatus>,
    pub n_candidates: usize,
    pub values: Vec<T>,
}

impl<T: Entry> FrontalMatrix<T> {
    #[inline]
    pub fn get(&self, r: usize, c: usize) -> T {
        self.values[r * self.cols.len() + c]
    }

    /// Factors as many candidate columns as the rule allows and returns the
    /// number of pivots.
    pub fn factor(&mut self, rule: &PivotRule<'_>, block_size: usize) -> SolverResult<usize> {
        let (m, c) = (self.rows.len(), self.cols.len());
        let FrontalMatrix {
            rows,
            cols,
            status,
            n_candidates,
            values,
        } = self;
        let mut a = ArrayViewMut2::from_shape((m, c), &mut values[..m * c]).map_err(|_| {
            SolverError::Overflow {
                context: "frontal matrix shape",
            }
        })?;

        let nb = block_size.max(1);
        let mut k = 0;
        let mut cand_end = *n_candidates;
        while k < cand_end {
            let panel_start = k;
            let panel_end = (k + nb).min(cand_end);
            let mut rejected = None;
            while k < panel_end {
                match choose_pivot(&a, rows, cols, k, rule) {
                    Choice::Row(r) => {
                        swap_rows(&mut a, rows, k, r);
                        eliminate_in_panel(&mut a, k, panel_end);
                        k += 1;
                    }
                    Choice::Reject(why) => {
                        rejected = Some(why);
                        break;
                    }
                }
            }
            update_trailing(&mut a, panel_start, k, panel_end);
            if let Some(why) = rejected {
                // move the column behind the remaining candidates
                cand_end -= 1;
                swap_cols(&mut a, cols, status, k, cand_end);
                status[cand_end] = why;
            }
        }
        Ok(k)
    }
}

fn choose_pivot<T: Entry>(
    a: &ArrayViewMut2<'_, T>,
    rows: &[usize],
    cols: &[usize],
    k: usize,
    rule: &PivotRule<'_>,
) -> Choice {
    let m = a.nrows();
    if k >= m {
        return Choice::Reject(ColumnStatus::Singular);
    }
    let PivotRule::Search {
        tolerance,
        prefer_diagonal,
        can_defer,
        defer_tolerance,
        col_max,
        row_degree,
    } = rule
    else {
        return Choice::Row(k);
    };

    let mut amax = 0.0f64;
    for i in k..m {
        let v = a[[i, k]].magnitude();
        if v > amax {
            amax = v;
        }
    }
    if amax == 0.0 {
        return Choice::Reject(ColumnStatus::Singular);
    }
    let col = cols[k];
    if *can_defer && amax <= defer_tolerance * col_max[col] {
        return Choice::Reject(ColumnStatus::Deferred);
    }

    let threshold = tolerance * amax;
    let acceptable = |v: f64| v > 0.0 && v >= threshold;
    if *prefer_diagonal {
        if let Some(i) = (k..m).find(|&i| rows[i] == col) {
            if acceptable(a[[i, k]].magnitude()) {
                return Choice::Row(i);
            }
        }
    }

    // sparsest acceptable row, then the largest
    let mut best: Option<(usize, usize, f64)> = None;
    for i in k..m {
        let v = a[[i, k]].magnitude();
        if !acceptable(v) {
            continue;
        }
        let d = row_degree[rows[i]];
        let better = match best {
            None => true,
            Some((_, bd, bv)) => d < bd || (d == bd && v > bv),
        };
        if better {
            best = Some((i, d, v));
        }
    }
    match best {
        Some((i, _, _)) => Choice::Row(i),
        None => Choice::Reject(ColumnStatus::Singular),
    }
}

fn swap_rows<T: Entry>(a: &mut ArrayViewMut2<'_, T>, rows: &mut [usize], r1: usize, r2: usize) {
    if r1 == r2 {
        return;
    }
    for j in 0..a.ncols() {
        a.swap([r1, j], [r2, j]);
    }
    rows.swap(r1, r2);
}

fn swap_cols<T: Entry>(
    a: &mut ArrayViewMut2<'_, T>,
    cols: &mut [usize],
    status: &mut [ColumnStatus],
    c1: usize,
    c2: usize,
) {
    if c1 == c2 {
        return;
    }
    for i in 0..a.nrows() {
        a.swap([i, c1], [i, c2]);
    }
    cols.swap(c1, c2);
    status.swap(c1, c2);
}

/// Scales column k of L and applies the rank-1 update to the panel columns.
fn eliminate_in_panel<T: Entry>(a: &mut ArrayViewMut2<'_, T>, k: usize, panel_end: usize) {
    let m = a.nrows();
    let pivot = a[[k, k]];
    if pivot.is_zero() {
        // only reachable when replaying a pivot sequence
        for i in k + 1..m {
            a[[i, k]] = T::zero();
        }
        return;
    }
    let (top, mut bottom) = a.view_mut().split_at(Axis(0), k + 1);
    let u = top.slice(s![k, k + 1..panel_end]);
    for mut row in bottom.rows_mut() {
        let l = row[k] / pivot;
        row[k] = l;
        if !l.is_zero() {
            row.slice_mut(s![k + 1..panel_end]).scaled_add(-l, &u);
        }
    }
}

/// Brings columns `from..` up to date with pivots `p0..p1`: triangular solve
/// for the U block, then one matrix product for the Schur complement.
fn update_trailing<T: Entry>(a: &mut ArrayViewMut2<'_, T>, p0: usize, p1: usize, from: usize) {
    let (m, c) = a.dim();
    if p1 == p0 || from >= c {
        return;
    }
    for t in p0 + 1..p1 {
        let (upper, lower) = a.view_mut().split_at(Axis(0), t);
        let (left, mut right) = lower.split_at(Axis(1), from);
        let mut target = right.row_mut(0);
        for q in p0..t {
            let l = left[[0, q]];
            if !l.is_zero() {
                target.scaled_add(-l, &upper.slice(s![q, from..]));
            }
        }
    }
    if p1 < m {
        let (top, bottom) = a.view_mut().split_at(Axis(0), p1);
        let u12 = top.slice(s![p0..p1, from..]);
        let (left, mut right) = bottom.split_at(Axis(1), from);
        let l21 = left.slice(s![.., p0..p1]);
        general_mat_mul(-T::one(), &l21, &u12, T::one(), &mut right);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn front(rows: usize, cols: usize, n_candidates: usize, values: Vec<f64>) -> FrontalMatrix<f64> {
        FrontalMatrix {
            rows: (0..rows).collect(),
            cols: (0..cols).collect(),
            status: (0..cols)
                .map(|j| {
                    if j < n_candidates {
                        ColumnStatus::Candidate
                    } else {
                        ColumnStatus::Contribution
                    }
                })
                .collect(),
            n_candidates,
            values,
        }
    }

    fn search<'a>(col_max: &'a [f64], row_degree: &'a [usize], can_defer: bool) -> PivotRule<'a> {
        PivotRule::Search {
            tolerance: 0.1,
            prefer_diagonal: false,
            can_defer,
            defer_tolerance: 1e-12,
            col_max,
            row_degree,
        }
    }

    /// Rebuilds the permuted input from the factored front and compares.
    fn check_lu(original: &[f64], f: &FrontalMatrix<f64>, npiv: usize) {
        let (m, c) = (f.rows.len(), f.cols.len());
        for r in 0..m {
            for q in 0..c {
                let mut acc = 0.0;
                for t in 0..npiv.min(r + 1).min(q + 1) {
                    let l = if t == r { 1.0 } else { f.get(r, t) };
                    acc += l * f.get(t, q);
                }
                if r >= npiv && q >= npiv {
                    acc += f.get(r, q);
                }
                let expected = original[f.rows[r] * c + f.cols[q]];
                assert!((acc - expected).abs() < 1e-12, "({r}, {q}): {acc} vs {expected}");
            }
        }
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(32)]
    fn full_factorization_reconstructs(#[case] block: usize) {
        let a = vec![
            2.0, 1.0, 0.0, 4.0, //
            4.0, 3.0, 1.0, 0.0, //
            0.0, 1.0, 5.0, 1.0, //
            1.0, 0.0, 2.0, 6.0,
        ];
        let mut f = front(4, 4, 4, a.clone());
        let col_max = [4.0, 3.0, 5.0, 6.0];
        let deg = [3, 3, 3, 3];
        let npiv = f.factor(&search(&col_max, &deg, false), block).unwrap();
        assert_eq!(npiv, 4);
        check_lu(&a, &f, npiv);
    }

    #[test]
    fn partial_factorization_leaves_schur_complement() {
        // 3x3 front, two candidate columns
        let a = vec![
            4.0, 2.0, 1.0, //
            2.0, 5.0, 3.0, //
            1.0, 3.0, 6.0,
        ];
        let mut f = front(3, 3, 2, a.clone());
        let col_max = [4.0, 5.0, 6.0];
        let deg = [3, 3, 3];
        let npiv = f.factor(&search(&col_max, &deg, true), 2).unwrap();
        assert_eq!(npiv, 2);
        check_lu(&a, &f, npiv);
    }

    #[test]
    fn sparsest_acceptable_row_wins() {
        let a = vec![
            1.0, 0.0, //
            0.5, 1.0,
        ];
        let mut f = front(2, 2, 2, a);
        let col_max = [1.0, 1.0];
        // row 1 has fewer original entries and 0.5 >= 0.1 * 1.0
        let deg = [5, 1];
        f.factor(&search(&col_max, &deg, false), 4).unwrap();
        assert_eq!(f.rows, vec![1, 0]);
    }

    #[test]
    fn diagonal_is_preferred_with_symmetric_rule() {
        let a = vec![
            0.01, 1.0, //
            1.0, 1.0,
        ];
        let mut f = front(2, 2, 2, a);
        let col_max = [1.0, 1.0];
        let deg = [2, 2];
        let rule = PivotRule::Search {
            tolerance: 0.001,
            prefer_diagonal: true,
            can_defer: false,
            defer_tolerance: 0.0,
            col_max: &col_max,
            row_degree: &deg,
        };
        f.factor(&rule, 4).unwrap();
        assert_eq!(f.rows, vec![0, 1]);
    }

    #[test]
    fn zero_column_is_singular_and_moved_back() {
        let a = vec![
            0.0, 1.0, //
            0.0, 2.0,
        ];
        let mut f = front(2, 2, 2, a.clone());
        let col_max = [0.0, 2.0];
        let deg = [1, 1];
        let npiv = f.factor(&search(&col_max, &deg, false), 4).unwrap();
        assert_eq!(npiv, 1);
        assert_eq!(f.cols, vec![1, 0]);
        assert_eq!(f.status[1], ColumnStatus::Singular);
        check_lu(&a, &f, npiv);
    }

    #[test]
    fn tiny_column_is_deferred_when_a_parent_exists() {
        let a = vec![
            1e-20, 1.0, //
            0.0, 1.0,
        ];
        let col_max = [1.0, 1.0];
        let deg = [2, 2];

        let mut f = front(2, 2, 2, a.clone());
        let npiv = f.factor(&search(&col_max, &deg, true), 4).unwrap();
        assert_eq!(npiv, 1);
        assert_eq!(f.cols, vec![1, 0]);
        assert_eq!(f.status[1], ColumnStatus::Deferred);

        // a root front takes the tiny pivot
        let mut f = front(2, 2, 2, a);
        assert_eq!(f.factor(&search(&col_max, &deg, false), 4).unwrap(), 2);
    }

    #[test]
    fn fixed_rule_keeps_the_order() {
        let a = vec![
            1.0, 2.0, //
            3.0, 4.0,
        ];
        let mut f = front(2, 2, 2, a.clone());
        let npiv = f.factor(&PivotRule::Fixed, 1).unwrap();
        assert_eq!(npiv, 2);
        assert_eq!(f.rows, vec![0, 1]);
        check_lu(&a, &f, npiv);
        assert_eq!(f.get(1, 1), -2.0);
    }

    #[test]
    fn complex_front() {
        use num_complex::Complex64;
        let i = Complex64::new(0.0, 1.0);
        let one = Complex64::new(1.0, 0.0);
        let mut f = FrontalMatrix {
            rows: vec![0, 1],
            cols: vec![0, 1],
            status: vec![ColumnStatus::Candidate; 2],
            n_candidates: 2,
            values: vec![i, one, one, i],
        };
        let col_max = [1.0, 1.0];
        let deg = [2, 2];
        let npiv = f.factor(&search(&col_max, &deg, false), 2).unwrap();
        assert_eq!(npiv, 2);
        // det = i*i - 1 = -2, so U(1,1) = -2 / i = 2i
        let u11 = f.get(1, 1);
        assert!((u11 - Complex64::new(0.0, 2.0)).norm() < 1e-14);
    }
}
