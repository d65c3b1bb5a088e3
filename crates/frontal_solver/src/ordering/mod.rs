// SPDX-License-Identifier: LGPL-2.1-or-later
//! Column pre-ordering.
//!
//! The symmetric strategy orders `A + A^T` and keeps the result as is. The
//! unsymmetric strategy orders `A^T A` and then postorders the column
//! elimination tree so that fronts are contiguous.

pub mod etree;
mod min_degree;

use log::debug;

use crate::control::{Control, OrderingMethod, Strategy};
use crate::error::SolverResult;
use crate::info::OrderingSource;
use crate::matrix::CscPattern;
use crate::matrix::csc::RowPattern;
use crate::utils::check_permutation;

pub use etree::{column_etree, postorder};

/// A fill-reducing column ordering supplied by the caller.
///
/// `symmetric` tells which graph to order: `A + A^T` when true, `A^T A`
/// otherwise. The result is checked to be a permutation of `0..ncols`.
pub trait FillReducingOrdering {
    fn order(&self, pattern: &CscPattern, symmetric: bool) -> SolverResult<Vec<usize>>;
}

/// Approximate minimum degree on the quotient graph.
#[derive(Debug, Clone, Copy)]
pub struct MinimumDegree {
    pub dense_row: f64,
}

impl Default for MinimumDegree {
    fn default() -> Self {
        Self { dense_row: 10.0 }
    }
}

impl FillReducingOrdering for MinimumDegree {
    fn order(&self, pattern: &CscPattern, symmetric: bool) -> SolverResult<Vec<usize>> {
        let dense = min_degree::dense_cutoff(self.dense_row, pattern.dim.ncols);
        if symmetric {
            Ok(min_degree::order_symmetric(pattern, dense))
        } else {
            let rows = pattern.transpose_pattern();
            Ok(min_degree::order_normal_equations(pattern, &rows, dense))
        }
    }
}

/// Identity order.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalOrdering;

impl FillReducingOrdering for NaturalOrdering {
    fn order(&self, pattern: &CscPattern, _symmetric: bool) -> SolverResult<Vec<usize>> {
        Ok((0..pattern.dim.ncols).collect())
    }
}

/// Where the column pre-order comes from.
#[derive(Clone, Copy, Default)]
pub enum ColumnOrdering<'a> {
    /// Computed with the method selected by [`Control::ordering`].
    #[default]
    Auto,
    /// Caller's permutation, `q[k]` is the column placed at position `k`.
    Given(&'a [usize]),
    Custom(&'a dyn FillReducingOrdering),
}

impl std::fmt::Debug for ColumnOrdering<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnOrdering::Auto => write!(f, "Auto"),
            ColumnOrdering::Given(q) => f.debug_tuple("Given").field(q).finish(),
            ColumnOrdering::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Structural symmetry of a square pattern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternStats {
    /// Matched off-diagonal entries over all off-diagonal entries, 1 when
    /// there are none.
    pub symmetry: f64,
    pub nz_diag: usize,
    pub offdiag: usize,
}

pub fn pattern_stats(pattern: &CscPattern) -> PatternStats {
    let n = pattern.dim.ncols.min(pattern.dim.nrows);
    let mut nz_diag = 0;
    let mut offdiag = 0;
    let mut matched = 0;
    for j in 0..pattern.dim.ncols {
        for &i in pattern.col(j) {
            if i == j {
                nz_diag += 1;
                continue;
            }
            offdiag += 1;
            if i < n && j < n && pattern.contains(j, i) {
                matched += 1;
            }
        }
    }
    let symmetry = if offdiag == 0 {
        1.0
    } else {
        matched as f64 / offdiag as f64
    };
    PatternStats {
        symmetry,
        nz_diag,
        offdiag,
    }
}

/// Turns `Strategy::Auto` into a concrete strategy.
pub(crate) fn resolve_strategy(control: &Control, pattern: &CscPattern, stats: &PatternStats) -> Strategy {
    match control.strategy {
        Strategy::Auto => {
            let n = pattern.dim.ncols;
            let diag_fraction = if n == 0 {
                1.0
            } else {
                stats.nz_diag as f64 / n as f64
            };
            if pattern.is_square()
                && stats.symmetry >= control.sym_threshold
                && diag_fraction >= control.nzdiag_threshold
            {
                Strategy::Symmetric
            } else {
                Strategy::Unsymmetric
            }
        }
        s => s,
    }
}

pub(crate) struct PreOrder {
    pub order: Vec<usize>,
    pub source: OrderingSource,
    pub dense_rows: usize,
}

/// Column order before any postordering.
pub(crate) fn pre_order(
    pattern: &CscPattern,
    rows: &RowPattern,
    ordering: ColumnOrdering<'_>,
    strategy: Strategy,
    control: &Control,
) -> SolverResult<PreOrder> {
    let n = pattern.dim.ncols;
    let symmetric = strategy == Strategy::Symmetric;
    let dense = min_degree::dense_cutoff(control.dense_row, n);
    let mut dense_rows = 0;

    let (order, source) = match ordering {
        ColumnOrdering::Auto => match control.ordering {
            OrderingMethod::Natural => ((0..n).collect(), OrderingSource::Natural),
            OrderingMethod::MinimumDegree => {
                let order = if symmetric {
                    min_degree::order_symmetric(pattern, dense)
                } else {
                    dense_rows = min_degree::count_dense_rows(rows, dense);
                    min_degree::order_normal_equations(pattern, rows, dense)
                };
                (order, OrderingSource::MinimumDegree)
            }
        },
        ColumnOrdering::Given(q) => {
            check_permutation(q, n)?;
            (q.to_vec(), OrderingSource::Given)
        }
        ColumnOrdering::Custom(f) => {
            let q = f.order(pattern, symmetric)?;
            check_permutation(&q, n)?;
            (q, OrderingSource::Custom)
        }
    };
    debug!(
        "column pre-order: {:?} for {:?} strategy, {} dense rows ignored",
        source, strategy, dense_rows
    );
    Ok(PreOrder {
        order,
        source,
        dense_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PermutationError, SolverError};

    fn pattern(n: usize, cols: &[&[usize]]) -> CscPattern {
        let mut cp = vec![0];
        let mut ri = Vec::new();
        for c in cols {
            ri.extend_from_slice(c);
            cp.push(ri.len());
        }
        CscPattern::new(n, cols.len(), cp, ri).unwrap()
    }

    #[test]
    fn symmetric_pattern_picks_symmetric_strategy() {
        let p = pattern(3, &[&[0, 1], &[0, 1, 2], &[1, 2]]);
        let stats = pattern_stats(&p);
        assert_eq!(stats.symmetry, 1.0);
        assert_eq!(stats.nz_diag, 3);
        assert_eq!(resolve_strategy(&Control::default(), &p, &stats), Strategy::Symmetric);
    }

    #[test]
    fn zero_diagonal_picks_unsymmetric_strategy() {
        let p = pattern(3, &[&[1], &[0, 2], &[1]]);
        let stats = pattern_stats(&p);
        assert_eq!(stats.nz_diag, 0);
        assert_eq!(stats.symmetry, 1.0);
        assert_eq!(resolve_strategy(&Control::default(), &p, &stats), Strategy::Unsymmetric);
    }

    #[test]
    fn one_sided_pattern_is_unsymmetric() {
        // upper triangular
        let p = pattern(3, &[&[0], &[0, 1], &[0, 1, 2]]);
        let stats = pattern_stats(&p);
        assert_eq!(stats.symmetry, 0.0);
        assert_eq!(stats.offdiag, 3);
        assert_eq!(resolve_strategy(&Control::default(), &p, &stats), Strategy::Unsymmetric);
    }

    #[test]
    fn explicit_strategy_is_kept() {
        let p = pattern(2, &[&[1], &[0]]);
        let control = Control {
            strategy: Strategy::Symmetric,
            ..Control::default()
        };
        assert_eq!(
            resolve_strategy(&control, &p, &pattern_stats(&p)),
            Strategy::Symmetric
        );
    }

    struct Reversed;

    impl FillReducingOrdering for Reversed {
        fn order(&self, pattern: &CscPattern, _symmetric: bool) -> SolverResult<Vec<usize>> {
            Ok((0..pattern.dim.ncols).rev().collect())
        }
    }

    struct Broken;

    impl FillReducingOrdering for Broken {
        fn order(&self, _pattern: &CscPattern, _symmetric: bool) -> SolverResult<Vec<usize>> {
            Ok(vec![0, 0, 0])
        }
    }

    #[test]
    fn custom_and_given_orders_are_used_verbatim() {
        let p = pattern(3, &[&[0], &[1], &[2]]);
        let rows = p.transpose_pattern();
        let control = Control::default();
        let pre = pre_order(&p, &rows, ColumnOrdering::Custom(&Reversed), Strategy::Symmetric, &control).unwrap();
        assert_eq!(pre.order, vec![2, 1, 0]);
        assert_eq!(pre.source, OrderingSource::Custom);

        let pre = pre_order(&p, &rows, ColumnOrdering::Given(&[1, 2, 0]), Strategy::Unsymmetric, &control).unwrap();
        assert_eq!(pre.order, vec![1, 2, 0]);
    }

    #[test]
    fn invalid_custom_order_is_rejected() {
        let p = pattern(3, &[&[0], &[1], &[2]]);
        let rows = p.transpose_pattern();
        let err = pre_order(&p, &rows, ColumnOrdering::Custom(&Broken), Strategy::Symmetric, &Control::default())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            SolverError::InvalidPermutation(PermutationError::Duplicate { value: 0 })
        ));
    }

    #[test]
    fn minimum_degree_trait_matches_auto() {
        let p = pattern(4, &[&[0, 3], &[1, 3], &[2, 3], &[0, 1, 2, 3]]);
        let rows = p.transpose_pattern();
        let control = Control::default();
        let auto = pre_order(&p, &rows, ColumnOrdering::Auto, Strategy::Symmetric, &control).unwrap();
        let md = MinimumDegree::default().order(&p, true).unwrap();
        assert_eq!(auto.order, md);
        assert_eq!(auto.source, OrderingSource::MinimumDegree);
    }
}
