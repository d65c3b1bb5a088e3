// SPDX-License-Identifier: LGPL-2.1-or-later
//! Approximate minimum degree on a quotient graph.
//!
//! Variables are the columns still to be ordered. Elements are cliques: either
//! rows of A (when ordering A^T A) or the pivots eliminated so far. Degrees
//! use the usual approximation
//!
//! `d(v) = |adj(v)| + |Lp \ v| + sum over other elements e of |Le \ Lp|`
//!
//! capped by the number of remaining variables.

use std::collections::BTreeSet;

use crate::matrix::CscPattern;
use crate::matrix::csc::RowPattern;

/// Rows (or variables) with more entries than this are left out of the graph.
pub(crate) fn dense_cutoff(dense_row: f64, n: usize) -> usize {
    let cut = (dense_row * (n as f64).sqrt()).max(16.0);
    if cut >= n as f64 { n } else { cut as usize }
}

struct QuotientGraph {
    alive: Vec<bool>,
    n_alive: usize,
    var_adj: Vec<Vec<usize>>,
    var_elems: Vec<Vec<usize>>,
    elem_vars: Vec<Vec<usize>>,
    elem_alive: Vec<bool>,
    degree: Vec<usize>,
    queue: BTreeSet<(usize, usize)>,
    mark: Vec<usize>,
    elem_mark: Vec<usize>,
    elem_w: Vec<usize>,
    stamp: usize,
}

impl QuotientGraph {
    /// `skip[v]` variables are not ordered here; callers append them last.
    fn new(
        var_adj: Vec<Vec<usize>>,
        elem_vars: Vec<Vec<usize>>,
        skip: &[bool],
    ) -> Self {
        let n = var_adj.len();
        let ne = elem_vars.len();
        let mut var_elems = vec![Vec::new(); n];
        for (e, vars) in elem_vars.iter().enumerate() {
            for &v in vars {
                var_elems[v].push(e);
            }
        }
        let alive: Vec<bool> = skip.iter().map(|&s| !s).collect();
        let n_alive = alive.iter().filter(|&&a| a).count();

        let mut degree = vec![0; n];
        let mut queue = BTreeSet::new();
        for v in 0..n {
            if !alive[v] {
                continue;
            }
            let mut d = var_adj[v].len();
            for &e in &var_elems[v] {
                d += elem_vars[e].len() - 1;
            }
            degree[v] = d.min(n_alive - 1);
            queue.insert((degree[v], v));
        }

        Self {
            alive,
            n_alive,
            var_adj,
            var_elems,
            elem_vars,
            elem_alive: vec![true; ne],
            degree,
            queue,
            mark: vec![0; n],
            elem_mark: vec![0; ne],
            elem_w: vec![0; ne],
            stamp: 0,
        }
    }

    fn order(mut self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.n_alive);
        while let Some(&(_, p)) = self.queue.iter().next() {
            self.eliminate(p);
            order.push(p);
        }
        order
    }

    fn eliminate(&mut self, p: usize) {
        self.stamp += 1;
        let stamp = self.stamp;
        self.queue.remove(&(self.degree[p], p));
        self.alive[p] = false;
        self.n_alive -= 1;

        // Lp: pattern of the new element
        let mut lp = Vec::new();
        self.mark[p] = stamp;
        for &u in &self.var_adj[p] {
            if self.alive[u] && self.mark[u] != stamp {
                self.mark[u] = stamp;
                lp.push(u);
            }
        }
        for e in std::mem::take(&mut self.var_elems[p]) {
            if !self.elem_alive[e] {
                continue;
            }
            for &u in &self.elem_vars[e] {
                if self.alive[u] && self.mark[u] != stamp {
                    self.mark[u] = stamp;
                    lp.push(u);
                }
            }
            // absorbed into the new element
            self.elem_alive[e] = false;
            self.elem_vars[e] = Vec::new();
        }
        self.var_adj[p] = Vec::new();
        if lp.is_empty() {
            return;
        }

        let q = self.elem_vars.len();
        self.elem_vars.push(lp.clone());
        self.elem_alive.push(true);
        self.elem_mark.push(0);
        self.elem_w.push(0);

        // |Le \ Lp| for every element touching Lp
        for &v in &lp {
            for &e in &self.var_elems[v] {
                if !self.elem_alive[e] {
                    continue;
                }
                if self.elem_mark[e] != stamp {
                    self.elem_mark[e] = stamp;
                    self.elem_w[e] = self.elem_vars[e].len();
                }
                self.elem_w[e] -= 1;
            }
        }
        // elements covered by Lp are redundant
        for &v in &lp {
            for &e in &self.var_elems[v] {
                if self.elem_alive[e] && self.elem_mark[e] == stamp && self.elem_w[e] == 0 {
                    self.elem_alive[e] = false;
                    self.elem_vars[e] = Vec::new();
                }
            }
        }

        let cap = self.n_alive.saturating_sub(1);
        for &v in &lp {
            self.var_elems[v].retain(|&e| self.elem_alive[e]);
            self.var_elems[v].push(q);
            self.var_adj[v].retain(|&u| self.alive[u] && self.mark[u] != stamp);

            let mut d = self.var_adj[v].len() + lp.len() - 1;
            for &e in &self.var_elems[v] {
                if e != q {
                    d += self.elem_w[e];
                }
            }
            let d = d.min(cap);
            self.queue.remove(&(self.degree[v], v));
            self.degree[v] = d;
            self.queue.insert((d, v));
        }
    }
}

fn append_skipped(mut order: Vec<usize>, skip: &[bool]) -> Vec<usize> {
    order.extend((0..skip.len()).filter(|&v| skip[v]));
    order
}

/// Minimum degree on the pattern of `A + A^T` (diagonal ignored). Variables
/// adjacent to more than `dense` others are ordered last.
pub(crate) fn order_symmetric(pattern: &CscPattern, dense: usize) -> Vec<usize> {
    let n = pattern.dim.ncols;
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
    for j in 0..n {
        for &i in pattern.col(j) {
            if i != j && i < n {
                adj[j].push(i);
                adj[i].push(j);
            }
        }
    }
    for a in &mut adj {
        a.sort_unstable();
        a.dedup();
    }
    let skip: Vec<bool> = adj.iter().map(|a| a.len() > dense).collect();
    if skip.iter().any(|&s| s) {
        for a in &mut adj {
            a.retain(|&u| !skip[u]);
        }
    }
    let order = QuotientGraph::new(adj, Vec::new(), &skip).order();
    append_skipped(order, &skip)
}

/// Minimum degree on `A^T A` without forming it: every row of A is an initial
/// element. Rows with more than `dense` entries are ignored.
pub(crate) fn order_normal_equations(
    pattern: &CscPattern,
    rows: &RowPattern,
    dense: usize,
) -> Vec<usize> {
    let n = pattern.dim.ncols;
    let elems: Vec<Vec<usize>> = (0..rows.nrows())
        .filter(|&i| rows.row_len(i) <= dense && rows.row_len(i) > 1)
        .map(|i| rows.cols(i).to_vec())
        .collect();
    let skip = vec![false; n];
    QuotientGraph::new(vec![Vec::new(); n], elems, &skip).order()
}

/// Number of rows the A^T A ordering leaves out.
pub(crate) fn count_dense_rows(rows: &RowPattern, dense: usize) -> usize {
    (0..rows.nrows()).filter(|&i| rows.row_len(i) > dense).count()
}
