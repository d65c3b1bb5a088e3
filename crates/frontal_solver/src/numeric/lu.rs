// SPDX-License-Identifier: LGPL-2.1-or-later
use log::warn;

use crate::entry::Entry;
use crate::error::{SolverError, SolverResult};
use crate::numeric::memory::MemoryBudget;
use crate::utils::checked_add;

/// Growable sparse storage for the factors.
///
/// Column k of L (strictly below the unit diagonal) and row k of U (strictly
/// right of the diagonal) are appended in pivot order. Indices are original
/// row/column numbers until [`LuFactors::finalize`] maps them to pivot
/// positions.
#[derive(Debug, Clone)]
pub(crate) struct LuFactors<T> {
    pub l_ptr: Vec<usize>,
    pub l_idx: Vec<usize>,
    pub l_val: Vec<T>,
    pub u_ptr: Vec<usize>,
    pub u_idx: Vec<usize>,
    pub u_val: Vec<T>,
    pub u_diag: Vec<T>,
    pub nrealloc: usize,
}

fn grow<T>(v: &mut Vec<T>, needed: usize, factor: f64, what: &'static str) -> SolverResult<bool> {
    if needed <= v.capacity() {
        return Ok(false);
    }
    let target = ((v.capacity() as f64 * factor).ceil() as usize).max(needed);
    v.try_reserve_exact(target - v.len())
        .map_err(|_| SolverError::OutOfMemory {
            context: what,
            requested: target,
        })?;
    Ok(true)
}

impl<T: Entry> LuFactors<T> {
    /// Reserves `l_cap` / `u_cap` off-diagonal entries up front.
    pub fn with_capacity(
        n: usize,
        l_cap: usize,
        u_cap: usize,
        budget: &mut MemoryBudget,
    ) -> SolverResult<Self> {
        let total = checked_add(checked_add(l_cap, u_cap, "LU storage")?, n, "LU storage")?;
        budget.charge(total, "LU storage")?;
        let mut lu = Self {
            l_ptr: Vec::with_capacity(n + 1),
            l_idx: Vec::new(),
            l_val: Vec::new(),
            u_ptr: Vec::with_capacity(n + 1),
            u_idx: Vec::new(),
            u_val: Vec::new(),
            u_diag: Vec::with_capacity(n),
            nrealloc: 0,
        };
        let oom = |requested| SolverError::OutOfMemory {
            context: "LU storage",
            requested,
        };
        lu.l_idx.try_reserve_exact(l_cap).map_err(|_| oom(l_cap))?;
        lu.l_val.try_reserve_exact(l_cap).map_err(|_| oom(l_cap))?;
        lu.u_idx.try_reserve_exact(u_cap).map_err(|_| oom(u_cap))?;
        lu.u_val.try_reserve_exact(u_cap).map_err(|_| oom(u_cap))?;
        lu.l_ptr.push(0);
        lu.u_ptr.push(0);
        Ok(lu)
    }

    pub fn n_pivots(&self) -> usize {
        self.u_diag.len()
    }

    /// Makes room for one more pivot with the given counts, growing by
    /// `mem_grow` when full.
    pub fn reserve(
        &mut self,
        l_count: usize,
        u_count: usize,
        mem_grow: f64,
        budget: &mut MemoryBudget,
    ) -> SolverResult<()> {
        let l_before = self.l_val.capacity();
        let u_before = self.u_val.capacity();
        let l_need = checked_add(self.l_val.len(), l_count, "L storage")?;
        let u_need = checked_add(self.u_val.len(), u_count, "U storage")?;
        let l_grew = grow(&mut self.l_val, l_need, mem_grow, "L storage")?;
        let u_grew = grow(&mut self.u_val, u_need, mem_grow, "U storage")?;
        if l_grew {
            grow(&mut self.l_idx, self.l_val.capacity(), 1.0, "L storage")?;
        }
        if u_grew {
            grow(&mut self.u_idx, self.u_val.capacity(), 1.0, "U storage")?;
        }
        if l_grew || u_grew {
            self.nrealloc += 1;
            let added = (self.l_val.capacity() - l_before) + (self.u_val.capacity() - u_before);
            budget.charge(added, "LU storage")?;
            warn!(
                "LU storage reallocated ({} L / {} U entries)",
                self.l_val.capacity(),
                self.u_val.capacity()
            );
        }
        Ok(())
    }

    /// Appends one pivot. L multipliers and U entries carry original indices.
    pub fn push_pivot(
        &mut self,
        diag: T,
        l: impl IntoIterator<Item = (usize, T)>,
        u: impl IntoIterator<Item = (usize, T)>,
    ) {
        for (i, v) in l {
            self.l_idx.push(i);
            self.l_val.push(v);
        }
        for (j, v) in u {
            self.u_idx.push(j);
            self.u_val.push(v);
        }
        self.l_ptr.push(self.l_idx.len());
        self.u_ptr.push(self.u_idx.len());
        self.u_diag.push(diag);
    }

    /// Rewrites L row indices and U column indices as pivot positions.
    pub fn finalize(&mut self, row_pos: &[usize], col_pos: &[usize]) {
        for i in &mut self.l_idx {
            *i = row_pos[*i];
        }
        for j in &mut self.u_idx {
            *j = col_pos[*j];
        }
        debug_assert!((0..self.n_pivots()).all(|k| self.l_col(k).all(|(i, _)| i > k)));
        debug_assert!((0..self.n_pivots()).all(|k| self.u_row(k).all(|(j, _)| j > k)));
    }

    /// Off-diagonal entries of column k of L.
    pub fn l_col(&self, k: usize) -> impl Iterator<Item = (usize, T)> + '_ {
        let (s, e) = (self.l_ptr[k], self.l_ptr[k + 1]);
        self.l_idx[s..e].iter().copied().zip(self.l_val[s..e].iter().copied())
    }

    /// Off-diagonal entries of row k of U.
    pub fn u_row(&self, k: usize) -> impl Iterator<Item = (usize, T)> + '_ {
        let (s, e) = (self.u_ptr[k], self.u_ptr[k + 1]);
        self.u_idx[s..e].iter().copied().zip(self.u_val[s..e].iter().copied())
    }

    /// Entries held, unit diagonal of L and diagonal of U included.
    pub fn lnz(&self) -> usize {
        self.l_val.len() + self.n_pivots()
    }

    pub fn unz(&self) -> usize {
        self.u_val.len() + self.n_pivots()
    }
}
