// SPDX-License-Identifier: LGPL-2.1-or-later
use crate::entry::Entry;
use crate::error::{SolverError, SolverResult};
use crate::numeric::memory::MemoryBudget;

/// Contribution block left by a front for its parent.
///
/// `values` is row-major, `rows.len()` x `cols.len()`. Delayed columns still
/// need a pivot and must be offered to the parent as candidates.
#[derive(Debug)]
pub(crate) struct Element<T> {
    pub rows: Vec<usize>,
    pub cols: Vec<usize>,
    pub delayed: Vec<bool>,
    pub values: Vec<T>,
}

impl<T: Copy> Element<T> {
    #[inline]
    pub fn get(&self, r: usize, c: usize) -> T {
        self.values[r * self.cols.len() + c]
    }
}

/// Elements keyed by the id of the front that created them, plus a small
/// pool of freed buffers that later fronts reuse.
#[derive(Debug)]
pub(crate) struct ElementArena<T> {
    slots: Vec<Option<Element<T>>>,
    free: Vec<Vec<T>>,
}

const MAX_POOLED: usize = 8;

impl<T: Entry> ElementArena<T> {
    pub fn new(n_fronts: usize) -> Self {
        Self {
            slots: (0..n_fronts).map(|_| None).collect(),
            free: Vec::new(),
        }
    }

    /// Zero-filled buffer of `len` entries, charged to the budget.
    pub fn acquire(&mut self, len: usize, budget: &mut MemoryBudget) -> SolverResult<Vec<T>> {
        budget.charge(len, "frontal matrix")?;
        // best fit: the smallest pooled buffer that is large enough
        let pick = self
            .free
            .iter()
            .enumerate()
            .filter(|(_, b)| b.capacity() >= len)
            .min_by_key(|(_, b)| b.capacity())
            .map(|(i, _)| i);
        let mut buf = match pick {
            Some(i) => self.free.swap_remove(i),
            None => self.free.pop().unwrap_or_default(),
        };
        buf.clear();
        buf.try_reserve_exact(len)
            .map_err(|_| SolverError::OutOfMemory {
                context: "frontal matrix",
                requested: len,
            })?;
        buf.resize(len, T::zero());
        Ok(buf)
    }

    /// Gives a buffer back to the pool.
    pub fn recycle(&mut self, buf: Vec<T>, budget: &mut MemoryBudget) {
        budget.release(buf.len());
        if self.free.len() < MAX_POOLED {
            self.free.push(buf);
        }
    }

    pub fn store(&mut self, front: usize, element: Element<T>) {
        debug_assert!(self.slots[front].is_none());
        self.slots[front] = Some(element);
    }

    /// Removes the element of `front`; the caller recycles its buffer.
    pub fn take(&mut self, front: usize) -> Option<Element<T>> {
        self.slots[front].take()
    }

    pub fn live(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}
