// SPDX-License-Identifier: LGPL-2.1-or-later
use crate::error::{SolverError, SolverResult};

/// Running count of the entries held by one factorization: LU storage,
/// the current front and live contribution blocks.
#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryBudget {
    limit: Option<usize>,
    in_use: usize,
    peak: usize,
}

impl MemoryBudget {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            limit,
            in_use: 0,
            peak: 0,
        }
    }

    pub fn charge(&mut self, entries: usize, context: &'static str) -> SolverResult<()> {
        let total = self
            .in_use
            .checked_add(entries)
            .ok_or(SolverError::Overflow { context })?;
        if let Some(limit) = self.limit {
            if total > limit {
                return Err(SolverError::OutOfMemory {
                    context,
                    requested: entries,
                });
            }
        }
        self.in_use = total;
        self.peak = self.peak.max(total);
        Ok(())
    }

    pub fn release(&mut self, entries: usize) {
        self.in_use = self.in_use.saturating_sub(entries);
    }

    pub fn peak(&self) -> usize {
        self.peak
    }
}
