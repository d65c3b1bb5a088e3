// SPDX-License-Identifier: LGPL-2.1-or-later
use crate::entry::Entry;
use crate::matrix::Dim;
use crate::matrix::csc::CscMatrix;
use crate::matrix::error::CscError;

#[derive(Debug, Clone, Copy)]
struct CooEntry<T> {
    column: usize,
    row: usize,
    value: T,
}

/// Builder from triplets (COO -> canonical CSC).
///
/// Usage:
///   let mut b = MatrixBuilder::new(nrows, ncols);
///   b.reserve(nnz_guess);
///   b.push(j, i, v)?; ...
///   let a = b.build_csc()?;  // sorted rows per column, duplicates summed
#[derive(Debug)]
pub struct MatrixBuilder<T = f64> {
    dim: Dim,
    /// COO entries in insertion order.
    entries: Vec<CooEntry<T>>,
}

impl<T: Entry> MatrixBuilder<T> {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            dim: Dim { nrows, ncols },
            entries: Vec::new(),
        }
    }

    pub fn reserve(&mut self, nnz: usize) {
        self.entries.reserve(nnz);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// push a COO (column, row, value) tuple, returns the entry index
    pub fn push(&mut self, column: usize, row: usize, value: T) -> Result<usize, CscError> {
        if column >= self.dim.ncols {
            return Err(CscError::OutOfBoundsIndex {
                index: column,
                max: self.dim.ncols,
            });
        }
        if row >= self.dim.nrows {
            return Err(CscError::OutOfBoundsIndex {
                index: row,
                max: self.dim.nrows,
            });
        }
        self.entries.push(CooEntry { column, row, value });
        Ok(self.entries.len() - 1)
    }

    /// Explicit zeros (and duplicates that cancel) are kept as structural entries.
    pub fn build_csc(mut self) -> Result<CscMatrix<T>, CscError> {
        let n = self.dim.ncols;

        // stable, so duplicates are summed in insertion order
        self.entries.sort_by_key(|e| (e.column, e.row));

        let mut combined: Vec<CooEntry<T>> = Vec::with_capacity(self.entries.len());
        for e in self.entries {
            match combined.last_mut() {
                Some(last) if last.column == e.column && last.row == e.row => {
                    last.value += e.value;
                }
                _ => combined.push(e),
            }
        }

        let mut column_pointers = vec![0usize; n + 1];
        for e in &combined {
            column_pointers[e.column + 1] += 1;
        }
        for j in 0..n {
            column_pointers[j + 1] += column_pointers[j];
        }

        let (row_indices, values) = combined.into_iter().map(|e| (e.row, e.value)).unzip();
        let a = CscMatrix {
            dim: self.dim,
            column_pointers,
            row_indices,
            values,
        };
        a.check_invariants()?;
        Ok(a)
    }
}
