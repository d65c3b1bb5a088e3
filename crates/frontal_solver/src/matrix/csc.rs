// SPDX-License-Identifier: LGPL-2.1-or-later
use crate::entry::Entry;
use crate::matrix::Dim;
use crate::matrix::error::CscError;

/// Sparsity pattern of a CSC matrix (no values).
///
/// The symbolic analysis only looks at this part of a matrix and keeps an
/// owned copy of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CscPattern {
    pub dim: Dim,
    /// Column pointers, len = ncols + 1
    pub column_pointers: Vec<usize>,
    /// Row indices, len = nnz
    pub row_indices: Vec<usize>,
}

/// Compressed Sparse Column matrix
/// - column pointers are the indices of the start and end of each column
/// - row indices are the indices of the rows of the non zero values
/// - values are the non zero values
#[derive(Debug, Clone)]
pub struct CscMatrix<T = f64> {
    pub dim: Dim,
    /// Column pointers, len = ncols + 1
    pub column_pointers: Vec<usize>,
    /// Row indices, len = nnz
    pub row_indices: Vec<usize>,
    /// Nonzero values, len = nnz
    pub values: Vec<T>,
}

/// Row-wise copy of a pattern. `csc_positions[p]` is the index of the entry
/// in the CSC arrays, so values can be gathered row by row without sorting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowPattern {
    pub row_pointers: Vec<usize>,
    pub column_indices: Vec<usize>,
    pub csc_positions: Vec<usize>,
}

impl RowPattern {
    pub fn nrows(&self) -> usize {
        self.row_pointers.len() - 1
    }

    pub fn row_len(&self, i: usize) -> usize {
        self.row_pointers[i + 1] - self.row_pointers[i]
    }

    /// Column indices of row i, increasing.
    pub fn cols(&self, i: usize) -> &[usize] {
        &self.column_indices[self.row_pointers[i]..self.row_pointers[i + 1]]
    }

    /// (column, csc position) pairs of row i.
    pub fn entries(&self, i: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        let (s, e) = (self.row_pointers[i], self.row_pointers[i + 1]);
        self.column_indices[s..e]
            .iter()
            .copied()
            .zip(self.csc_positions[s..e].iter().copied())
    }
}

fn check_csc(
    dim: Dim,
    column_pointers: &[usize],
    row_indices: &[usize],
    nvalues: usize,
) -> Result<(), CscError> {
    let nnz = row_indices.len();
    if column_pointers.len() != dim.ncols + 1 {
        return Err(CscError::InvalidColumnPointersLength {
            expected: dim.ncols + 1,
            actual: column_pointers.len(),
        });
    }
    if column_pointers[0] != 0 {
        return Err(CscError::InvalidColumnPointers {
            index: 0,
            expected: 0,
            actual: column_pointers[0],
        });
    }
    if column_pointers[dim.ncols] != nnz {
        return Err(CscError::InvalidColumnPointers {
            index: dim.ncols,
            expected: nnz,
            actual: column_pointers[dim.ncols],
        });
    }
    if nvalues != nnz {
        return Err(CscError::RowIndicesValuesLengthMismatch {
            values: nvalues,
            row_indices: nnz,
        });
    }
    // per-column sorted & in-range
    for j in 0..dim.ncols {
        let (start, end) = (column_pointers[j], column_pointers[j + 1]);
        if start > end || end > nnz {
            return Err(CscError::InvalidColumnPointers {
                index: j + 1,
                expected: start,
                actual: end,
            });
        }
        let mut prev = None;
        for &r in &row_indices[start..end] {
            if r >= dim.nrows {
                return Err(CscError::OutOfBoundsIndex {
                    index: r,
                    max: dim.nrows,
                });
            }
            if let Some(p) = prev {
                if r <= p {
                    return Err(CscError::RowsNotStrictlyIncreasing {
                        column: j,
                        previous: p,
                        actual: r,
                    });
                }
            }
            prev = Some(r);
        }
    }
    Ok(())
}

impl CscPattern {
    pub fn new(
        nrows: usize,
        ncols: usize,
        column_pointers: Vec<usize>,
        row_indices: Vec<usize>,
    ) -> Result<Self, CscError> {
        let pattern = Self {
            dim: Dim { nrows, ncols },
            column_pointers,
            row_indices,
        };
        pattern.check_invariants()?;
        Ok(pattern)
    }

    /// number of non zero values
    pub fn nnz(&self) -> usize {
        self.row_indices.len()
    }

    pub fn is_square(&self) -> bool {
        self.dim.is_square()
    }

    pub fn check_invariants(&self) -> Result<(), CscError> {
        check_csc(
            self.dim,
            &self.column_pointers,
            &self.row_indices,
            self.row_indices.len(),
        )
    }

    /// Row indices of column j.
    pub fn col(&self, j: usize) -> &[usize] {
        &self.row_indices[self.column_pointers[j]..self.column_pointers[j + 1]]
    }

    /// Whether entry (i, j) is structurally present. Rows must be sorted.
    pub fn contains(&self, i: usize, j: usize) -> bool {
        self.col(j).binary_search(&i).is_ok()
    }

    /// Transpose the pattern into rows, O(n + nnz) with counting sort by row.
    pub fn transpose_pattern(&self) -> RowPattern {
        let m = self.dim.nrows;
        let nnz = self.nnz();

        let mut rp = vec![0usize; m + 1];
        for &r in &self.row_indices {
            rp[r + 1] += 1;
        }
        for i in 0..m {
            rp[i + 1] += rp[i];
        }

        let mut ci = vec![0usize; nnz];
        let mut pos = vec![0usize; nnz];
        let mut next = rp.clone();
        for j in 0..self.dim.ncols {
            for p in self.column_pointers[j]..self.column_pointers[j + 1] {
                let r = self.row_indices[p];
                ci[next[r]] = j;
                pos[next[r]] = p;
                next[r] += 1;
            }
        }
        RowPattern {
            row_pointers: rp,
            column_indices: ci,
            csc_positions: pos,
        }
    }
}

impl<T: Entry> CscMatrix<T> {
    pub fn new(
        nrows: usize,
        ncols: usize,
        column_pointers: Vec<usize>,
        row_indices: Vec<usize>,
        values: Vec<T>,
    ) -> Result<Self, CscError> {
        let a = Self {
            dim: Dim { nrows, ncols },
            column_pointers,
            row_indices,
            values,
        };
        a.check_invariants()?;
        Ok(a)
    }

    /// Square identity matrix.
    pub fn identity(n: usize) -> Self {
        Self {
            dim: Dim { nrows: n, ncols: n },
            column_pointers: (0..=n).collect(),
            row_indices: (0..n).collect(),
            values: vec![T::one(); n],
        }
    }

    /// number of non zero values
    pub fn nnz(&self) -> usize {
        self.row_indices.len()
    }

    pub fn is_square(&self) -> bool {
        self.dim.is_square()
    }

    pub fn check_invariants(&self) -> Result<(), CscError> {
        check_csc(
            self.dim,
            &self.column_pointers,
            &self.row_indices,
            self.values.len(),
        )
    }

    /// Owned copy of the pattern.
    pub fn pattern(&self) -> CscPattern {
        CscPattern {
            dim: self.dim,
            column_pointers: self.column_pointers.clone(),
            row_indices: self.row_indices.clone(),
        }
    }

    /// Whether this matrix has exactly the given pattern.
    pub fn has_pattern(&self, pattern: &CscPattern) -> bool {
        self.dim == pattern.dim
            && self.column_pointers == pattern.column_pointers
            && self.row_indices == pattern.row_indices
    }

    /// Return (row_indices, values) slice for column j
    pub fn col(&self, j: usize) -> (&[usize], &[T]) {
        let (s, e) = (self.column_pointers[j], self.column_pointers[j + 1]);
        (&self.row_indices[s..e], &self.values[s..e])
    }

    /// y[rows] += alpha * A(:, j)
    pub fn axpy_into_dense_col(&self, j: usize, alpha: T, y: &mut [T]) {
        let (rows, vals) = self.col(j);
        for (&i, &a) in rows.iter().zip(vals.iter()) {
            y[i] += alpha * a;
        }
    }

    /// y = A x
    pub fn matvec(&self, x: &[T]) -> Vec<T> {
        let mut y = vec![T::zero(); self.dim.nrows];
        for (j, &xj) in x.iter().enumerate().take(self.dim.ncols) {
            // NaN is not zero, so it still reaches the product
            if !xj.is_zero() {
                self.axpy_into_dense_col(j, xj, &mut y);
            }
        }
        y
    }

    /// y = A^T x, or A^H x when `conjugate` is set.
    pub fn matvec_transpose(&self, x: &[T], conjugate: bool) -> Vec<T> {
        let mut y = vec![T::zero(); self.dim.ncols];
        for (j, yj) in y.iter_mut().enumerate() {
            let (rows, vals) = self.col(j);
            let mut acc = T::zero();
            for (&i, &a) in rows.iter().zip(vals.iter()) {
                let a = if conjugate { a.conj() } else { a };
                acc += a * x[i];
            }
            *yj = acc;
        }
        y
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    fn sample() -> CscMatrix<f64> {
        // A = [ 10  0  3
        //        0 20  0
        //        2  0 35 ]
        CscMatrix::new(
            3,
            3,
            vec![0, 2, 3, 5],
            vec![0, 2, 1, 0, 2],
            vec![10.0, 2.0, 20.0, 3.0, 35.0],
        )
        .unwrap()
    }

    #[test]
    fn rejects_unsorted_rows() {
        let err = CscPattern::new(3, 1, vec![0, 2], vec![2, 1]).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"rows not strictly increasing in column 0: 2 followed by 1");
    }

    #[test]
    fn rejects_bad_pointer_length() {
        let err = CscMatrix::<f64>::new(2, 2, vec![0, 1], vec![0], vec![1.0]).unwrap_err();
        assert_eq!(
            err,
            CscError::InvalidColumnPointersLength {
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn rejects_out_of_range_row() {
        let err = CscPattern::new(2, 1, vec![0, 1], vec![5]).unwrap_err();
        assert_eq!(err, CscError::OutOfBoundsIndex { index: 5, max: 2 });
    }

    #[test]
    fn rejects_values_length_mismatch() {
        let err = CscMatrix::new(2, 1, vec![0, 1], vec![0], vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            CscError::RowIndicesValuesLengthMismatch { values: 2, row_indices: 1 }
        ));
    }

    #[test]
    fn matvec_and_transpose() {
        let a = sample();
        assert_eq!(a.matvec(&[1.0, 1.0, 1.0]), vec![13.0, 20.0, 37.0]);
        assert_eq!(a.matvec_transpose(&[1.0, 1.0, 1.0], false), vec![12.0, 20.0, 38.0]);
    }

    #[test]
    fn conjugate_transpose_product() {
        let a = CscMatrix::new(
            1,
            1,
            vec![0, 1],
            vec![0],
            vec![Complex64::new(0.0, 2.0)],
        )
        .unwrap();
        let x = [Complex64::new(1.0, 0.0)];
        assert_eq!(a.matvec_transpose(&x, false), vec![Complex64::new(0.0, 2.0)]);
        assert_eq!(a.matvec_transpose(&x, true), vec![Complex64::new(0.0, -2.0)]);
    }

    #[test]
    fn transpose_pattern_maps_back_to_csc() {
        let a = sample();
        let rows = a.pattern().transpose_pattern();
        assert_eq!(rows.row_pointers, vec![0, 2, 3, 5]);
        assert_eq!(rows.column_indices, vec![0, 2, 1, 0, 2]);
        for i in 0..3 {
            for (j, p) in rows.entries(i) {
                assert_eq!(a.row_indices[p], i);
                assert!(a.column_pointers[j] <= p && p < a.column_pointers[j + 1]);
            }
        }
    }

    #[test]
    fn pattern_contains() {
        let p = sample().pattern();
        assert!(p.contains(2, 0));
        assert!(!p.contains(1, 0));
    }
}
