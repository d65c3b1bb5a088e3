// SPDX-License-Identifier: LGPL-2.1-or-later
#![allow(dead_code)]

use frontal_solver::{CscMatrix, Entry, MatrixBuilder, Numeric};
use num_complex::Complex64;

/// Small deterministic generator for test matrices.
pub struct XorShift64(u64);

impl XorShift64 {
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// Uniform in [-1, 1).
    pub fn next_signed(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0
    }

    pub fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }
}

/// Random unsymmetric sparse matrix with a strong entry on a random
/// permutation of the diagonal, so it is well conditioned but needs row
/// pivoting when `shuffle` is set.
pub fn random_matrix(n: usize, per_col: usize, seed: u64, shuffle: bool) -> CscMatrix<f64> {
    let mut rng = XorShift64::new(seed);
    let mut target: Vec<usize> = (0..n).collect();
    if shuffle {
        for i in (1..n).rev() {
            let j = rng.below(i + 1);
            target.swap(i, j);
        }
    }
    let mut b = MatrixBuilder::new(n, n);
    for j in 0..n {
        for _ in 0..per_col {
            b.push(j, rng.below(n), rng.next_signed()).unwrap();
        }
        b.push(j, target[j], 2.0 * per_col as f64 + 1.0).unwrap();
    }
    b.build_csc().unwrap()
}

pub fn random_complex_matrix(n: usize, per_col: usize, seed: u64) -> CscMatrix<Complex64> {
    let mut rng = XorShift64::new(seed);
    let mut b = MatrixBuilder::new(n, n);
    for j in 0..n {
        for _ in 0..per_col {
            let v = Complex64::new(rng.next_signed(), rng.next_signed());
            b.push(j, rng.below(n), v).unwrap();
        }
        b.push(j, j, Complex64::new(2.0 * per_col as f64 + 2.0, 1.0)).unwrap();
    }
    b.build_csc().unwrap()
}

/// Five-point Laplacian on a k x k grid.
pub fn laplacian_2d(k: usize) -> CscMatrix<f64> {
    let n = k * k;
    let mut b = MatrixBuilder::new(n, n);
    for x in 0..k {
        for y in 0..k {
            let j = x * k + y;
            b.push(j, j, 4.0).unwrap();
            if x > 0 {
                b.push(j, j - k, -1.0).unwrap();
            }
            if x + 1 < k {
                b.push(j, j + k, -1.0).unwrap();
            }
            if y > 0 {
                b.push(j, j - 1, -1.0).unwrap();
            }
            if y + 1 < k {
                b.push(j, j + 1, -1.0).unwrap();
            }
        }
    }
    b.build_csc().unwrap()
}

pub fn rhs(n: usize) -> Vec<f64> {
    (0..n).map(|i| 1.0 + (i + 1) as f64 / n as f64).collect()
}

fn inf_norm<T: Entry>(x: &[T]) -> f64 {
    x.iter().map(|v| v.magnitude()).fold(0.0, f64::max)
}

/// `|b - A x| / (|A| |x| + |b|)` in the infinity norm.
pub fn backward_error<T: Entry>(a: &CscMatrix<T>, x: &[T], b: &[T]) -> f64 {
    let ax = a.matvec(x);
    let r: Vec<T> = b.iter().zip(&ax).map(|(&bi, &axi)| bi - axi).collect();
    let mut row_sums = vec![0.0f64; a.dim.nrows];
    for (&i, v) in a.row_indices.iter().zip(&a.values) {
        row_sums[i] += v.magnitude();
    }
    let a_norm = row_sums.into_iter().fold(0.0, f64::max);
    inf_norm(&r) / (a_norm * inf_norm(x) + inf_norm(b))
}

/// Largest entry of `P R A Q - L U`, formed densely.
pub fn reconstruction_error(a: &CscMatrix<f64>, numeric: &Numeric<f64>) -> f64 {
    let n = numeric.n();
    let (l, u) = (numeric.lower().unwrap(), numeric.upper().unwrap());
    let (p, q) = (numeric.row_permutation(), numeric.column_permutation());
    let mut pos = vec![0; n];
    for (k, &i) in p.iter().enumerate() {
        pos[i] = k;
    }
    let mut diff = vec![0.0; n * n];
    for (c, &j) in q.iter().enumerate() {
        let (rows, vals) = a.col(j);
        for (&i, &v) in rows.iter().zip(vals) {
            let scaled = numeric.row_scale().map_or(v, |rs| v / rs[i]);
            diff[pos[i] * n + c] += scaled;
        }
    }
    for k in 0..n {
        let (ui, uv) = u.col(k);
        for (&t, &ukt) in ui.iter().zip(uv) {
            let (li, lv) = l.col(t);
            for (&i, &lit) in li.iter().zip(lv) {
                diff[i * n + k] -= lit * ukt;
            }
        }
    }
    diff.into_iter().map(f64::abs).fold(0.0, f64::max)
}
