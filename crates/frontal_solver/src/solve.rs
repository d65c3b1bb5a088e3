// SPDX-License-Identifier: LGPL-2.1-or-later
//! Forward/backward substitution with the factors of [`Numeric`], plus
//! iterative refinement against the original matrix.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::control::Control;
use crate::entry::{Entry, inf_norm};
use crate::error::{SolverError, SolverResult, Status};
use crate::info::Info;
use crate::matrix::CscMatrix;
use crate::numeric::Numeric;
use crate::timing::Stopwatch;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveMode {
    /// `A x = b`
    #[default]
    A,
    /// `A^T x = b`
    Transpose,
    /// `A^H x = b`, same as `Transpose` for real entries.
    ConjugateTranspose,
}

/// `s / d`, with a zero pivot contributing a zero component.
#[inline]
fn divide<T: Entry>(s: T, d: T) -> T {
    if !d.is_zero() {
        s / d
    } else if s.is_finite() {
        T::zero()
    } else {
        s
    }
}

impl<T: Entry> Numeric<T> {
    /// Solves `op(A) x = b`. When `a` is given and `control.refine_steps > 0`
    /// the solution is refined against it.
    pub fn solve(
        &self,
        a: Option<&CscMatrix<T>>,
        b: &[T],
        mode: SolveMode,
        control: &Control,
        info: &mut Info,
    ) -> SolverResult<Vec<T>> {
        let sw = Stopwatch::start();
        info.status = Status::Ok;
        let result = self.solve_refined(a, b, mode, control, info);
        info.solve_time = sw.stop();
        info.record(result)
    }

    /// Like [`Numeric::solve`], overwriting `b` with the solution.
    pub fn solve_in_place(
        &self,
        a: Option<&CscMatrix<T>>,
        b: &mut [T],
        mode: SolveMode,
        control: &Control,
        info: &mut Info,
    ) -> SolverResult<()> {
        let x = self.solve(a, b, mode, control, info)?;
        b.copy_from_slice(&x);
        Ok(())
    }

    fn solve_refined(
        &self,
        a: Option<&CscMatrix<T>>,
        b: &[T],
        mode: SolveMode,
        control: &Control,
        info: &mut Info,
    ) -> SolverResult<Vec<T>> {
        if !self.valid {
            return Err(SolverError::InvalidNumericObject {
                reason: "factorization was invalidated by a failed refactorization",
            });
        }
        if b.len() != self.n {
            return Err(SolverError::DimensionMismatch {
                context: "right-hand side",
                expected: self.n,
                actual: b.len(),
            });
        }
        let mut x = b.to_vec();
        self.solve_factored(&mut x, mode);

        info.refine_steps = 0;
        info.residual_norm = 0.0;
        let Some(a) = a else {
            return Ok(x);
        };
        if a.dim.nrows != self.n || a.dim.ncols != self.n {
            return Err(SolverError::DimensionMismatch {
                context: "matrix",
                expected: self.n,
                actual: a.dim.nrows.max(a.dim.ncols),
            });
        }

        let b_norm = inf_norm(b);
        let mut r = residual(a, &x, b, mode);
        let mut best = inf_norm(&r);
        for step in 0..control.refine_steps {
            if best == 0.0 || !best.is_finite() {
                break;
            }
            let mut d = r.clone();
            self.solve_factored(&mut d, mode);
            let candidate: Vec<T> = x.iter().zip(&d).map(|(&xi, &di)| xi + di).collect();
            let r_new = residual(a, &candidate, b, mode);
            let norm = inf_norm(&r_new);
            // keep the better iterate
            if !(norm < best) {
                break;
            }
            x = candidate;
            r = r_new;
            best = norm;
            info.refine_steps = step + 1;
        }
        info.residual_norm = if b_norm > 0.0 { best / b_norm } else { best };
        debug!(
            "solve: {} refinement steps, relative residual {:.3e}",
            info.refine_steps, info.residual_norm
        );
        Ok(x)
    }

    /// One pass through the factors, `x` holding `b` on entry.
    pub(crate) fn solve_factored(&self, x: &mut [T], mode: SolveMode) {
        let n = self.n;
        let lu = &self.lu;
        let mut w = vec![T::zero(); n];
        match mode {
            SolveMode::A => {
                for (k, wk) in w.iter_mut().enumerate() {
                    let i = self.row_perm[k];
                    *wk = match &self.row_scale {
                        Some(rs) => x[i].div_real(rs[i]),
                        None => x[i],
                    };
                }
                for k in 0..n {
                    let yk = w[k];
                    for (i, l) in lu.l_col(k) {
                        w[i] -= l * yk;
                    }
                }
                for k in (0..n).rev() {
                    let mut s = w[k];
                    for (j, u) in lu.u_row(k) {
                        s -= u * w[j];
                    }
                    w[k] = divide(s, lu.u_diag[k]);
                }
                for (k, &wk) in w.iter().enumerate() {
                    x[self.col_perm[k]] = wk;
                }
            }
            SolveMode::Transpose | SolveMode::ConjugateTranspose => {
                let conj = |v: T| {
                    if mode == SolveMode::ConjugateTranspose {
                        v.conj()
                    } else {
                        v
                    }
                };
                for (k, wk) in w.iter_mut().enumerate() {
                    *wk = x[self.col_perm[k]];
                }
                for k in 0..n {
                    let yk = divide(w[k], conj(lu.u_diag[k]));
                    w[k] = yk;
                    for (j, u) in lu.u_row(k) {
                        w[j] -= conj(u) * yk;
                    }
                }
                for k in (0..n).rev() {
                    let mut s = w[k];
                    for (i, l) in lu.l_col(k) {
                        s -= conj(l) * w[i];
                    }
                    w[k] = s;
                }
                for (k, &wk) in w.iter().enumerate() {
                    let i = self.row_perm[k];
                    x[i] = match &self.row_scale {
                        Some(rs) => wk.div_real(rs[i]),
                        None => wk,
                    };
                }
            }
        }
    }
}

fn residual<T: Entry>(a: &CscMatrix<T>, x: &[T], b: &[T], mode: SolveMode) -> Vec<T> {
    let ax = match mode {
        SolveMode::A => a.matvec(x),
        SolveMode::Transpose => a.matvec_transpose(x, false),
        SolveMode::ConjugateTranspose => a.matvec_transpose(x, true),
    };
    b.iter().zip(ax).map(|(&bi, axi)| bi - axi).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::MatrixBuilder;
    use crate::ordering::ColumnOrdering;
    use crate::symbolic::analyze;
    use num_complex::Complex64;
    use rstest::rstest;

    fn sample() -> CscMatrix<f64> {
        let mut b = MatrixBuilder::new(3, 3);
        for (c, r, v) in [
            (0, 0, 4.0),
            (0, 1, 1.0),
            (1, 0, -2.0),
            (1, 1, 5.0),
            (1, 2, 1.0),
            (2, 0, 1.0),
            (2, 2, 3.0),
        ] {
            b.push(c, r, v).unwrap();
        }
        b.build_csc().unwrap()
    }

    fn factor<T: Entry>(a: &CscMatrix<T>, control: &Control) -> Numeric<T> {
        let mut info = Info::default();
        let symbolic = analyze(&a.pattern(), ColumnOrdering::Auto, control, &mut info).unwrap();
        Numeric::factorize(&symbolic, &a.values, control, &mut info).unwrap()
    }

    #[rstest]
    #[case(SolveMode::A)]
    #[case(SolveMode::Transpose)]
    #[case(SolveMode::ConjugateTranspose)]
    fn solves_each_mode(#[case] mode: SolveMode) {
        let a = sample();
        let control = Control {
            refine_steps: 0,
            ..Control::default()
        };
        let numeric = factor(&a, &control);
        let x_true = [1.0, -2.0, 0.5];
        let b = residual(&a, &x_true, &[0.0; 3], mode)
            .iter()
            .map(|v| -v)
            .collect::<Vec<_>>();
        let mut info = Info::default();
        let x = numeric.solve(None, &b, mode, &control, &mut info).unwrap();
        for (xi, ti) in x.iter().zip(x_true) {
            assert!((xi - ti).abs() < 1e-12);
        }
        assert_eq!(info.refine_steps, 0);
    }

    #[test]
    fn complex_conjugate_transpose() {
        let i = Complex64::new(0.0, 1.0);
        let one = Complex64::new(1.0, 0.0);
        let mut b = MatrixBuilder::new(2, 2);
        b.push(0, 0, 2.0 * one + i).unwrap();
        b.push(0, 1, i).unwrap();
        b.push(1, 0, one).unwrap();
        b.push(1, 1, 3.0 * one).unwrap();
        let a = b.build_csc().unwrap();
        let control = Control::default();
        let numeric = factor(&a, &control);
        let x_true = [one - i, 2.0 * i];
        for mode in [SolveMode::A, SolveMode::Transpose, SolveMode::ConjugateTranspose] {
            let rhs: Vec<Complex64> = residual(&a, &x_true, &[Complex64::new(0.0, 0.0); 2], mode)
                .into_iter()
                .map(|v| -v)
                .collect();
            let mut info = Info::default();
            let x = numeric.solve(Some(&a), &rhs, mode, &control, &mut info).unwrap();
            for (xi, ti) in x.iter().zip(x_true) {
                assert!((xi - ti).norm() < 1e-12, "{mode:?}: {xi} vs {ti}");
            }
        }
    }

    #[test]
    fn refinement_reports_residual() {
        let a = sample();
        let control = Control::default();
        let numeric = factor(&a, &control);
        let mut info = Info::default();
        let b = [1.0, 2.0, 3.0];
        let x = numeric.solve(Some(&a), &b, SolveMode::A, &control, &mut info).unwrap();
        assert!(info.residual_norm < 1e-13);
        assert!(info.refine_steps <= control.refine_steps);
        let r = residual(&a, &x, &b, SolveMode::A);
        assert!(inf_norm(&r) < 1e-12);
    }

    #[test]
    fn singular_solve_stays_finite() {
        let mut b = MatrixBuilder::new(2, 2);
        b.push(0, 0, 1.0).unwrap();
        b.push(1, 0, 2.0).unwrap();
        b.push(0, 1, 2.0).unwrap();
        b.push(1, 1, 4.0).unwrap();
        let a = b.build_csc().unwrap();
        let control = Control::default();
        let numeric = factor(&a, &control);
        assert!(numeric.is_singular());
        let mut info = Info::default();
        let x = numeric
            .solve(Some(&a), &[1.0, 1.0], SolveMode::A, &control, &mut info)
            .unwrap();
        assert!(x.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn nan_propagates() {
        let a = sample();
        let control = Control::default();
        let numeric = factor(&a, &control);
        let mut info = Info::default();
        let x = numeric
            .solve(Some(&a), &[f64::NAN, 1.0, 1.0], SolveMode::A, &control, &mut info)
            .unwrap();
        assert!(x.iter().any(|v| v.is_nan()));
    }

    #[test]
    fn wrong_rhs_length() {
        let a = sample();
        let control = Control::default();
        let numeric = factor(&a, &control);
        let mut info = Info::default();
        let err = numeric
            .solve(None, &[1.0, 2.0], SolveMode::A, &control, &mut info)
            .unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"dimension mismatch in right-hand side: expected 3, got 2");
        assert_eq!(info.status, Status::DimensionMismatch);
    }

    #[test]
    fn solve_in_place_overwrites() {
        let a = sample();
        let control = Control::default();
        let numeric = factor(&a, &control);
        let mut info = Info::default();
        let mut b = vec![1.0, 2.0, 3.0];
        let x = numeric.solve(Some(&a), &b, SolveMode::A, &control, &mut info).unwrap();
        numeric
            .solve_in_place(Some(&a), &mut b, SolveMode::A, &control, &mut info)
            .unwrap();
        assert_eq!(b, x);
    }
}
