// SPDX-License-Identifier: LGPL-2.1-or-later
//! Scalar types the solver can factorize.
//!
//! Analysis works on patterns only, so real and complex matrices share the
//! symbolic object; numeric factorization and solve are generic over [`Entry`].

use std::fmt::Debug;
use std::ops::{AddAssign, Neg, SubAssign};

use ndarray::LinalgScalar;
use num_complex::Complex64;

use crate::error::{SolverError, SolverResult};

pub trait Entry:
    LinalgScalar + Neg<Output = Self> + AddAssign + SubAssign + PartialEq + Debug + Send + Sync
{
    const IS_COMPLEX: bool;

    /// Absolute value (modulus for complex entries).
    fn magnitude(self) -> f64;

    fn conj(self) -> Self;

    fn from_real(value: f64) -> Self;

    fn div_real(self, divisor: f64) -> Self;

    fn is_finite(self) -> bool;
}

impl Entry for f64 {
    const IS_COMPLEX: bool = false;

    #[inline]
    fn magnitude(self) -> f64 {
        self.abs()
    }

    #[inline]
    fn conj(self) -> Self {
        self
    }

    #[inline]
    fn from_real(value: f64) -> Self {
        value
    }

    #[inline]
    fn div_real(self, divisor: f64) -> Self {
        self / divisor
    }

    #[inline]
    fn is_finite(self) -> bool {
        f64::is_finite(self)
    }
}

impl Entry for Complex64 {
    const IS_COMPLEX: bool = true;

    #[inline]
    fn magnitude(self) -> f64 {
        self.norm()
    }

    #[inline]
    fn conj(self) -> Self {
        Complex64::conj(&self)
    }

    #[inline]
    fn from_real(value: f64) -> Self {
        Complex64::new(value, 0.0)
    }

    #[inline]
    fn div_real(self, divisor: f64) -> Self {
        self / divisor
    }

    #[inline]
    fn is_finite(self) -> bool {
        Complex64::is_finite(self)
    }
}

/// Joins split real and imaginary parts into complex values.
///
/// A missing imaginary part means a purely real matrix stored as complex.
pub fn split_complex(re: &[f64], im: Option<&[f64]>) -> SolverResult<Vec<Complex64>> {
    match im {
        None => Ok(re.iter().map(|&r| Complex64::new(r, 0.0)).collect()),
        Some(im) => {
            if im.len() != re.len() {
                return Err(SolverError::DimensionMismatch {
                    context: "imaginary part",
                    expected: re.len(),
                    actual: im.len(),
                });
            }
            Ok(re
                .iter()
                .zip(im)
                .map(|(&r, &i)| Complex64::new(r, i))
                .collect())
        }
    }
}

/// Infinity norm of a dense vector.
pub(crate) fn inf_norm<T: Entry>(x: &[T]) -> f64 {
    x.iter().fold(0.0, |acc: f64, v| {
        let m = v.magnitude();
        if m.is_nan() || m > acc { m } else { acc }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complex_magnitude_and_conjugate() {
        let z = Complex64::new(3.0, -4.0);
        assert_eq!(z.magnitude(), 5.0);
        assert_eq!(Entry::conj(z), Complex64::new(3.0, 4.0));
        assert_eq!(Entry::conj(2.5f64), 2.5);
    }

    #[test]
    fn split_complex_rejects_mismatched_parts() {
        let err = split_complex(&[1.0, 2.0], Some(&[1.0])).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"dimension mismatch in imaginary part: expected 2, got 1");
    }

    #[test]
    fn split_complex_without_imaginary_part() {
        let z = split_complex(&[1.0, -2.0], None).unwrap();
        assert_eq!(z, vec![Complex64::new(1.0, 0.0), Complex64::new(-2.0, 0.0)]);
    }

    #[test]
    fn inf_norm_propagates_nan() {
        assert!(inf_norm(&[1.0, f64::NAN, 3.0]).is_nan());
        assert_eq!(inf_norm(&[1.0, -7.0, 3.0]), 7.0);
    }
}
