// SPDX-License-Identifier: LGPL-2.1-or-later
use crate::error::{PermutationError, SolverError, SolverResult};

/// `inv[perm[k]] = k`
pub(crate) fn inverse_permutation(perm: &[usize]) -> Vec<usize> {
    let mut inv = vec![0usize; perm.len()];
    for (k, &p) in perm.iter().enumerate() {
        inv[p] = k;
    }
    inv
}

pub(crate) fn check_permutation(perm: &[usize], n: usize) -> Result<(), PermutationError> {
    if perm.len() != n {
        return Err(PermutationError::WrongLength {
            expected: n,
            actual: perm.len(),
        });
    }
    let mut seen = vec![false; n];
    for (position, &value) in perm.iter().enumerate() {
        if value >= n {
            return Err(PermutationError::OutOfRange { position, value, n });
        }
        if seen[value] {
            return Err(PermutationError::Duplicate { value });
        }
        seen[value] = true;
    }
    Ok(())
}

/// `vec![value; len]` that reports allocation failure instead of aborting.
pub(crate) fn try_vec<T: Clone>(len: usize, value: T, context: &'static str) -> SolverResult<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| SolverError::OutOfMemory {
            context,
            requested: len,
        })?;
    v.resize(len, value);
    Ok(v)
}

pub(crate) fn checked_mul(a: usize, b: usize, context: &'static str) -> SolverResult<usize> {
    a.checked_mul(b).ok_or(SolverError::Overflow { context })
}

pub(crate) fn checked_add(a: usize, b: usize, context: &'static str) -> SolverResult<usize> {
    a.checked_add(b).ok_or(SolverError::Overflow { context })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[0, 0, 1], PermutationError::Duplicate { value: 0 })]
    #[case(&[0, 3, 1], PermutationError::OutOfRange { position: 1, value: 3, n: 3 })]
    #[case(&[0, 1], PermutationError::WrongLength { expected: 3, actual: 2 })]
    fn rejects_non_bijections(#[case] perm: &[usize], #[case] expected: PermutationError) {
        assert_eq!(check_permutation(perm, 3), Err(expected));
    }

    #[test]
    fn inverse_roundtrip() {
        let p = [2, 0, 3, 1];
        assert!(check_permutation(&p, 4).is_ok());
        let inv = inverse_permutation(&p);
        assert_eq!(inv, vec![1, 3, 0, 2]);
        for k in 0..4 {
            assert_eq!(inv[p[k]], k);
        }
    }

    #[test]
    fn overflow_is_reported() {
        assert!(matches!(
            checked_mul(usize::MAX, 2, "test"),
            Err(SolverError::Overflow { context: "test" })
        ));
    }
}
