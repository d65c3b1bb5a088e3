// SPDX-License-Identifier: LGPL-2.1-or-later
use crate::control::Scaling;
use crate::entry::Entry;
use crate::matrix::CscPattern;

/// Row scale factors `rs`, the scaled matrix being `a_ij / rs_i`.
/// `None` when scaling is off. Empty rows keep factor 1.
pub(crate) fn row_scale_factors<T: Entry>(
    pattern: &CscPattern,
    values: &[T],
    scaling: Scaling,
) -> Option<Vec<f64>> {
    if scaling == Scaling::None {
        return None;
    }
    let mut rs = vec![0.0f64; pattern.dim.nrows];
    for (&row, &v) in pattern.row_indices.iter().zip(values) {
        let val = v.magnitude();
        match scaling {
            Scaling::Sum => rs[row] += val,
            Scaling::Max => rs[row] = val.max(rs[row]),
            Scaling::None => {}
        }
    }
    // do not scale empty rows
    for r in &mut rs {
        if *r == 0.0 || !r.is_finite() {
            *r = 1.0;
        }
    }
    Some(rs)
}

/// Largest scaled magnitude in each column.
pub(crate) fn column_max<T: Entry>(
    pattern: &CscPattern,
    values: &[T],
    rs: Option<&[f64]>,
) -> Vec<f64> {
    (0..pattern.dim.ncols)
        .map(|j| {
            let (s, e) = (pattern.column_pointers[j], pattern.column_pointers[j + 1]);
            pattern.row_indices[s..e]
                .iter()
                .zip(&values[s..e])
                .map(|(&i, &v)| match rs {
                    Some(rs) => v.magnitude() / rs[i],
                    None => v.magnitude(),
                })
                .fold(0.0, f64::max)
        })
        .collect()
}
