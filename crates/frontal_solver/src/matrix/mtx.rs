// SPDX-License-Identifier: LGPL-2.1-or-later
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use num_complex::Complex64;

use crate::matrix::builder::MatrixBuilder;
use crate::matrix::csc::CscMatrix;
use crate::matrix::error::MatrixMarketError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MmField {
    Integer,
    Real,
    Complex,
    Pattern,
}

/// A matrix read from a MatrixMarket file, real or complex depending on the
/// banner's field.
#[derive(Debug, Clone)]
pub enum MatrixMarketData {
    Real(CscMatrix<f64>),
    Complex(CscMatrix<Complex64>),
}

impl MatrixMarketData {
    pub fn dim(&self) -> crate::matrix::Dim {
        match self {
            MatrixMarketData::Real(a) => a.dim,
            MatrixMarketData::Complex(a) => a.dim,
        }
    }

    pub fn nnz(&self) -> usize {
        match self {
            MatrixMarketData::Real(a) => a.nnz(),
            MatrixMarketData::Complex(a) => a.nnz(),
        }
    }
}

enum Builder {
    Real(MatrixBuilder<f64>),
    Complex(MatrixBuilder<Complex64>),
}

/// Load a sparse matrix from a MatrixMarket `.mtx` file (coordinate format) into a canonical CSC.
///
/// Supports:
/// - banner: `%%MatrixMarket matrix coordinate {integer|real|complex|pattern} general`
/// - 1-based indices in the file, converted to 0-based indices internally.
pub fn load_matrix_market_csc_file(
    path: impl AsRef<Path>,
) -> Result<MatrixMarketData, MatrixMarketError> {
    let f = File::open(path.as_ref())?;
    load_matrix_market_csc_from_reader(BufReader::new(f))
}

fn parse_value<V: std::str::FromStr>(
    token: &str,
    what: &str,
    line: usize,
) -> Result<V, MatrixMarketError>
where
    V::Err: std::fmt::Display,
{
    token.parse().map_err(|e| MatrixMarketError::InvalidEntry {
        line,
        msg: format!("bad {what} '{token}': {e}"),
    })
}

/// Same as [`load_matrix_market_csc_file`], but reads from any buffered reader (useful for tests).
pub fn load_matrix_market_csc_from_reader<R: BufRead>(
    reader: R,
) -> Result<MatrixMarketData, MatrixMarketError> {
    let mut lines = reader.lines().enumerate();

    // Header (first non-empty line)
    let (header_line_no, header) = loop {
        match lines.next() {
            None => return Err(MatrixMarketError::InvalidBanner("empty input".to_string())),
            Some((i, line)) => {
                let line = line?;
                let t = line.trim();
                if t.is_empty() {
                    continue;
                }
                // tolerate BOM
                let t = t.trim_start_matches('\u{feff}');
                break (i + 1, t.to_string());
            }
        }
    };

    let tokens: Vec<&str> = header.split_whitespace().collect();
    if tokens.len() != 5 {
        return Err(MatrixMarketError::InvalidBanner(format!(
            "expected 5 tokens, got {} at line {}: {:?}",
            tokens.len(),
            header_line_no,
            header
        )));
    }

    if tokens[0] != "%%MatrixMarket" {
        return Err(MatrixMarketError::InvalidBanner(format!(
            "missing %%MatrixMarket at line {header_line_no}: {header}"
        )));
    }
    let object = tokens[1].to_ascii_lowercase();
    let format = tokens[2].to_ascii_lowercase();
    if object != "matrix" || format != "coordinate" {
        return Err(MatrixMarketError::UnsupportedType(format!(
            "only 'matrix coordinate' is supported, got '{}' '{}' (line {header_line_no})",
            tokens[1], tokens[2]
        )));
    }
    if !tokens[4].eq_ignore_ascii_case("general") {
        return Err(MatrixMarketError::UnsupportedType(format!(
            "only 'general' symmetry is supported, got '{}' (line {header_line_no})",
            tokens[4]
        )));
    }
    let field = match tokens[3].to_ascii_lowercase().as_str() {
        "integer" => MmField::Integer,
        "real" => MmField::Real,
        "complex" => MmField::Complex,
        "pattern" => MmField::Pattern,
        other => {
            return Err(MatrixMarketError::UnsupportedType(format!(
                "unknown field '{other}' (line {header_line_no})"
            )));
        }
    };

    // Size line (skip comments/empty)
    let (size_line_no, size_line) = loop {
        match lines.next() {
            None => {
                return Err(MatrixMarketError::InvalidSizeLine(
                    "missing size line".to_string(),
                ));
            }
            Some((i, line)) => {
                let line = line?;
                let t = line.trim();
                if t.is_empty() || t.starts_with('%') {
                    continue;
                }
                break (i + 1, t.to_string());
            }
        }
    };

    let parts: Vec<&str> = size_line.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(MatrixMarketError::InvalidSizeLine(format!(
            "expected 3 integers at line {size_line_no}: {size_line}"
        )));
    }
    let mut sizes = [0usize; 3];
    for (slot, token) in sizes.iter_mut().zip(&parts) {
        *slot = token.parse().map_err(|e| {
            MatrixMarketError::InvalidSizeLine(format!(
                "bad size '{token}' at line {size_line_no}: {size_line} ({e})"
            ))
        })?;
    }
    let [nrows, ncols, nnz] = sizes;

    let mut builder = match field {
        MmField::Complex => Builder::Complex(MatrixBuilder::new(nrows, ncols)),
        _ => Builder::Real(MatrixBuilder::new(nrows, ncols)),
    };
    match &mut builder {
        Builder::Real(b) => b.reserve(nnz),
        Builder::Complex(b) => b.reserve(nnz),
    }
    let expected_tokens = match field {
        MmField::Pattern => 2,
        MmField::Integer | MmField::Real => 3,
        MmField::Complex => 4,
    };

    let mut read_entries = 0usize;
    for (i, line) in lines {
        let line_no = i + 1;
        let line = line?;
        let t = line.trim();
        if t.is_empty() || t.starts_with('%') {
            continue;
        }
        if read_entries >= nnz {
            return Err(MatrixMarketError::InvalidEntry {
                line: line_no,
                msg: format!("found more than nnz={nnz} entries"),
            });
        }

        let parts: Vec<&str> = t.split_whitespace().collect();
        if parts.len() != expected_tokens {
            return Err(MatrixMarketError::InvalidEntry {
                line: line_no,
                msg: format!("expected {expected_tokens} tokens, got: {t}"),
            });
        }

        let row_1: usize = parse_value(parts[0], "row index", line_no)?;
        let col_1: usize = parse_value(parts[1], "col index", line_no)?;
        if row_1 == 0 || col_1 == 0 {
            return Err(MatrixMarketError::InvalidEntry {
                line: line_no,
                msg: "MatrixMarket indices are 1-based; found 0".to_string(),
            });
        }
        let (row, col) = (row_1 - 1, col_1 - 1);

        // MatrixBuilder expects (column, row, value)
        match (&mut builder, field) {
            (Builder::Real(b), MmField::Integer) => {
                let v: i64 = parse_value(parts[2], "integer value", line_no)?;
                b.push(col, row, v as f64)?;
            }
            (Builder::Real(b), MmField::Real) => {
                let v: f64 = parse_value(parts[2], "real value", line_no)?;
                b.push(col, row, v)?;
            }
            (Builder::Real(b), _) => {
                b.push(col, row, 1.0)?;
            }
            (Builder::Complex(b), _) => {
                let re: f64 = parse_value(parts[2], "real part", line_no)?;
                let im: f64 = parse_value(parts[3], "imaginary part", line_no)?;
                b.push(col, row, Complex64::new(re, im))?;
            }
        }
        read_entries += 1;
    }

    if read_entries != nnz {
        return Err(MatrixMarketError::EntryCountMismatch {
            expected: nnz,
            actual: read_entries,
        });
    }

    Ok(match builder {
        Builder::Real(b) => MatrixMarketData::Real(b.build_csc()?),
        Builder::Complex(b) => MatrixMarketData::Complex(b.build_csc()?),
    })
}
