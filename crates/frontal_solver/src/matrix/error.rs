// SPDX-License-Identifier: LGPL-2.1-or-later
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CscError {
    #[error("out of bounds index: {index} (max: {max})")]
    OutOfBoundsIndex { index: usize, max: usize },

    #[error("invalid column pointers length: {expected} (actual: {actual})")]
    InvalidColumnPointersLength { expected: usize, actual: usize },

    #[error("invalid column pointers: {index} (expected: {expected}, actual: {actual})")]
    InvalidColumnPointers {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("row indices values length mismatch: {values} (actual: {row_indices})")]
    RowIndicesValuesLengthMismatch { values: usize, row_indices: usize },

    #[error("rows not strictly increasing in column {column}: {previous} followed by {actual}")]
    RowsNotStrictlyIncreasing {
        column: usize,
        previous: usize,
        actual: usize,
    },
}

#[derive(Debug, Error)]
pub enum MatrixMarketError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid MatrixMarket banner: {0}")]
    InvalidBanner(String),

    #[error("unsupported MatrixMarket type: {0}")]
    UnsupportedType(String),

    #[error("invalid size line: {0}")]
    InvalidSizeLine(String),

    #[error("invalid entry at line {line}: {msg}")]
    InvalidEntry { line: usize, msg: String },

    #[error("expected {expected} entries, found {actual}")]
    EntryCountMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Csc(#[from] CscError),
}
