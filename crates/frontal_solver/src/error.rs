// SPDX-License-Identifier: LGPL-2.1-or-later
use serde::Serialize;
use thiserror::Error;

use crate::matrix::error::{CscError, MatrixMarketError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermutationError {
    #[error("expected {expected} entries, got {actual}")]
    WrongLength { expected: usize, actual: usize },
    #[error("entry {position} is {value}, outside 0..{n}")]
    OutOfRange {
        position: usize,
        value: usize,
        n: usize,
    },
    #[error("column {value} appears more than once")]
    Duplicate { value: usize },
}

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("invalid matrix: {0}")]
    InvalidMatrix(#[from] CscError),

    #[error("only square matrices can be factorized (nrows={nrows}, ncols={ncols})")]
    NonSquare { nrows: usize, ncols: usize },

    #[error("invalid column permutation: {0}")]
    InvalidPermutation(#[from] PermutationError),

    #[error("symbolic object does not match: {reason}")]
    InvalidSymbolicObject { reason: &'static str },

    #[error("numeric factorization is not usable: {reason}")]
    InvalidNumericObject { reason: &'static str },

    #[error("out of memory in {context} (requested {requested} entries)")]
    OutOfMemory {
        context: &'static str,
        requested: usize,
    },

    #[error("integer overflow in {context}")]
    Overflow { context: &'static str },

    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    MatrixMarket(#[from] MatrixMarketError),
}

pub type SolverResult<T> = Result<T, SolverError>;

/// Outcome of the last call, as reported in [`crate::Info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Ok,
    /// Factorization succeeded but some pivots are zero.
    Singular,
    InvalidMatrix,
    NonSquare,
    InvalidPermutation,
    InvalidSymbolicObject,
    InvalidNumericObject,
    OutOfMemory,
    Overflow,
    DimensionMismatch,
    MatrixMarket,
}

impl SolverError {
    pub fn status(&self) -> Status {
        match self {
            SolverError::InvalidMatrix(_) => Status::InvalidMatrix,
            SolverError::NonSquare { .. } => Status::NonSquare,
            SolverError::InvalidPermutation(_) => Status::InvalidPermutation,
            SolverError::InvalidSymbolicObject { .. } => Status::InvalidSymbolicObject,
            SolverError::InvalidNumericObject { .. } => Status::InvalidNumericObject,
            SolverError::OutOfMemory { .. } => Status::OutOfMemory,
            SolverError::Overflow { .. } => Status::Overflow,
            SolverError::DimensionMismatch { .. } => Status::DimensionMismatch,
            SolverError::MatrixMarket(_) => Status::MatrixMarket,
        }
    }
}
