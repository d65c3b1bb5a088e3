// SPDX-License-Identifier: LGPL-2.1-or-later
pub mod builder;
pub mod csc;
pub mod error;
pub mod mtx;

use serde::Serialize;

pub use builder::MatrixBuilder;
pub use csc::{CscMatrix, CscPattern};
pub use error::{CscError, MatrixMarketError};
pub use mtx::{MatrixMarketData, load_matrix_market_csc_file, load_matrix_market_csc_from_reader};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dim {
    pub nrows: usize,
    pub ncols: usize,
}

impl Dim {
    pub fn is_square(&self) -> bool {
        self.nrows == self.ncols
    }
}
