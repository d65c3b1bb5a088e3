// SPDX-License-Identifier: LGPL-2.1-or-later
//! Multifrontal sparse LU factorization of square matrices.
//!
//! The flow is `analyze` (pattern only, reusable), [`Numeric::factorize`]
//! and [`Numeric::solve`]:
//!
//! ```no_run
//! use frontal_solver::{Control, Info, Numeric, SolveMode, analyze, ColumnOrdering};
//! # fn run(a: &frontal_solver::CscMatrix, b: &[f64]) -> frontal_solver::SolverResult<Vec<f64>> {
//! let control = Control::default();
//! let mut info = Info::default();
//! let symbolic = analyze(&a.pattern(), ColumnOrdering::Auto, &control, &mut info)?;
//! let numeric = Numeric::factorize(&symbolic, &a.values, &control, &mut info)?;
//! numeric.solve(Some(a), b, SolveMode::A, &control, &mut info)
//! # }
//! ```

pub mod control;
pub mod entry;
pub mod error;
pub mod info;
pub mod matrix;
pub mod numeric;
pub mod ordering;
pub mod solve;
pub mod symbolic;
pub mod timing;
mod utils;

pub use control::{Control, OrderingMethod, Scaling, Strategy};
pub use entry::{Entry, split_complex};
pub use error::{PermutationError, SolverError, SolverResult, Status};
pub use info::{Info, OrderingSource};
pub use matrix::{CscMatrix, CscPattern, MatrixBuilder, MatrixMarketData};
pub use numeric::{Diagnostics, Numeric};
pub use ordering::{ColumnOrdering, FillReducingOrdering, MinimumDegree, NaturalOrdering};
pub use solve::SolveMode;
pub use symbolic::{Estimates, Symbolic, analyze};
pub use timing::{Clock, Elapsed, Stopwatch, SystemClock, TimeRecord, tic, toc};
