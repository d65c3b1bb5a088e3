// SPDX-License-Identifier: LGPL-2.1-or-later
use serde::{Deserialize, Serialize};

/// Ordering and pivoting strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Pick symmetric or unsymmetric from the pattern.
    #[default]
    Auto,
    Unsymmetric,
    Symmetric,
}

/// Fill-reducing ordering used when the caller does not supply one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingMethod {
    #[default]
    MinimumDegree,
    Natural,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scaling {
    None,
    /// Divide each row by the sum of its absolute values.
    #[default]
    Sum,
    /// Divide each row by its largest absolute value.
    Max,
}

/// Solver parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Control {
    pub strategy: Strategy,
    pub ordering: OrderingMethod,
    /// Threshold for partial pivoting with the unsymmetric strategy.
    pub pivot_tolerance: f64,
    /// Threshold for the diagonal pivot with the symmetric strategy.
    pub sym_pivot_tolerance: f64,
    /// A column whose largest candidate is at most this fraction of its
    /// largest original entry is delayed to the parent front.
    pub defer_tolerance: f64,
    pub sym_threshold: f64,
    pub nzdiag_threshold: f64,
    /// Rows with more than `max(16, dense_row * sqrt(n))` entries are ignored
    /// by the ordering.
    pub dense_row: f64,
    pub block_size: usize,
    /// Initial LU storage relative to the symbolic estimate.
    pub alloc_init: f64,
    pub mem_grow: f64,
    /// Cap on the working memory, counted in stored entries.
    pub memory_limit: Option<usize>,
    pub scale: Scaling,
    pub refine_steps: usize,
}

impl Default for Control {
    fn default() -> Self {
        Self {
            strategy: Strategy::Auto,
            ordering: OrderingMethod::MinimumDegree,
            pivot_tolerance: 0.1,
            sym_pivot_tolerance: 0.001,
            defer_tolerance: 1e-12,
            sym_threshold: 0.5,
            nzdiag_threshold: 0.9,
            dense_row: 10.0,
            block_size: 32,
            alloc_init: 1.0,
            mem_grow: 1.2,
            memory_limit: None,
            scale: Scaling::Sum,
            refine_steps: 2,
        }
    }
}

fn clamp_unit(x: f64, fallback: f64) -> f64 {
    if x.is_nan() { fallback } else { x.clamp(0.0, 1.0) }
}

impl Control {
    /// Copy with every parameter pulled back into its valid range.
    pub fn validated(&self) -> Control {
        let defaults = Control::default();
        let mut c = self.clone();
        c.pivot_tolerance = clamp_unit(c.pivot_tolerance, defaults.pivot_tolerance);
        c.sym_pivot_tolerance = clamp_unit(c.sym_pivot_tolerance, defaults.sym_pivot_tolerance);
        c.defer_tolerance = clamp_unit(c.defer_tolerance, defaults.defer_tolerance);
        c.sym_threshold = clamp_unit(c.sym_threshold, defaults.sym_threshold);
        c.nzdiag_threshold = clamp_unit(c.nzdiag_threshold, defaults.nzdiag_threshold);
        if !(c.dense_row > 0.0) {
            c.dense_row = defaults.dense_row;
        }
        c.block_size = c.block_size.max(1);
        if !(c.alloc_init > 0.0) || !c.alloc_init.is_finite() {
            c.alloc_init = defaults.alloc_init;
        }
        if !(c.mem_grow >= 1.0) || !c.mem_grow.is_finite() {
            c.mem_grow = defaults.mem_grow;
        }
        c
    }
}
