//! Variance-minimizing break optimizers
//!
//! Two strategies partition an ascending-sorted value sample into `k`
//! contiguous classes minimizing the total within-class variance:
//!
//! - [`heuristic_breaks`] - a local-search optimizer that shifts boundary
//!   elements between adjacent classes; fast, not guaranteed optimal
//! - [`optimal_breaks`] - a dynamic-programming solver that is globally
//!   optimal at `O(n^2 * k)` cost
//!
//! Both return the starting index of each class in the sorted input and both
//! are pure, side-effect-free computations suitable for worker threads. An
//! optional cooperative cancellation flag is checked once per outer
//! iteration.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::{Result, ThematicError};

mod exact;
mod heuristic;

pub use exact::optimal_breaks;
pub use heuristic::heuristic_breaks;

/// Which optimizer a natural-breaks classification uses.
///
/// Both strategies share the same contract: sorted input, class count guard,
/// class start indices out. They are interchangeable behind this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakStrategy {
    /// Local-search shift optimizer; approximate but cheap
    Heuristic,
    /// Dynamic-programming solver; globally optimal, O(n^2 * k)
    Exact,
}

impl BreakStrategy {
    /// Run the selected optimizer over `values` (ascending-sorted).
    pub fn compute(
        self,
        values: &[f64],
        num_classes: usize,
        cancel: Option<&AtomicBool>,
    ) -> Result<Vec<usize>> {
        match self {
            Self::Heuristic => heuristic_breaks(values, num_classes, cancel),
            Self::Exact => optimal_breaks(values, num_classes, cancel),
        }
    }
}

impl std::fmt::Display for BreakStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Heuristic => "heuristic",
            Self::Exact => "exact",
        };
        write!(f, "{}", s)
    }
}

/// Total within-class variance of a partition given as class start indices.
///
/// Uses the running identity `sum_sq - sum^2/n` per class, the same objective
/// both optimizers minimize.
pub fn partition_variance(values: &[f64], starts: &[usize]) -> f64 {
    let mut total = 0.0;
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(values.len());
        let class = &values[start..end];
        if class.is_empty() {
            continue;
        }
        let n = class.len() as f64;
        let sum: f64 = class.iter().sum();
        let sum_sq: f64 = class.iter().map(|v| v * v).sum();
        total += sum_sq - sum * sum / n;
    }
    total
}

/// Convert class start indices into `k + 1` boundary values: the value at
/// each class start plus the sample maximum.
pub fn class_edges(values: &[f64], starts: &[usize]) -> Vec<f64> {
    let mut edges: Vec<f64> = starts.iter().map(|&s| values[s]).collect();
    if let Some(&last) = values.last() {
        edges.push(last);
    }
    edges
}

/// Guard shared by both optimizers: `2 <= k <= n`, failed explicitly rather
/// than silently returning an unusable result.
pub(crate) fn validate_class_count(num_classes: usize, available: usize) -> Result<()> {
    if num_classes < 2 || num_classes > available {
        return Err(ThematicError::InvalidClassCount {
            requested: num_classes,
            available,
        });
    }
    Ok(())
}

pub(crate) fn check_cancelled(cancel: Option<&AtomicBool>) -> Result<()> {
    if let Some(flag) = cancel {
        if flag.load(Ordering::Relaxed) {
            return Err(ThematicError::Cancelled);
        }
    }
    Ok(())
}
