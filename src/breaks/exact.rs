//! Exact break optimizer
//!
//! Dynamic-programming solver for the variance-minimizing contiguous
//! partition (the Fisher-Jenks formulation). Builds two `(n+1) x (k+1)`
//! tables: `lower[l][j]` holds the best starting position of class `j` when
//! considering the first `l` values, and `cost[l][j]` the minimum achievable
//! total variance for that sub-problem. The trailing-class variance is
//! accumulated with the running sum/sum-of-squares identity, so each `(l, j)`
//! cell costs O(1) inside the split-point scan.
//!
//! The result is the reference the local-search optimizer approximates: no
//! partition of the sorted sample into exactly `k` contiguous classes has a
//! smaller total within-class variance. Complexity is O(n^2 * k); callers
//! cap `n` (see `SchemeSettings::max_sample_count`) before invoking this on
//! large record collections.

use std::sync::atomic::AtomicBool;

use super::{check_cancelled, validate_class_count};
use crate::Result;

/// Partition `values` (ascending-sorted) into `num_classes` contiguous
/// classes with globally minimal total within-class variance.
///
/// Returns the start index of each class. Fails with
/// [`crate::ThematicError::InvalidClassCount`] when `num_classes < 2` or
/// `num_classes > values.len()`, and with [`crate::ThematicError::Cancelled`]
/// if `cancel` is raised between prefix iterations.
pub fn optimal_breaks(
    values: &[f64],
    num_classes: usize,
    cancel: Option<&AtomicBool>,
) -> Result<Vec<usize>> {
    validate_class_count(num_classes, values.len())?;
    debug_assert!(
        values.windows(2).all(|w| w[0] <= w[1]),
        "input must be sorted ascending"
    );

    let n = values.len();
    let k = num_classes;

    // lower[l][j]: 1-based start of the last class for prefix length l, j classes
    // cost[l][j]: minimal total variance for that sub-problem
    let mut lower = vec![vec![0usize; k + 1]; n + 1];
    let mut cost = vec![vec![0.0f64; k + 1]; n + 1];

    // cells with fewer prefix values than classes are infeasible and stay
    // at infinity; the k <= n guard keeps the full problem finite
    lower[1][1] = 1;
    for j in 2..=k {
        for l in 1..=n {
            cost[l][j] = f64::INFINITY;
        }
    }

    for l in 2..=n {
        check_cancelled(cancel)?;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        let mut weight = 0.0;

        // scan split points from the back so the trailing class's variance
        // grows incrementally
        for m in 1..=l {
            let start = l - m + 1; // 1-based start of the trailing class
            let value = values[start - 1];
            weight += 1.0;
            sum += value;
            sum_sq += value * value;
            let trailing_variance = sum_sq - sum * sum / weight;

            let prefix = start - 1;
            if prefix != 0 {
                for j in 2..=k {
                    let candidate = trailing_variance + cost[prefix][j - 1];
                    // strict comparison: ties keep the largest (first-seen)
                    // start, which is always a feasible routing
                    if candidate < cost[l][j] {
                        lower[l][j] = start;
                        cost[l][j] = candidate;
                    }
                }
            }
        }

        lower[l][1] = 1;
        cost[l][1] = sum_sq - sum * sum / weight;
    }

    // back-trace the class starts from the full-problem cell
    let mut starts = vec![0usize; k];
    let mut l = n;
    for j in (2..=k).rev() {
        let start = lower[l][j] - 1; // to 0-based
        starts[j - 1] = start;
        l = start; // remaining prefix ends just before this class
    }

    Ok(starts)
}
