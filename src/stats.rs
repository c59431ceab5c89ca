//! Single-pass sample statistics
//!
//! Diagnostics computed over a value sample before classification. The
//! standard deviation uses the population form of the single-pass identity
//! `sqrt(sum_sq/n - mean^2)`, which is numerically less stable than a
//! two-pass algorithm for large-magnitude inputs; that is a documented
//! precision trade-off, not a bug.

/// Summary statistics over a value sample.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Statistics {
    /// Number of values in the sample
    pub count: usize,
    /// Smallest value
    pub minimum: f64,
    /// Largest value
    pub maximum: f64,
    /// Arithmetic mean
    pub mean: f64,
    /// Middle element (odd count) or average of the two middle elements
    pub median: f64,
    /// Sum of all values
    pub sum: f64,
    /// Population standard deviation
    pub std_dev: f64,
}

impl Statistics {
    /// Compute statistics over `values`. Sorts a private copy of the sample.
    ///
    /// Empty input resets all fields to zero rather than failing.
    pub fn calculate(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let sum: f64 = sorted.iter().sum();
        let sum_sq: f64 = sorted.iter().map(|v| v * v).sum();
        let mean = sum / n as f64;
        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        };
        // clamp guards tiny negative residue from the single-pass identity
        let std_dev = (sum_sq / n as f64 - mean * mean).max(0.0).sqrt();

        Self {
            count: n,
            minimum: sorted[0],
            maximum: sorted[n - 1],
            mean,
            median,
            sum,
            std_dev,
        }
    }
}
