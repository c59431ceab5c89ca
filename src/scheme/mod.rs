//! Classification scheme orchestration
//!
//! A [`Scheme`] turns a raw value sample into an ordered list of
//! [`Category`] objects: it excludes values, optionally downsamples, picks
//! break boundaries according to its [`ClassificationMethod`], snaps the
//! boundaries for display, and merges any categories whose snapped
//! boundaries collapse. The resulting category list feeds
//! `RenderStateCache::apply_scheme`.
//!
//! # Architecture
//!
//! - [`ClassificationMethod`]: closed enum dispatched once in
//!   [`Scheme::create_categories`]
//! - [`BreakStrategy`]: the heuristic/exact natural-breaks optimizer choice,
//!   interchangeable behind one interface
//! - [`SnapMethod`]: display-oriented boundary adjustment
//!
//! Output is deterministic for a given value sample + method + settings.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::breaks::{class_edges, BreakStrategy};
use crate::range::Range;
use crate::stats::Statistics;
use crate::Result;

mod category;
pub mod snap;

pub use category::Category;
pub use snap::SnapMethod;

/// Default number of classes
pub const DEFAULT_BREAK_COUNT: usize = 5;

/// Default cap on the number of values fed to the optimizers
pub const DEFAULT_MAX_SAMPLE_COUNT: usize = 10_000;

/// How break boundaries are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationMethod {
    /// `k` equal-width slices of `[min, max]`
    EqualInterval,
    /// `k` equal-population slices of the sorted sample
    Quantile,
    /// Breaks at multiples of the standard deviation from the mean
    StdDeviation,
    /// Variance-minimizing breaks (Jenks), heuristic or exact per
    /// [`SchemeSettings::break_strategy`]
    NaturalBreaks,
    /// One single-value category per distinct value; ignores the class count
    UniqueValues,
}

impl std::fmt::Display for ClassificationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::EqualInterval => "equal interval",
            Self::Quantile => "quantile",
            Self::StdDeviation => "standard deviation",
            Self::NaturalBreaks => "natural breaks",
            Self::UniqueValues => "unique values",
        };
        write!(f, "{}", s)
    }
}

/// Tuning knobs for category creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemeSettings {
    /// Target class count (ignored by unique-value classification)
    pub num_breaks: usize,
    /// Externally evaluated expression excluding records from the sample;
    /// opaque to this crate (the caller evaluates it and passes the
    /// resulting predicate to [`Scheme::create_categories`])
    pub exclude_expression: Option<String>,
    /// Cap on the sample size fed to break computation; larger inputs are
    /// uniformly downsampled. Zero disables sampling.
    pub max_sample_count: usize,
    /// Boundary snapping applied when building categories
    pub snap_method: SnapMethod,
    /// Digit count for the rounding/significant-figure snap methods
    pub rounding_digits: i32,
    /// Which optimizer natural-breaks classification runs
    pub break_strategy: BreakStrategy,
}

impl Default for SchemeSettings {
    fn default() -> Self {
        Self {
            num_breaks: DEFAULT_BREAK_COUNT,
            exclude_expression: None,
            max_sample_count: DEFAULT_MAX_SAMPLE_COUNT,
            snap_method: SnapMethod::None,
            rounding_digits: 2,
            break_strategy: BreakStrategy::Heuristic,
        }
    }
}

/// Non-fatal outcome information from a category build.
///
/// Sampling truncation and boundary merging are expected, recoverable
/// conditions: they are reported here (and logged) rather than failing the
/// caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// The input exceeded `max_sample_count` and was downsampled; the
    /// resulting breaks approximate the full population
    pub sampled: bool,
    /// No values survived exclusion; the scheme has zero categories
    pub empty: bool,
    /// Number of adjacent boundaries merged because snapping collapsed them
    pub merged_categories: usize,
    /// Size of the effective sample the breaks were computed from
    pub sample_size: usize,
}

/// A configured classification method plus its resulting ordered categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scheme {
    /// How break boundaries are chosen
    pub method: ClassificationMethod,
    /// Tuning knobs for category creation
    pub settings: SchemeSettings,
    /// Ordered category list; ascending in the method's natural order
    /// unless manually reordered for display
    pub categories: Vec<Category>,
}

impl Scheme {
    /// Create a scheme with default settings and no categories yet.
    pub fn new(method: ClassificationMethod) -> Self {
        Self {
            method,
            settings: SchemeSettings::default(),
            categories: Vec::new(),
        }
    }

    /// Build the ordered category list from a value sample.
    ///
    /// Non-finite values are dropped, then `exclude` (the evaluated form of
    /// `settings.exclude_expression`) filters the sample, then inputs larger
    /// than `settings.max_sample_count` are uniformly downsampled. An empty
    /// effective sample is a degenerate success (zero categories), not an
    /// error; optimizer guard failures propagate.
    pub fn create_categories(
        &mut self,
        values: &[f64],
        exclude: Option<&dyn Fn(f64) -> bool>,
    ) -> Result<BuildReport> {
        let mut report = BuildReport::default();

        let mut sample: Vec<f64> = values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .filter(|v| exclude.map_or(true, |is_excluded| !is_excluded(*v)))
            .collect();

        let cap = self.settings.max_sample_count;
        if cap > 0 && sample.len() > cap {
            warn!(
                "value sample truncated from {} to {} before break computation",
                sample.len(),
                cap
            );
            sample = stride_sample(&sample, cap);
            report.sampled = true;
        }

        sample.sort_by(f64::total_cmp);
        report.sample_size = sample.len();

        if sample.is_empty() {
            self.categories.clear();
            report.empty = true;
            return Ok(report);
        }

        let k = self.settings.num_breaks;
        let edges = match self.method {
            ClassificationMethod::EqualInterval => equal_interval_edges(&sample, k),
            ClassificationMethod::Quantile => quantile_edges(&sample, k),
            ClassificationMethod::StdDeviation => std_deviation_edges(&sample),
            ClassificationMethod::NaturalBreaks => {
                let starts = self.settings.break_strategy.compute(&sample, k, None)?;
                class_edges(&sample, &starts)
            }
            ClassificationMethod::UniqueValues => {
                self.categories = unique_value_categories(&sample);
                return Ok(report);
            }
        };

        // snap boundaries, merging any that collapse to the same value
        let snap = self.settings.snap_method;
        let digits = self.settings.rounding_digits;
        let mut snapped: Vec<f64> = edges
            .iter()
            .map(|&edge| snap.snap(edge, digits, &sample))
            .collect();
        let before = snapped.len();
        snapped.dedup();
        report.merged_categories = before - snapped.len();
        if report.merged_categories > 0 {
            debug!(
                "snapping collapsed {} boundaries; adjacent categories merged",
                report.merged_categories
            );
        }

        self.categories = if snapped.len() < 2 {
            vec![Category::single(snapped[0], 0)]
        } else {
            edges_to_categories(&snapped)
        };

        Ok(report)
    }

    /// Index of the category containing `value`, honoring the last-wins
    /// policy when ranges overlap. `None` when no category matches.
    pub fn categorize(&self, value: f64) -> Option<usize> {
        let mut found = None;
        for (index, category) in self.categories.iter().enumerate() {
            if category.contains(value) {
                found = Some(index);
            }
        }
        found
    }

    /// Populate every category's `filter_expression` for `field`, for
    /// hand-off to the external query evaluator.
    pub fn assign_filter_expressions(&mut self, field: &str) {
        for category in &mut self.categories {
            category.filter_expression = Some(category.build_filter_expression(field));
        }
    }

    /// Diagnostics over the same effective sample a build would use.
    pub fn sample_statistics(
        &self,
        values: &[f64],
        exclude: Option<&dyn Fn(f64) -> bool>,
    ) -> Statistics {
        let sample: Vec<f64> = values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .filter(|v| exclude.map_or(true, |is_excluded| !is_excluded(*v)))
            .collect();
        Statistics::calculate(&sample)
    }
}

/// `k + 1` equal-width boundaries over `[min, max]`.
fn equal_interval_edges(sample: &[f64], num_breaks: usize) -> Vec<f64> {
    let min = sample[0];
    let max = sample[sample.len() - 1];
    let k = num_breaks.max(1);
    let width = (max - min) / k as f64;
    (0..=k).map(|i| min + width * i as f64).collect()
}

/// `k + 1` equal-population boundaries from the sorted sample.
fn quantile_edges(sample: &[f64], num_breaks: usize) -> Vec<f64> {
    let n = sample.len();
    let k = num_breaks.max(1);
    let mut edges = Vec::with_capacity(k + 1);
    edges.push(sample[0]);
    for i in 1..k {
        edges.push(sample[i * n / k]);
    }
    edges.push(sample[n - 1]);
    edges
}

/// Boundaries at integer multiples of the standard deviation from the mean,
/// covering `[min, max]`. A zero-deviation sample yields a single class.
fn std_deviation_edges(sample: &[f64]) -> Vec<f64> {
    let stats = Statistics::calculate(sample);
    if stats.std_dev == 0.0 {
        return vec![stats.minimum, stats.maximum];
    }
    let first = ((stats.minimum - stats.mean) / stats.std_dev).floor() as i64;
    let last = ((stats.maximum - stats.mean) / stats.std_dev).ceil() as i64;
    (first..=last)
        .map(|m| stats.mean + m as f64 * stats.std_dev)
        .collect()
}

/// One single-value category per distinct value, ascending.
fn unique_value_categories(sample: &[f64]) -> Vec<Category> {
    let mut distinct = sample.to_vec();
    distinct.dedup();
    distinct
        .into_iter()
        .enumerate()
        .map(|(index, value)| Category::single(value, index as i32))
        .collect()
}

/// Build the ordered category list from ascending boundary edges using the
/// closed-left convention: each category is `[lower, upper)` except the
/// last, which is `[lower, upper]` so the sample maximum is not lost.
fn edges_to_categories(edges: &[f64]) -> Vec<Category> {
    let count = edges.len() - 1;
    (0..count)
        .map(|i| {
            let mut range = Range::bounded(edges[i], edges[i + 1]);
            range.max_inclusive = i == count - 1;
            Category::new(range, i as i32)
        })
        .collect()
}

/// Deterministic uniform downsampling to `target` values.
fn stride_sample(values: &[f64], target: usize) -> Vec<f64> {
    let step = values.len() as f64 / target as f64;
    (0..target)
        .map(|i| values[(i as f64 * step) as usize])
        .collect()
}
