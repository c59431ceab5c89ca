//! Classification categories
//!
//! A [`Category`] is one ordered bucket of a scheme: a [`Range`] plus the
//! externally evaluated filter expression that selects its records. Styling
//! lives with the rendering layer, not here.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::range::Range;

/// One bucket of a classification scheme.
///
/// Category order within a scheme is significant: when a record matches the
/// filter of more than one category, the last matching category wins (see
/// `RenderStateCache::apply_scheme`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// The value interval this category covers
    pub range: Range,
    /// Externally evaluated filter expression selecting this category's
    /// records; opaque to this crate
    pub filter_expression: Option<String>,
    /// Position of this category in the scheme's display order
    pub display_index: i32,
}

impl Category {
    /// Create a category over `range` with no filter expression yet.
    pub fn new(range: Range, display_index: i32) -> Self {
        Self {
            range,
            filter_expression: None,
            display_index,
        }
    }

    /// Create a single-value category (used by unique-value classification).
    pub fn single(value: f64, display_index: i32) -> Self {
        Self::new(Range::single(value), display_index)
    }

    /// Test whether `value` falls inside this category's range.
    pub fn contains(&self, value: f64) -> bool {
        self.range.contains(value)
    }

    /// Render a filter-expression string selecting this category's records
    /// by `field`. The string is handed to an external query evaluator; an
    /// unbounded-both category renders as an empty string (matches all).
    pub fn build_filter_expression(&self, field: &str) -> String {
        let range = &self.range;
        let lower = |min: f64| {
            let op = if range.min_inclusive { ">=" } else { ">" };
            format!("[{}] {} {}", field, op, min)
        };
        let upper = |max: f64| {
            let op = if range.max_inclusive { "<=" } else { "<" };
            format!("[{}] {} {}", field, op, max)
        };
        match (range.minimum, range.maximum) {
            (None, None) => String::new(),
            (Some(min), None) => lower(min),
            (None, Some(max)) => upper(max),
            (Some(min), Some(max)) if min == max => format!("[{}] = {}", field, min),
            (Some(min), Some(max)) => format!("{} AND {}", lower(min), upper(max)),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.range)
    }
}
