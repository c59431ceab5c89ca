//! Numeric intervals with independently optional bounds
//!
//! A [`Range`] models one classification bucket's extent: either bound may be
//! absent (unbounded on that side) and either bound may be inclusive or
//! exclusive. Ranges parse from and render to the expression format used by
//! category labels (`">= 5"`, `"10 - 20"`, `"All Values"`).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scheme::snap::SnapMethod;
use crate::{Result, ThematicError};

/// Label used for a range with neither bound set.
pub const ALL_VALUES: &str = "All Values";

/// A numeric interval with independently optional, inclusive/exclusive bounds.
///
/// Invariant: if both bounds are set, `minimum <= maximum` (the constructor
/// reorders violated bounds). A single-value range has `minimum == maximum`
/// with both bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    /// Lower bound, or `None` for unbounded below
    pub minimum: Option<f64>,
    /// Upper bound, or `None` for unbounded above
    pub maximum: Option<f64>,
    /// Whether a value equal to `minimum` is contained
    pub min_inclusive: bool,
    /// Whether a value equal to `maximum` is contained
    pub max_inclusive: bool,
}

impl Range {
    /// Create a range from optional bounds, both sides inclusive.
    /// Reorders the bounds if both are set and `minimum > maximum`.
    pub fn new(minimum: Option<f64>, maximum: Option<f64>) -> Self {
        let (minimum, maximum) = match (minimum, maximum) {
            (Some(lo), Some(hi)) if lo > hi => (Some(hi), Some(lo)),
            other => other,
        };
        Self {
            minimum,
            maximum,
            min_inclusive: true,
            max_inclusive: true,
        }
    }

    /// Create a fully bounded, both-inclusive range.
    pub fn bounded(minimum: f64, maximum: f64) -> Self {
        Self::new(Some(minimum), Some(maximum))
    }

    /// Create a single-value range (`minimum == maximum`, both inclusive).
    pub fn single(value: f64) -> Self {
        Self::bounded(value, value)
    }

    /// Create a range with neither bound set; contains every value.
    pub fn unbounded() -> Self {
        Self::new(None, None)
    }

    /// Test whether `value` falls inside this range.
    ///
    /// An unbounded side is always satisfied; a both-bounds-`None` range
    /// contains everything.
    pub fn contains(&self, value: f64) -> bool {
        let above = match self.minimum {
            None => true,
            Some(min) if self.min_inclusive => value >= min,
            Some(min) => value > min,
        };
        let below = match self.maximum {
            None => true,
            Some(max) if self.max_inclusive => value <= max,
            Some(max) => value < max,
        };
        above && below
    }

    /// Parse a range expression.
    ///
    /// Recognized forms:
    /// - one-sided: `">= 5"`, `"> 5"`, `"<= 5"`, `"< 5"`
    /// - two-sided: `"10 - 20"`
    /// - bare number: `"5"` (single-value range)
    ///
    /// Two-sided expressions are disambiguated by counting `-` characters
    /// after splitting on `-`: one dash separates two non-negative operands;
    /// with two dashes a leading dash negates the first operand, otherwise
    /// the second; three dashes negate both. This token-index contract is
    /// load-bearing for round trips and is deliberately not a regex.
    ///
    /// Fails with [`ThematicError::MalformedRangeExpression`] when no numeric
    /// tokens are found.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let number = |token: &str| -> Result<f64> {
            token
                .trim()
                .parse::<f64>()
                .map_err(|_| ThematicError::MalformedRangeExpression(text.to_string()))
        };

        // One-sided prefixes; ">=" and "<=" must be checked before ">" and "<"
        if let Some(rest) = trimmed.strip_prefix(">=") {
            let mut range = Self::new(Some(number(rest)?), None);
            range.min_inclusive = true;
            return Ok(range);
        }
        if let Some(rest) = trimmed.strip_prefix("<=") {
            let mut range = Self::new(None, Some(number(rest)?));
            range.max_inclusive = true;
            return Ok(range);
        }
        if let Some(rest) = trimmed.strip_prefix('>') {
            let mut range = Self::new(Some(number(rest)?), None);
            range.min_inclusive = false;
            return Ok(range);
        }
        if let Some(rest) = trimmed.strip_prefix('<') {
            let mut range = Self::new(None, Some(number(rest)?));
            range.max_inclusive = false;
            return Ok(range);
        }

        // Two-sided or bare number: split on '-' and index by dash count
        let parts: Vec<&str> = trimmed.split('-').collect();
        match parts.len() {
            // no dash: single-value range
            1 => Ok(Self::single(number(parts[0])?)),
            // "A-B"
            2 => Ok(Self::new(Some(number(parts[0])?), Some(number(parts[1])?))),
            // "-A-B" or "A--B"
            3 => {
                if trimmed.starts_with('-') {
                    Ok(Self::new(
                        Some(-number(parts[1])?),
                        Some(number(parts[2])?),
                    ))
                } else {
                    Ok(Self::new(
                        Some(number(parts[0])?),
                        Some(-number(parts[2])?),
                    ))
                }
            }
            // "-A--B"
            4 => Ok(Self::new(
                Some(-number(parts[1])?),
                Some(-number(parts[3])?),
            )),
            _ => Err(ThematicError::MalformedRangeExpression(text.to_string())),
        }
    }

    /// Render this range with its displayed bounds snapped.
    ///
    /// Snapping affects only the rendered text; `contains` is unchanged
    /// unless the snapped values are fed back into a new range explicitly.
    /// [`SnapMethod::DataValue`] has no sample here and renders unchanged;
    /// data-value snapping happens at category build time, where the sorted
    /// sample is available.
    pub fn to_string_snapped(&self, method: SnapMethod, digits: i32) -> String {
        let snap = |v: f64| method.snap(v, digits, &[]);
        let display = Self {
            minimum: self.minimum.map(snap),
            maximum: self.maximum.map(snap),
            ..*self
        };
        display.to_string()
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.minimum, self.maximum) {
            (None, None) => write!(f, "{}", ALL_VALUES),
            (Some(min), None) => {
                let op = if self.min_inclusive { ">=" } else { ">" };
                write!(f, "{} {}", op, min)
            }
            (None, Some(max)) => {
                let op = if self.max_inclusive { "<=" } else { "<" };
                write!(f, "{} {}", op, max)
            }
            (Some(min), Some(max)) if min == max => write!(f, "{}", min),
            (Some(min), Some(max)) => write!(f, "{} - {}", min, max),
        }
    }
}
