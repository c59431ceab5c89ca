//! Boundary snapping
//!
//! A snap method is a display-oriented transformation of a computed break
//! boundary: rounding, significant figures, or snapping to the nearest
//! observed data value. Snapping changes which value is shown (and, when fed
//! back into category construction, which value bounds the category); it is
//! never applied implicitly to containment tests.

use serde::{Deserialize, Serialize};

/// How computed break boundaries are adjusted before becoming category
/// bounds and labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapMethod {
    /// Use boundaries exactly as computed
    #[default]
    None,
    /// Round to a fixed number of decimal digits
    Rounding,
    /// Round to a number of significant figures
    SignificantFigures,
    /// Snap to the nearest observed value in the sorted sample
    DataValue,
}

impl SnapMethod {
    /// Apply this snap method to a single boundary value.
    ///
    /// `digits` is the decimal-digit or significant-figure count, depending
    /// on the method; `data` is the ascending-sorted sample consulted by
    /// [`SnapMethod::DataValue`] (an empty sample leaves the value as-is).
    pub fn snap(self, value: f64, digits: i32, data: &[f64]) -> f64 {
        match self {
            Self::None => value,
            Self::Rounding => round_to_digits(value, digits),
            Self::SignificantFigures => round_to_significant(value, digits),
            Self::DataValue => nearest_data_value(value, data),
        }
    }
}

impl std::fmt::Display for SnapMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Rounding => "rounding",
            Self::SignificantFigures => "significant figures",
            Self::DataValue => "data value",
        };
        write!(f, "{}", s)
    }
}

fn round_to_digits(value: f64, digits: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

fn round_to_significant(value: f64, figures: i32) -> f64 {
    if value == 0.0 || !value.is_finite() {
        return value;
    }
    let magnitude = value.abs().log10().floor() as i32;
    let shift = figures.max(1) - 1 - magnitude;
    let factor = 10f64.powi(shift);
    (value * factor).round() / factor
}

fn nearest_data_value(value: f64, data: &[f64]) -> f64 {
    if data.is_empty() {
        return value;
    }
    match data.binary_search_by(|probe| probe.total_cmp(&value)) {
        Ok(i) => data[i],
        Err(0) => data[0],
        Err(i) if i == data.len() => data[data.len() - 1],
        Err(i) => {
            if (value - data[i - 1]).abs() <= (data[i] - value).abs() {
                data[i - 1]
            } else {
                data[i]
            }
        }
    }
}
