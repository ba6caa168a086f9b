//! Decimal helpers for kg-scale values
//!
//! Weights are stored as [`Decimal`] so that `79.5 - 79.0` is exactly `0.5`
//! and rounding is always half-up (ties go towards +infinity). Statistics that need square
//! roots go through `f64` and `statrs` and come back rounded.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use statrs::statistics::Statistics;

/// Round half up to `dp` decimal places, so `-0.05` becomes `0.0`
pub fn round_dp(value: Decimal, dp: u32) -> Decimal {
    let factor = Decimal::from(10i64.pow(dp));
    match value.checked_mul(factor) {
        Some(scaled) => (scaled + Decimal::new(5, 1)).floor() / factor,
        None => value,
    }
}

pub fn round1(value: Decimal) -> Decimal {
    round_dp(value, 1)
}

pub fn round2(value: Decimal) -> Decimal {
    round_dp(value, 2)
}

pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Convert a finite float; NaN and infinities become zero
pub fn from_f64(value: f64) -> Decimal {
    if value.is_finite() {
        Decimal::from_f64(value).unwrap_or_default()
    } else {
        Decimal::ZERO
    }
}

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let sum: Decimal = values.iter().copied().sum();
    Some(sum / Decimal::from(values.len()))
}

/// Population standard deviation, `None` for an empty slice
pub fn population_std_dev(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let floats: Vec<f64> = values.iter().map(|v| to_f64(*v)).collect();
    Some(from_f64(floats.iter().population_std_dev()))
}

/// Minimum and maximum of a slice
pub fn min_max(values: &[Decimal]) -> Option<(Decimal, Decimal)> {
    let first = *values.first()?;
    Some(values.iter().fold((first, first), |(lo, hi), v| {
        (lo.min(*v), hi.max(*v))
    }))
}

pub fn clamp(value: Decimal, min: Decimal, max: Decimal) -> Decimal {
    value.max(min).min(max)
}

/// Format with exactly `dp` decimal places, e.g. `78.70` for dp = 2
pub fn format_fixed(value: Decimal, dp: u32) -> String {
    let rounded = round_dp(value, dp);
    format!("{:.*}", dp as usize, rounded)
}

/// Ratio as a rounded percentage; zero denominator yields zero
pub fn percent(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        Decimal::ZERO
    } else {
        numerator / denominator * Decimal::ONE_HUNDRED
    }
}

/// Ceiling for a positive ratio, saturating into `i64`
pub fn ceil_days(value: Decimal) -> i64 {
    value.ceil().to_i64().unwrap_or(i64::MAX)
}
