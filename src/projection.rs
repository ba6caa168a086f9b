//! Goal-date projection by linear extrapolation
//!
//! The scenario bands are fixed rate multipliers around the recent average,
//! not a statistical interval.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::dates::{add_days, days_between};
use crate::models::WeightRecord;
use crate::numeric::{ceil_days, round1};
use crate::stats::AnalyticsConfig;

/// Outcome of a goal projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Projection {
    /// Current weight is at or below the goal
    Achieved,
    /// Not enough records to estimate a trend
    InsufficientData { records: usize, required: usize },
    /// Recent trend is flat or gaining
    NotProgressing { rate_kg_per_day: Decimal },
    /// Goal reachable at the recent rate
    Estimate(ProjectionEstimate),
}

/// Point estimate plus optimistic and conservative scenarios
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionEstimate {
    pub remaining_kg: Decimal,
    pub rate_kg_per_day: Decimal,
    pub days_to_goal: i64,
    pub point_estimate: NaiveDate,
    pub optimistic_days: i64,
    pub optimistic: NaiveDate,
    pub conservative_days: i64,
    pub conservative: NaiveDate,
}

/// Earliest and latest goal dates from the last month's pace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceWindow {
    pub rate_kg_per_day: Decimal,
    pub earliest: NaiveDate,
    pub latest: NaiveDate,
}

/// Kilograms left to the goal, never negative
pub fn remaining_kg(current: Decimal, goal: Decimal) -> Decimal {
    (current - goal).max(Decimal::ZERO)
}

/// Projection engine
pub struct ProjectionCalculator {
    config: AnalyticsConfig,
}

impl Default for ProjectionCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectionCalculator {
    pub fn new() -> Self {
        ProjectionCalculator {
            config: AnalyticsConfig::default(),
        }
    }

    pub fn with_config(config: AnalyticsConfig) -> Self {
        ProjectionCalculator { config }
    }

    /// Project when `goal` will be reached, counting days from `today`
    pub fn project(&self, records: &[WeightRecord], goal: Decimal, today: NaiveDate) -> Projection {
        let Some(last) = records.last() else {
            return Projection::InsufficientData {
                records: 0,
                required: self.config.min_projection_records,
            };
        };

        if last.weight <= goal {
            return Projection::Achieved;
        }

        if records.len() < self.config.min_projection_records {
            return Projection::InsufficientData {
                records: records.len(),
                required: self.config.min_projection_records,
            };
        }

        let window_start = records.len().saturating_sub(self.config.projection_window);
        let window = &records[window_start..];
        let first = &window[0];
        let end = &window[window.len() - 1];

        let days = days_between(first.date, end.date).max(1);
        let rate = round1(first.weight - end.weight) / Decimal::from(days);

        if rate <= self.config.min_progress_rate {
            return Projection::NotProgressing {
                rate_kg_per_day: rate,
            };
        }

        let remaining = remaining_kg(last.weight, goal);
        let days_to_goal = ceil_days(remaining / rate);
        let optimistic_days = ceil_days(remaining / (rate * self.config.optimistic_factor));
        let conservative_days = ceil_days(remaining / (rate * self.config.conservative_factor));

        Projection::Estimate(ProjectionEstimate {
            remaining_kg: remaining,
            rate_kg_per_day: rate,
            days_to_goal,
            point_estimate: add_days(today, days_to_goal),
            optimistic_days,
            optimistic: add_days(today, optimistic_days),
            conservative_days,
            conservative: add_days(today, conservative_days),
        })
    }
}

/// Goal window from the pace of the last 30 days
///
/// Falls back to the whole history when the last 30 days hold fewer than
/// three records. `None` unless losing faster than 0.01kg/day.
pub fn confidence_window(
    records: &[WeightRecord],
    goal: Decimal,
    today: NaiveDate,
) -> Option<ConfidenceWindow> {
    let last = records.last()?;
    if last.weight <= goal {
        return None;
    }

    let cutoff = add_days(today, -30);
    let recent: Vec<&WeightRecord> = records.iter().filter(|r| r.date >= cutoff).collect();
    let window: Vec<&WeightRecord> = if recent.len() < 3 {
        records.iter().collect()
    } else {
        recent
    };

    let first = window.first()?;
    let end = window.last()?;
    let days = days_between(first.date, end.date);
    if days <= 0 {
        return None;
    }

    let rate = (first.weight - end.weight) / Decimal::from(days);
    if rate <= dec!(0.01) {
        return None;
    }

    let days_needed = remaining_kg(last.weight, goal) / rate;
    Some(ConfidenceWindow {
        rate_kg_per_day: rate,
        earliest: add_days(today, ceil_days(days_needed * dec!(0.9))),
        latest: add_days(today, ceil_days(days_needed * dec!(1.1))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_records(start: NaiveDate, weights: &[Decimal]) -> Vec<WeightRecord> {
        weights
            .iter()
            .enumerate()
            .map(|(i, w)| add_record(start, i as i64, *w))
            .collect()
    }

    fn add_record(start: NaiveDate, offset: i64, weight: Decimal) -> WeightRecord {
        WeightRecord::new(add_days(start, offset), weight, None).unwrap()
    }

    fn jan(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn test_goal_already_achieved() {
        let records = create_test_records(jan(1), &[dec!(70.0)]);
        let projection = ProjectionCalculator::new().project(&records, dec!(70.000), jan(2));
        assert_eq!(projection, Projection::Achieved);
        assert_eq!(remaining_kg(dec!(70.0), dec!(70)), Decimal::ZERO);
    }

    #[test]
    fn test_insufficient_data() {
        let records = create_test_records(jan(1), &[dec!(80), dec!(79.8), dec!(79.6), dec!(79.4)]);
        let projection = ProjectionCalculator::new().project(&records, dec!(70), jan(5));
        assert_eq!(
            projection,
            Projection::InsufficientData {
                records: 4,
                required: 5
            }
        );
    }

    #[test]
    fn test_not_progressing() {
        let records = create_test_records(jan(1), &[dec!(80), dec!(80.5), dec!(80), dec!(80.2), dec!(80.1)]);
        let projection = ProjectionCalculator::new().project(&records, dec!(70), jan(5));
        assert!(matches!(projection, Projection::NotProgressing { .. }));
    }

    #[test]
    fn test_estimate_scenarios() {
        // 0.2kg/day over four days, 9.2kg to go
        let records = create_test_records(jan(1), &[dec!(80), dec!(79.8), dec!(79.6), dec!(79.4), dec!(79.2)]);
        let today = jan(5);
        let projection = ProjectionCalculator::new().project(&records, dec!(70), today);

        let Projection::Estimate(estimate) = projection else {
            panic!("expected an estimate");
        };
        assert_eq!(estimate.rate_kg_per_day, dec!(0.2));
        assert_eq!(estimate.remaining_kg, dec!(9.2));
        assert_eq!(estimate.days_to_goal, 46);
        assert_eq!(estimate.point_estimate, add_days(today, 46));
        assert_eq!(estimate.optimistic_days, 31);
        assert_eq!(estimate.conservative_days, 66);
        assert!(estimate.optimistic < estimate.point_estimate);
        assert!(estimate.point_estimate < estimate.conservative);
    }

    #[test]
    fn test_window_uses_last_thirty_records() {
        let mut weights = vec![dec!(100); 10];
        weights.extend((0..30).map(|i| dec!(90) - Decimal::from(i) * dec!(0.1)));
        let records = create_test_records(jan(1), &weights);
        let projection = ProjectionCalculator::new().project(&records, dec!(80), jan(31));

        let Projection::Estimate(estimate) = projection else {
            panic!("expected an estimate");
        };
        assert_eq!(estimate.rate_kg_per_day, dec!(0.1));
    }

    #[test]
    fn test_confidence_window() {
        let records = create_test_records(jan(1), &[dec!(80), dec!(79.5), dec!(79), dec!(78.5), dec!(78)]);
        let window = confidence_window(&records, dec!(75), jan(5)).unwrap();
        assert_eq!(window.rate_kg_per_day, dec!(0.5));
        assert_eq!(window.earliest, add_days(jan(5), 6));
        assert_eq!(window.latest, add_days(jan(5), 7));

        assert!(confidence_window(&records, dec!(78), jan(5)).is_none());
    }
}
