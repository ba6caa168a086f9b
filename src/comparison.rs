//! Rate and period comparators
//!
//! All windows are anchored on an explicit `today` rather than the last record.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::dates::{add_days, days_between, monday_of_week, sub_months, YearMonth};
use crate::models::WeightRecord;
use crate::numeric::{mean, round1, round2, round_dp};

/// Mean weight of two adjacent periods
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodMeans {
    pub current_avg: Decimal,
    pub previous_avg: Decimal,
    /// Current minus previous, rounded to 0.1kg
    pub diff: Decimal,
}

impl PeriodMeans {
    fn from_weights(current: &[Decimal], previous: &[Decimal]) -> Option<Self> {
        let current_avg = mean(current)?;
        let previous_avg = mean(previous)?;
        Some(Self {
            current_avg,
            previous_avg,
            diff: round1(current_avg - previous_avg),
        })
    }
}

/// Summary of one window in a year-over-year comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodStats {
    pub records: usize,
    pub avg_weight: Decimal,
    /// First minus last weight in the window
    pub loss: Decimal,
    pub speed_kg_per_week: Decimal,
}

impl PeriodStats {
    fn from_records(records: &[&WeightRecord]) -> Option<Self> {
        let first = records.first()?;
        let last = records.last()?;
        let weights: Vec<Decimal> = records.iter().map(|r| r.weight).collect();
        let loss = first.weight - last.weight;
        let days = days_between(first.date, last.date);
        let speed = if days > 0 {
            round2(loss / Decimal::from(days) * Decimal::from(7))
        } else {
            Decimal::ZERO
        };

        Some(Self {
            records: records.len(),
            avg_weight: round1(mean(&weights)?),
            loss: round1(loss),
            speed_kg_per_week: speed,
        })
    }
}

/// The last three months against the same months a year earlier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodComparison {
    pub recent: PeriodStats,
    pub last_year: Option<PeriodStats>,
}

/// Weight change per day in grams over the trailing `n_days`
///
/// Positive means gaining. `None` with fewer than two records in the window
/// or when they fall on the same day.
pub fn rate_grams_per_day(records: &[WeightRecord], n_days: i64, today: NaiveDate) -> Option<Decimal> {
    let cutoff = add_days(today, -n_days);
    let window: Vec<&WeightRecord> = records.iter().filter(|r| r.date >= cutoff).collect();
    if window.len() < 2 {
        return None;
    }

    let first = window.first()?;
    let last = window.last()?;
    let days = days_between(first.date, last.date);
    if days <= 0 {
        return None;
    }

    Some(round_dp(
        (last.weight - first.weight) / Decimal::from(days) * Decimal::from(1000),
        0,
    ))
}

/// Mean of the last 7 days against days 8 to 14 back
pub fn weekly_comparison(records: &[WeightRecord], today: NaiveDate) -> Option<PeriodMeans> {
    let week_ago = add_days(today, -7);
    let two_weeks_ago = add_days(today, -14);

    let this_week: Vec<Decimal> = records
        .iter()
        .filter(|r| r.date >= week_ago)
        .map(|r| r.weight)
        .collect();
    let last_week: Vec<Decimal> = records
        .iter()
        .filter(|r| r.date >= two_weeks_ago && r.date < week_ago)
        .map(|r| r.weight)
        .collect();

    PeriodMeans::from_weights(&this_week, &last_week)
}

/// Mean of this calendar month against the previous one
pub fn monthly_comparison(records: &[WeightRecord], today: NaiveDate) -> Option<PeriodMeans> {
    let this_month = YearMonth::of(today);
    let last_month = this_month.previous();

    let weights_in = |month: YearMonth| -> Vec<Decimal> {
        records
            .iter()
            .filter(|r| month.contains(r.date))
            .map(|r| r.weight)
            .collect()
    };

    PeriodMeans::from_weights(&weights_in(this_month), &weights_in(last_month))
}

/// Average week-over-week loss of Monday-keyed weekly means
///
/// Positive means losing. Needs at least two distinct weeks.
pub fn weekly_average_loss(records: &[WeightRecord]) -> Option<Decimal> {
    let mut weeks: BTreeMap<NaiveDate, Vec<Decimal>> = BTreeMap::new();
    for record in records {
        weeks
            .entry(monday_of_week(record.date))
            .or_default()
            .push(record.weight);
    }

    let averages: Vec<Decimal> = weeks.values().filter_map(|w| mean(w)).collect();
    let losses: Vec<Decimal> = averages.windows(2).map(|w| w[0] - w[1]).collect();
    mean(&losses).map(round2)
}

/// Last three months against the same window one year earlier
pub fn period_comparison(records: &[WeightRecord], today: NaiveDate) -> Option<PeriodComparison> {
    let recent_start = sub_months(today, 3);
    let year_ago_end = sub_months(today, 12);
    let year_ago_start = sub_months(today, 15);

    let recent: Vec<&WeightRecord> = records
        .iter()
        .filter(|r| r.date >= recent_start && r.date <= today)
        .collect();
    let last_year: Vec<&WeightRecord> = records
        .iter()
        .filter(|r| r.date >= year_ago_start && r.date <= year_ago_end)
        .collect();

    Some(PeriodComparison {
        recent: PeriodStats::from_records(&recent)?,
        last_year: PeriodStats::from_records(&last_year),
    })
}
