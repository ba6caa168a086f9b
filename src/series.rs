//! Chart-ready series
//!
//! Pure transformations from records to `{date, value}` points. Nothing is
//! cached; every call recomputes from the slice it is given.

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::dates::{add_days, parse_date, DateRange, YearMonth};
use crate::error::ValidationError;
use crate::models::WeightRecord;
use crate::numeric::{mean, population_std_dev, round1, round2};
use crate::patterns::ZoneBanding;

/// Trailing window of the trend line, in calendar days including the current one
pub const TREND_WINDOW_DAYS: i64 = 7;

/// Date range shown by a chart
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartFilter {
    #[default]
    All,
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
    Custom { start: NaiveDate, end: NaiveDate },
}

impl ChartFilter {
    /// Concrete range relative to `today`; the upper bound is `today` unless custom
    pub fn range(&self, today: NaiveDate) -> DateRange {
        let months_back = |n: u32| today.checked_sub_months(Months::new(n)).unwrap_or(today);
        match self {
            ChartFilter::All => DateRange::new(None, Some(today)),
            ChartFilter::OneMonth => DateRange::new(Some(months_back(1)), Some(today)),
            ChartFilter::ThreeMonths => DateRange::new(Some(months_back(3)), Some(today)),
            ChartFilter::SixMonths => DateRange::new(Some(months_back(6)), Some(today)),
            ChartFilter::OneYear => DateRange::new(Some(months_back(12)), Some(today)),
            ChartFilter::Custom { start, end } => DateRange::new(Some(*start), Some(*end)),
        }
    }

    /// Records inside the range; relies on the ascending order of the store
    pub fn apply<'a>(&self, records: &'a [WeightRecord], today: NaiveDate) -> &'a [WeightRecord] {
        let range = self.range(today);
        let lo = range
            .start
            .map_or(0, |start| records.partition_point(|r| r.date < start));
        let hi = range
            .end
            .map_or(records.len(), |end| records.partition_point(|r| r.date <= end));
        if lo >= hi {
            &[]
        } else {
            &records[lo..hi]
        }
    }
}

impl FromStr for ChartFilter {
    type Err = ValidationError;

    /// Accepts `all`, `1m`, `3m`, `6m`, `1y` or `START..END`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(ChartFilter::All),
            "1m" => Ok(ChartFilter::OneMonth),
            "3m" => Ok(ChartFilter::ThreeMonths),
            "6m" => Ok(ChartFilter::SixMonths),
            "1y" => Ok(ChartFilter::OneYear),
            other => {
                let (start, end) = other.split_once("..").ok_or_else(|| ValidationError::InvalidSetting {
                    field: "filter".to_string(),
                    value: s.to_string(),
                })?;
                Ok(ChartFilter::Custom {
                    start: parse_date(start)?,
                    end: parse_date(end)?,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: Decimal,
}

impl SeriesPoint {
    fn new(date: NaiveDate, value: Decimal) -> Self {
        Self { date, value }
    }
}

/// 7-day mean with a band of two standard deviations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub mean: Decimal,
    pub upper: Decimal,
    pub lower: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacdPoint {
    pub date: NaiveDate,
    pub macd: Decimal,
    pub signal: Decimal,
    pub histogram: Decimal,
}

pub fn weight_series(records: &[WeightRecord]) -> Vec<SeriesPoint> {
    records.iter().map(|r| SeriesPoint::new(r.date, r.weight)).collect()
}

/// Trend for each shown record, windowed over the full history
///
/// The window for a date covers the six days before it and the date itself,
/// so points at the edge of a filtered range still see earlier records.
pub fn trend_bands(history: &[WeightRecord], shown: &[WeightRecord]) -> Vec<TrendPoint> {
    shown
        .iter()
        .filter_map(|record| {
            let from = add_days(record.date, -(TREND_WINDOW_DAYS - 1));
            let window: Vec<Decimal> = history
                .iter()
                .filter(|r| r.date >= from && r.date <= record.date)
                .map(|r| r.weight)
                .collect();
            let mean = mean(&window)?;
            let band = population_std_dev(&window)? * Decimal::TWO;
            Some(TrendPoint {
                date: record.date,
                mean: round2(mean),
                upper: round2(mean + band),
                lower: round2(mean - band),
            })
        })
        .collect()
}

/// Start weight minus each record, so losses plot upward
pub fn cumulative_loss(records: &[WeightRecord], start_weight: Decimal) -> Vec<SeriesPoint> {
    records
        .iter()
        .map(|r| SeriesPoint::new(r.date, round2(start_weight - r.weight)))
        .collect()
}

pub fn body_fat_series(records: &[WeightRecord]) -> Vec<SeriesPoint> {
    records
        .iter()
        .filter_map(|r| r.fat.map(|fat| SeriesPoint::new(r.date, fat)))
        .collect()
}

/// Change from the previous record, dated on the later one
pub fn daily_delta(records: &[WeightRecord]) -> Vec<SeriesPoint> {
    records
        .windows(2)
        .map(|pair| SeriesPoint::new(pair[1].date, round1(pair[1].weight - pair[0].weight)))
        .collect()
}

/// First-to-last change within each calendar month, oldest first
pub fn monthly_change(records: &[WeightRecord]) -> Vec<(YearMonth, Decimal)> {
    let mut months: BTreeMap<YearMonth, (Decimal, Decimal)> = BTreeMap::new();
    for record in records {
        months
            .entry(YearMonth::of(record.date))
            .and_modify(|(_, last)| *last = record.weight)
            .or_insert((record.weight, record.weight));
    }
    months
        .into_iter()
        .map(|(month, (first, last))| (month, round1(last - first)))
        .collect()
}

/// Record counts per whole-kg bucket, lightest first
pub fn weight_histogram(records: &[WeightRecord]) -> Vec<(i64, usize)> {
    let mut buckets: BTreeMap<i64, usize> = BTreeMap::new();
    for record in records {
        *buckets.entry(ZoneBanding::OneKg.zone_of(record.weight)).or_default() += 1;
    }
    buckets.into_iter().collect()
}

/// How often each 0.1kg change occurs, smallest change first
pub fn delta_distribution(records: &[WeightRecord]) -> Vec<(Decimal, usize)> {
    let mut buckets: BTreeMap<Decimal, usize> = BTreeMap::new();
    for point in daily_delta(records) {
        *buckets.entry(point.value.normalize()).or_default() += 1;
    }
    buckets.into_iter().collect()
}

fn ema(values: &[Decimal], period: u32) -> Vec<Decimal> {
    let k = Decimal::TWO / Decimal::from(period + 1);
    let mut out: Vec<Decimal> = Vec::with_capacity(values.len());
    for value in values {
        let next = match out.last() {
            Some(prev) => *value * k + *prev * (Decimal::ONE - k),
            None => *value,
        };
        out.push(next);
    }
    out
}

/// 12/26/9 MACD over the whole history; needs 26 records
pub fn macd(records: &[WeightRecord]) -> Vec<MacdPoint> {
    if records.len() < 26 {
        return Vec::new();
    }
    let weights: Vec<Decimal> = records.iter().map(|r| r.weight).collect();
    let fast = ema(&weights, 12);
    let slow = ema(&weights, 26);
    let line: Vec<Decimal> = fast.iter().zip(&slow).map(|(f, s)| *f - *s).collect();
    let signal = ema(&line, 9);

    records
        .iter()
        .zip(line.iter().zip(&signal))
        .map(|(record, (macd, signal))| MacdPoint {
            date: record.date,
            macd: round2(*macd),
            signal: round2(*signal),
            histogram: round2(*macd - *signal),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn create_test_records(start: NaiveDate, weights: &[Decimal]) -> Vec<WeightRecord> {
        weights
            .iter()
            .enumerate()
            .map(|(i, w)| WeightRecord::new(add_days(start, i as i64), *w, None).unwrap())
            .collect()
    }

    #[test]
    fn test_filter_ranges() {
        let records = vec![
            WeightRecord::new(d(2023, 12, 1), dec!(82), None).unwrap(),
            WeightRecord::new(d(2024, 2, 20), dec!(80), None).unwrap(),
            WeightRecord::new(d(2024, 3, 10), dec!(79), None).unwrap(),
            WeightRecord::new(d(2024, 3, 20), dec!(78), None).unwrap(),
        ];
        let today = d(2024, 3, 15);

        assert_eq!(ChartFilter::All.apply(&records, today).len(), 3);
        assert_eq!(ChartFilter::OneMonth.apply(&records, today).len(), 2);
        assert_eq!(ChartFilter::ThreeMonths.apply(&records, today).len(), 2);
        assert_eq!(ChartFilter::SixMonths.apply(&records, today).len(), 3);
        let custom = ChartFilter::Custom {
            start: d(2024, 3, 1),
            end: d(2024, 3, 31),
        };
        assert_eq!(custom.apply(&records, today).len(), 2);
        assert!(ChartFilter::OneMonth.apply(&records, d(2020, 1, 1)).is_empty());
    }

    #[test]
    fn test_filter_from_str() {
        assert_eq!("3M".parse::<ChartFilter>().unwrap(), ChartFilter::ThreeMonths);
        assert_eq!(
            "2024-01-01..2024-02-01".parse::<ChartFilter>().unwrap(),
            ChartFilter::Custom {
                start: d(2024, 1, 1),
                end: d(2024, 2, 1)
            }
        );
        assert!("weekly".parse::<ChartFilter>().is_err());
    }

    #[test]
    fn test_trend_uses_full_history() {
        let records = create_test_records(d(2024, 1, 1), &[dec!(80), dec!(82), dec!(81)]);
        let shown = &records[2..];
        let trend = trend_bands(&records, shown);
        assert_eq!(trend.len(), 1);
        assert_eq!(trend[0].mean, dec!(81));
        assert!(trend[0].upper > trend[0].mean);
        assert!(trend[0].lower < trend[0].mean);
    }

    #[test]
    fn test_cumulative_and_delta() {
        let records = create_test_records(d(2024, 1, 1), &[dec!(80), dec!(79.4)]);
        let cumulative = cumulative_loss(&records, dec!(81));
        assert_eq!(cumulative[1].value, dec!(1.6));

        let delta = daily_delta(&records);
        assert_eq!(delta.len(), 1);
        assert_eq!(delta[0].value, dec!(-0.6));
        assert_eq!(delta_distribution(&records), vec![(dec!(-0.6), 1)]);
    }

    #[test]
    fn test_monthly_change_and_histogram() {
        let records = vec![
            WeightRecord::new(d(2024, 1, 1), dec!(80.5), None).unwrap(),
            WeightRecord::new(d(2024, 1, 31), dec!(79.2), None).unwrap(),
            WeightRecord::new(d(2024, 2, 1), dec!(79.8), None).unwrap(),
        ];
        let months = monthly_change(&records);
        assert_eq!(months[0].1, dec!(-1.3));
        assert_eq!(months[1].1, dec!(0));
        assert_eq!(weight_histogram(&records), vec![(79, 2), (80, 1)]);
    }

    #[test]
    fn test_macd_needs_history() {
        let weights: Vec<Decimal> = (0..30).map(|i| dec!(90) - Decimal::from(i) / dec!(10)).collect();
        let records = create_test_records(d(2024, 1, 1), &weights);
        assert!(macd(&records[..25]).is_empty());
        let points = macd(&records);
        assert_eq!(points.len(), 30);
        // Falling weights push the fast average below the slow one
        assert!(points[29].macd < Decimal::ZERO);
    }
}
