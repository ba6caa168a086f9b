//! Summary statistics over a weight history
//!
//! Everything here is a pure function of the record slice. The snapshot is
//! what the tracker caches between mutations and what every downstream
//! analysis (badges, insights, reports) reads from.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dates::days_between;
use crate::models::{Settings, WeightRecord};
use crate::numeric::{mean, population_std_dev, round1, round_dp};

/// Tunable thresholds shared by the analytics modules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Absolute daily change below which a day counts towards a plateau (kg)
    pub plateau_threshold: Decimal,

    /// Daily gain at which a day counts as a spike (kg)
    pub spike_threshold: Decimal,

    /// Number of trailing records used for trend projection
    pub projection_window: usize,

    /// Records required before a projection is attempted
    pub min_projection_records: usize,

    /// Rate multiplier for the optimistic scenario
    pub optimistic_factor: Decimal,

    /// Rate multiplier for the conservative scenario
    pub conservative_factor: Decimal,

    /// Loss rate (kg/day) at or below which the trend is "not progressing"
    pub min_progress_rate: Decimal,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        AnalyticsConfig {
            plateau_threshold: dec!(0.2),
            spike_threshold: dec!(0.5),
            projection_window: 30,
            min_projection_records: 5,
            optimistic_factor: dec!(1.5),
            conservative_factor: dec!(0.7),
            min_progress_rate: dec!(0.001),
        }
    }
}

/// Derived statistics for a record history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    /// Number of records analysed
    pub record_count: usize,

    /// Weight of the latest record
    pub current: Option<Decimal>,

    /// Lowest weight and the first date it was reached
    pub min: Option<Decimal>,
    pub min_date: Option<NaiveDate>,

    /// Highest weight and the first date it was reached
    pub max: Option<Decimal>,
    pub max_date: Option<NaiveDate>,

    /// Mean of all weights
    pub mean: Option<Decimal>,

    /// Longest run of non-increasing entries
    pub max_streak_days: usize,

    /// Percentage of entry-to-entry changes that were losses
    pub success_rate_percent: Decimal,

    /// Largest single-day loss, as a positive number
    pub max_daily_drop: Decimal,

    /// Largest single-day gain
    pub max_daily_gain: Decimal,

    /// Population standard deviation of all weights
    pub std_dev: Decimal,

    /// Coefficient of variation in percent
    pub cv: Decimal,

    /// Fat mass change between the first and last records with body fat
    pub fat_change_kg: Option<Decimal>,

    /// Lean mass change between the first and last records with body fat
    pub lbm_change_kg: Option<Decimal>,

    /// Longest run of near-zero changes
    pub max_plateau_days: usize,

    /// Entry-to-entry changes rounded to 0.1kg; `daily_diffs[i]` is record i+1 minus record i
    pub daily_diffs: Vec<Decimal>,
}

impl AnalyticsSnapshot {
    /// Snapshot of an empty history
    pub fn empty() -> Self {
        Self {
            record_count: 0,
            current: None,
            min: None,
            min_date: None,
            max: None,
            max_date: None,
            mean: None,
            max_streak_days: 0,
            success_rate_percent: Decimal::ZERO,
            max_daily_drop: Decimal::ZERO,
            max_daily_gain: Decimal::ZERO,
            std_dev: Decimal::ZERO,
            cv: Decimal::ZERO,
            fat_change_kg: None,
            lbm_change_kg: None,
            max_plateau_days: 0,
            daily_diffs: Vec::new(),
        }
    }
}

/// Read-only inputs handed to every analysis
#[derive(Debug, Clone, Copy)]
pub struct AnalysisContext<'a> {
    pub records: &'a [WeightRecord],
    pub settings: &'a Settings,
    pub snapshot: &'a AnalyticsSnapshot,
    pub today: NaiveDate,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(
        records: &'a [WeightRecord],
        settings: &'a Settings,
        snapshot: &'a AnalyticsSnapshot,
        today: NaiveDate,
    ) -> Self {
        Self {
            records,
            settings,
            snapshot,
            today,
        }
    }

    /// Latest weight, if any record exists
    pub fn current(&self) -> Option<Decimal> {
        self.records.last().map(|r| r.weight)
    }

    /// Start weight minus current weight; zero with no records
    pub fn total_lost(&self) -> Decimal {
        self.current()
            .map(|c| self.settings.start_weight - c)
            .unwrap_or(Decimal::ZERO)
    }

    /// Calendar days between the first and last record
    pub fn span_days(&self) -> i64 {
        match (self.records.first(), self.records.last()) {
            (Some(first), Some(last)) => days_between(first.date, last.date),
            _ => 0,
        }
    }
}

/// Entry-to-entry changes rounded to one decimal place
pub fn daily_diffs(records: &[WeightRecord]) -> Vec<Decimal> {
    records
        .windows(2)
        .map(|pair| round1(pair[1].weight - pair[0].weight))
        .collect()
}

/// Longest run of consecutive items matching `pred`
pub fn longest_run<T>(items: &[T], pred: impl Fn(&T) -> bool) -> usize {
    let mut best = 0;
    let mut current = 0;
    for item in items {
        if pred(item) {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

/// Summary statistics calculator
pub struct StatsCalculator {
    config: AnalyticsConfig,
}

impl Default for StatsCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsCalculator {
    /// Create calculator with default thresholds
    pub fn new() -> Self {
        StatsCalculator {
            config: AnalyticsConfig::default(),
        }
    }

    /// Create calculator with custom thresholds
    pub fn with_config(config: AnalyticsConfig) -> Self {
        StatsCalculator { config }
    }

    /// Analyse an ascending record history
    pub fn analyze(&self, records: &[WeightRecord]) -> AnalyticsSnapshot {
        let Some(last) = records.last() else {
            return AnalyticsSnapshot::empty();
        };

        let diffs = daily_diffs(records);

        // Strict comparisons keep the first occurrence of each extremum
        let mut min_rec = &records[0];
        let mut max_rec = &records[0];
        for record in records {
            if record.weight < min_rec.weight {
                min_rec = record;
            }
            if record.weight > max_rec.weight {
                max_rec = record;
            }
        }

        let max_streak_days = longest_run(&diffs, |d| *d <= Decimal::ZERO);
        let max_plateau_days = longest_run(&diffs, |d| d.abs() < self.config.plateau_threshold);

        let success_rate_percent = if diffs.is_empty() {
            Decimal::ZERO
        } else {
            let losses = diffs.iter().filter(|d| **d < Decimal::ZERO).count();
            round_dp(
                Decimal::from(losses) / Decimal::from(diffs.len()) * Decimal::ONE_HUNDRED,
                0,
            )
        };

        let (max_daily_drop, max_daily_gain) = self.single_day_extremes(records, &diffs);

        let weights: Vec<Decimal> = records.iter().map(|r| r.weight).collect();
        let mean_weight = mean(&weights);
        let std_dev = population_std_dev(&weights).unwrap_or_default();
        let cv = match mean_weight {
            Some(m) if !m.is_zero() => std_dev / m * Decimal::ONE_HUNDRED,
            _ => Decimal::ZERO,
        };

        let (fat_change_kg, lbm_change_kg) = composition_change(records);

        debug!(
            records = records.len(),
            max_streak_days, max_plateau_days, "Computed analytics snapshot"
        );

        AnalyticsSnapshot {
            record_count: records.len(),
            current: Some(last.weight),
            min: Some(min_rec.weight),
            min_date: Some(min_rec.date),
            max: Some(max_rec.weight),
            max_date: Some(max_rec.date),
            mean: mean_weight,
            max_streak_days,
            success_rate_percent,
            max_daily_drop,
            max_daily_gain,
            std_dev,
            cv,
            fat_change_kg,
            lbm_change_kg,
            max_plateau_days,
            daily_diffs: diffs,
        }
    }

    /// Largest drop and gain between records exactly one calendar day apart
    fn single_day_extremes(&self, records: &[WeightRecord], diffs: &[Decimal]) -> (Decimal, Decimal) {
        let mut max_drop = Decimal::ZERO;
        let mut max_gain = Decimal::ZERO;

        for (pair, diff) in records.windows(2).zip(diffs) {
            if days_between(pair[0].date, pair[1].date) != 1 {
                continue;
            }
            if *diff < Decimal::ZERO {
                max_drop = max_drop.max(-*diff);
            } else {
                max_gain = max_gain.max(*diff);
            }
        }

        (max_drop, max_gain)
    }
}

/// Analyse with default thresholds
pub fn analyze(records: &[WeightRecord]) -> AnalyticsSnapshot {
    StatsCalculator::new().analyze(records)
}

/// Fat and lean mass change between the first and last records with body fat
fn composition_change(records: &[WeightRecord]) -> (Option<Decimal>, Option<Decimal>) {
    let mut with_fat = records.iter().filter(|r| r.fat.is_some());
    let first = with_fat.next();
    let last = with_fat.last();

    match (first, last) {
        (Some(first), Some(last)) => {
            let fat = last.fat_mass().zip(first.fat_mass()).map(|(l, f)| round1(l - f));
            let lbm = last.lean_mass().zip(first.lean_mass()).map(|(l, f)| round1(l - f));
            (fat, lbm)
        }
        _ => (None, None),
    }
}
