//! Day-of-week, weight-zone and recovery patterns

use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::dates::{add_days, days_between, weekday_index, WEEKDAYS};
use crate::models::WeightRecord;
use crate::numeric::{mean, round1, round2, round_dp};
use crate::stats::daily_diffs;

/// Change statistics for one weekday, keyed by the later date of each pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekdayStat {
    pub weekday: Weekday,
    pub samples: usize,
    pub losses: usize,
    pub gains: usize,
    pub average_diff: Option<Decimal>,
}

impl WeekdayStat {
    /// Share of changes that were losses, in percent
    pub fn win_rate(&self) -> Option<Decimal> {
        (self.samples > 0).then(|| {
            round_dp(
                Decimal::from(self.losses) / Decimal::from(self.samples) * Decimal::ONE_HUNDRED,
                0,
            )
        })
    }

    /// Share of changes that were gains, in percent
    pub fn gain_probability(&self) -> Option<Decimal> {
        (self.samples > 0).then(|| {
            round_dp(
                Decimal::from(self.gains) / Decimal::from(self.samples) * Decimal::ONE_HUNDRED,
                0,
            )
        })
    }

    pub fn gain_risk(&self) -> Option<RiskLevel> {
        self.gain_probability().map(|p| {
            if p >= dec!(60) {
                RiskLevel::High
            } else if p <= dec!(30) {
                RiskLevel::Low
            } else {
                RiskLevel::Medium
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Per-weekday statistics with the best and worst day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekdayReport {
    /// Monday first
    pub days: Vec<WeekdayStat>,
    /// Weekday with the lowest average change
    pub best: Option<Weekday>,
    /// Weekday with the highest average change
    pub worst: Option<Weekday>,
}

/// Bucket every change by the weekday of its later record
pub fn weekday_averages(records: &[WeightRecord]) -> WeekdayReport {
    let diffs = daily_diffs(records);
    let mut buckets: [Vec<Decimal>; 7] = Default::default();

    for (record, diff) in records.iter().skip(1).zip(&diffs) {
        buckets[weekday_index(record.date)].push(*diff);
    }

    let days: Vec<WeekdayStat> = WEEKDAYS
        .iter()
        .zip(buckets.iter())
        .map(|(weekday, diffs)| WeekdayStat {
            weekday: *weekday,
            samples: diffs.len(),
            losses: diffs.iter().filter(|d| **d < Decimal::ZERO).count(),
            gains: diffs.iter().filter(|d| **d > Decimal::ZERO).count(),
            average_diff: mean(diffs).map(round2),
        })
        .collect();

    let ranked: Vec<(Weekday, Decimal)> = days
        .iter()
        .filter_map(|d| d.average_diff.map(|avg| (d.weekday, avg)))
        .collect();

    // First weekday wins ties, Monday first
    let best = ranked
        .iter()
        .fold(None::<(Weekday, Decimal)>, |acc, (w, avg)| match acc {
            Some((_, best)) if best <= *avg => acc,
            _ => Some((*w, *avg)),
        })
        .map(|(w, _)| w);
    let worst = ranked
        .iter()
        .fold(None::<(Weekday, Decimal)>, |acc, (w, avg)| match acc {
            Some((_, worst)) if worst >= *avg => acc,
            _ => Some((*w, *avg)),
        })
        .map(|(w, _)| w);

    WeekdayReport { days, best, worst }
}

/// Width of a weight zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneBanding {
    OneKg,
    TenKg,
}

impl ZoneBanding {
    /// Lower bound of the zone containing `weight`
    pub fn zone_of(&self, weight: Decimal) -> i64 {
        let floor = weight.floor().to_i64().unwrap_or(0);
        match self {
            ZoneBanding::OneKg => floor,
            ZoneBanding::TenKg => floor.div_euclid(10) * 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneStat {
    /// Lower bound of the zone in kg
    pub zone_kg: i64,
    pub samples: usize,
    /// Mean loss per entry while in this zone; positive is losing
    pub average_loss: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneReport {
    /// Ascending by zone
    pub zones: Vec<ZoneStat>,
    pub fastest: Option<i64>,
    pub slowest: Option<i64>,
}

/// Bucket changes by the zone of the earlier record in each pair
pub fn zone_analysis(records: &[WeightRecord], banding: ZoneBanding) -> ZoneReport {
    let mut buckets: BTreeMap<i64, Vec<Decimal>> = BTreeMap::new();
    for pair in records.windows(2) {
        buckets
            .entry(banding.zone_of(pair[0].weight))
            .or_default()
            .push(pair[0].weight - pair[1].weight);
    }

    let zones: Vec<ZoneStat> = buckets
        .into_iter()
        .filter_map(|(zone_kg, losses)| {
            Some(ZoneStat {
                zone_kg,
                samples: losses.len(),
                average_loss: round2(mean(&losses)?),
            })
        })
        .collect();

    let fastest = zones
        .iter()
        .max_by(|a, b| a.average_loss.cmp(&b.average_loss))
        .map(|z| z.zone_kg);
    let slowest = zones
        .iter()
        .min_by(|a, b| a.average_loss.cmp(&b.average_loss))
        .map(|z| z.zone_kg);

    ZoneReport {
        zones,
        fastest,
        slowest,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekendImpact {
    pub pairs: usize,
    /// Mean of Monday minus the preceding Friday
    pub average_change: Decimal,
}

/// Monday weight against the Friday exactly three days before
///
/// Only exact date matches count; a missing Friday skips that Monday.
pub fn weekend_impact(records: &[WeightRecord]) -> Option<WeekendImpact> {
    let by_date: HashMap<NaiveDate, Decimal> = records.iter().map(|r| (r.date, r.weight)).collect();

    let changes: Vec<Decimal> = records
        .iter()
        .filter(|r| r.date.weekday() == Weekday::Mon)
        .filter_map(|monday| {
            by_date
                .get(&add_days(monday.date, -3))
                .map(|friday| monday.weight - friday)
        })
        .collect();

    Some(WeekendImpact {
        pairs: changes.len(),
        average_change: round2(mean(&changes)?),
    })
}

/// A spike and the return to its pre-spike baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryEvent {
    /// Index of the spike record
    pub index: usize,
    pub spike_date: NaiveDate,
    pub spike_kg: Decimal,
    /// Weight of the record before the spike
    pub baseline: Decimal,
    pub recovered_on: Option<NaiveDate>,
    /// Records after the spike up to and including the recovering one
    pub entries_to_recover: Option<usize>,
}

impl RecoveryEvent {
    pub fn calendar_days(&self) -> Option<i64> {
        self.recovered_on.map(|d| days_between(self.spike_date, d))
    }
}

/// Find every spike of at least `threshold` and scan forward for recovery
///
/// The last record is never treated as a spike since nothing follows it.
pub fn recovery_events(records: &[WeightRecord], threshold: Decimal) -> Vec<RecoveryEvent> {
    let mut events = Vec::new();
    if records.len() < 3 {
        return events;
    }

    for i in 1..records.len() - 1 {
        let spike = round1(records[i].weight - records[i - 1].weight);
        if spike < threshold {
            continue;
        }

        let baseline = records[i - 1].weight;
        let recovery = records[i + 1..]
            .iter()
            .position(|r| r.weight <= baseline)
            .map(|offset| i + 1 + offset);

        events.push(RecoveryEvent {
            index: i,
            spike_date: records[i].date,
            spike_kg: spike,
            baseline,
            recovered_on: recovery.map(|j| records[j].date),
            entries_to_recover: recovery.map(|j| j - i),
        });
    }

    events
}

/// Mean entries to recover, ignoring spikes that never recovered
pub fn average_recovery_entries(events: &[RecoveryEvent]) -> Option<Decimal> {
    let counts: Vec<Decimal> = events
        .iter()
        .filter_map(|e| e.entries_to_recover.map(Decimal::from))
        .collect();
    mean(&counts).map(round1)
}

/// Local maxima and minima grouped by integer kg
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResistanceSupport {
    /// Most frequent peak zones as `(zone_kg, touches)`, at most three
    pub resistance: Vec<(i64, usize)>,
    /// Most frequent valley zones as `(zone_kg, touches)`, at most three
    pub support: Vec<(i64, usize)>,
}

pub fn resistance_support(records: &[WeightRecord]) -> ResistanceSupport {
    let mut peaks: BTreeMap<i64, usize> = BTreeMap::new();
    let mut valleys: BTreeMap<i64, usize> = BTreeMap::new();

    for window in records.windows(3) {
        let (prev, mid, next) = (window[0].weight, window[1].weight, window[2].weight);
        let zone = ZoneBanding::OneKg.zone_of(mid);
        if mid > prev && mid > next {
            *peaks.entry(zone).or_default() += 1;
        } else if mid < prev && mid < next {
            *valleys.entry(zone).or_default() += 1;
        }
    }

    ResistanceSupport {
        resistance: top_three(peaks),
        support: top_three(valleys),
    }
}

fn top_three(counts: BTreeMap<i64, usize>) -> Vec<(i64, usize)> {
    let mut ranked: Vec<(i64, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(b.0.cmp(&a.0)));
    ranked.truncate(3);
    ranked
}

/// Most common weekday pairing between a spike and its recovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheatRecoveryPattern {
    pub spike_day: Weekday,
    pub recovery_day: Weekday,
    pub occurrences: usize,
}

/// Spikes of 0.4kg or more that recover within the next six records
pub fn cheat_recovery_pattern(records: &[WeightRecord]) -> Option<CheatRecoveryPattern> {
    let mut pairs: BTreeMap<(usize, usize), usize> = BTreeMap::new();

    for i in 1..records.len() {
        if round1(records[i].weight - records[i - 1].weight) < dec!(0.4) {
            continue;
        }
        let baseline = records[i - 1].weight;
        let end = (i + 7).min(records.len());
        if let Some(recovered) = records[i + 1..end].iter().find(|r| r.weight <= baseline) {
            *pairs
                .entry((weekday_index(records[i].date), weekday_index(recovered.date)))
                .or_default() += 1;
        }
    }

    let ((spike, recovery), occurrences) = pairs
        .into_iter()
        .fold(None::<((usize, usize), usize)>, |acc, (key, count)| match acc {
            Some((_, best)) if best >= count => acc,
            _ => Some((key, count)),
        })?;

    Some(CheatRecoveryPattern {
        spike_day: WEEKDAYS[spike],
        recovery_day: WEEKDAYS[recovery],
        occurrences,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_records(start: NaiveDate, weights: &[Decimal]) -> Vec<WeightRecord> {
        weights
            .iter()
            .enumerate()
            .map(|(i, w)| WeightRecord::new(add_days(start, i as i64), *w, None).unwrap())
            .collect()
    }

    // 2024-01-01 is a Monday
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn test_weekday_buckets_use_later_date() {
        let records = create_test_records(monday(), &[dec!(80), dec!(79.5), dec!(79.8)]);
        let report = weekday_averages(&records);

        let tuesday = &report.days[1];
        assert_eq!(tuesday.weekday, Weekday::Tue);
        assert_eq!(tuesday.average_diff, Some(dec!(-0.5)));
        assert_eq!(tuesday.win_rate(), Some(dec!(100)));
        assert_eq!(report.days[2].average_diff, Some(dec!(0.3)));
        assert_eq!(report.days[0].samples, 0);
        assert_eq!(report.best, Some(Weekday::Tue));
        assert_eq!(report.worst, Some(Weekday::Wed));
    }

    #[test]
    fn test_gain_risk_levels() {
        let stat = WeekdayStat {
            weekday: Weekday::Mon,
            samples: 5,
            losses: 1,
            gains: 3,
            average_diff: Some(dec!(0.2)),
        };
        assert_eq!(stat.gain_probability(), Some(dec!(60)));
        assert_eq!(stat.gain_risk(), Some(RiskLevel::High));
    }

    #[test]
    fn test_zone_analysis_by_earlier_record() {
        let records = create_test_records(monday(), &[dec!(81.2), dec!(80.8), dec!(80.6), dec!(79.6)]);
        let report = zone_analysis(&records, ZoneBanding::OneKg);
        assert_eq!(report.zones.len(), 2);
        assert_eq!(report.zones[1].zone_kg, 81);
        assert_eq!(report.zones[1].average_loss, dec!(0.4));
        assert_eq!(report.zones[0].average_loss, dec!(0.6));
        assert_eq!(report.fastest, Some(80));
        assert_eq!(report.slowest, Some(81));

        let tens = zone_analysis(&records, ZoneBanding::TenKg);
        assert_eq!(tens.zones.len(), 1);
        assert_eq!(tens.zones[0].zone_kg, 80);
    }

    #[test]
    fn test_weekend_impact_exact_friday() {
        let records = vec![
            WeightRecord::new(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(), dec!(80), None).unwrap(),
            WeightRecord::new(NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(), dec!(80.6), None).unwrap(),
            // Thursday only, so this Monday is skipped
            WeightRecord::new(NaiveDate::from_ymd_opt(2024, 1, 11).unwrap(), dec!(80), None).unwrap(),
            WeightRecord::new(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(), dec!(81), None).unwrap(),
        ];
        let impact = weekend_impact(&records).unwrap();
        assert_eq!(impact.pairs, 1);
        assert_eq!(impact.average_change, dec!(0.6));
    }

    #[test]
    fn test_recovery_events() {
        let records = create_test_records(
            monday(),
            &[dec!(80), dec!(80.6), dec!(80.3), dec!(79.9), dec!(80.5), dec!(80.8)],
        );
        let events = recovery_events(&records, dec!(0.5));
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].entries_to_recover, Some(2));
        assert_eq!(events[0].calendar_days(), Some(2));
        // Second spike never returns to 79.9
        assert_eq!(events[1].recovered_on, None);
        assert_eq!(average_recovery_entries(&events), Some(dec!(2)));
    }

    #[test]
    fn test_resistance_support() {
        let records = create_test_records(
            monday(),
            &[dec!(80), dec!(81.2), dec!(80.5), dec!(81.4), dec!(80.1), dec!(80.9)],
        );
        let levels = resistance_support(&records);
        assert_eq!(levels.resistance, vec![(81, 2)]);
        assert_eq!(levels.support, vec![(80, 2)]);
    }

    #[test]
    fn test_cheat_recovery_pattern() {
        let records = create_test_records(
            monday(),
            &[dec!(80), dec!(80.5), dec!(80.2), dec!(79.9)],
        );
        let pattern = cheat_recovery_pattern(&records).unwrap();
        assert_eq!(pattern.spike_day, Weekday::Tue);
        assert_eq!(pattern.recovery_day, Weekday::Thu);
        assert_eq!(pattern.occurrences, 1);
    }
}
