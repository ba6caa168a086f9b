//! Tabular derivations over the record history
//!
//! Every table is recomputed from the records on demand. Calendar tables are
//! listed newest first, rankings best first.

use chrono::{NaiveDate, Weekday};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::dates::{add_days, days_between, monday_of_week, weekday_index, YearMonth, WEEKDAYS};
use crate::models::WeightRecord;
use crate::numeric::{mean, min_max, percent, round1, round2, round_dp};
use crate::patterns::ZoneBanding;
use crate::stats::{longest_run, AnalysisContext};

/// Number of rows in ranking tables
pub const TOP_N: usize = 5;

/// Loss that counts as a sprint
const SPRINT_LOSS: Decimal = dec!(1.0);

/// Records a sprint may span
const SPRINT_WINDOW: usize = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRow {
    pub month: YearMonth,
    pub start: Decimal,
    pub end: Decimal,
    /// End minus start
    pub change: Decimal,
    pub average: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyRow {
    /// Monday of the week
    pub week_start: NaiveDate,
    pub average: Decimal,
    pub change: Decimal,
}

/// First entry into a lower whole-kg band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub zone_kg: i64,
    pub date: NaiveDate,
    /// Days since the previous milestone, or since the first record
    pub days_taken: i64,
}

/// Fastest stretch to lose a kilogram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sprint {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub loss_kg: Decimal,
    pub days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub date: NaiveDate,
    pub change_kg: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopChanges {
    pub drops: Vec<ChangeEntry>,
    pub gains: Vec<ChangeEntry>,
    /// Longest run of strictly decreasing entries
    pub longest_loss_streak: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakDetails {
    pub longest_loss: usize,
    pub longest_gain: usize,
    /// Longest run of entries on consecutive days
    pub longest_recording: usize,
    /// Longest gap between entries, in days; zero when every entry is daily
    pub longest_gap_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySuccess {
    pub month: YearMonth,
    pub losses: usize,
    pub total: usize,
    pub rate_percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneDuration {
    pub zone_kg: i64,
    pub entries: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    /// Days between the first and last entry in the zone
    pub span_days: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
}

impl Grade {
    fn from_weekday(average: Decimal, win_rate: Decimal) -> Self {
        if average < dec!(-0.2) && win_rate > dec!(60) {
            Grade::A
        } else if average < Decimal::ZERO {
            Grade::B
        } else if average > dec!(0.2) {
            Grade::D
        } else {
            Grade::C
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekdayGrade {
    pub weekday: Weekday,
    pub average_change: Decimal,
    pub win_rate_percent: Decimal,
    pub grade: Grade,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthRanking {
    /// Months with the largest net loss, best first
    pub best: Vec<(YearMonth, Decimal)>,
    /// Months with the largest net gain, worst first
    pub worst: Vec<(YearMonth, Decimal)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub date: NaiveDate,
    pub weight: Decimal,
    pub fat: Option<Decimal>,
    /// Change from the previous entry
    pub change: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consistency {
    /// Distinct days recorded in the last 30, as a percentage capped at 100
    pub record_score: u32,
    /// Share of recent entries lower than the one before
    pub loss_consistency: Option<Decimal>,
}

/// State of the last two weeks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum PlateauStatus {
    NotEnoughData,
    Stalled { range_kg: Decimal },
    Losing,
    Gaining,
}

/// Every table at once, as shown by the report command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullReport {
    pub monthly: Vec<MonthlyRow>,
    pub weekly: Vec<WeeklyRow>,
    pub milestones: Vec<Milestone>,
    pub sprints: Vec<Sprint>,
    pub top_changes: TopChanges,
    pub streaks: StreakDetails,
    pub monthly_success: Vec<MonthlySuccess>,
    pub zones: Vec<ZoneDuration>,
    pub weekday_grades: Vec<WeekdayGrade>,
    pub months: MonthRanking,
    pub consistency: Consistency,
    pub plateau: PlateauStatus,
}

pub fn full_report(ctx: &AnalysisContext) -> FullReport {
    let records = ctx.records;
    FullReport {
        monthly: monthly_table(records),
        weekly: weekly_table(records),
        milestones: milestones(records),
        sprints: sprints(records),
        top_changes: top_changes(records),
        streaks: streak_details(records),
        monthly_success: monthly_success(records),
        zones: zone_durations(records),
        weekday_grades: weekday_grades(records),
        months: month_ranking(records),
        consistency: consistency(records, ctx.today),
        plateau: plateau_status(records),
    }
}

fn group_by<K: Ord>(records: &[WeightRecord], key: impl Fn(&WeightRecord) -> K) -> BTreeMap<K, Vec<Decimal>> {
    let mut groups: BTreeMap<K, Vec<Decimal>> = BTreeMap::new();
    for record in records {
        groups.entry(key(record)).or_default().push(record.weight);
    }
    groups
}

/// Per calendar month: first, last, change and mean weight
pub fn monthly_table(records: &[WeightRecord]) -> Vec<MonthlyRow> {
    group_by(records, |r| YearMonth::of(r.date))
        .into_iter()
        .rev()
        .filter_map(|(month, weights)| {
            let start = *weights.first()?;
            let end = *weights.last()?;
            Some(MonthlyRow {
                month,
                start,
                end,
                change: round1(end - start),
                average: round1(mean(&weights)?),
            })
        })
        .collect()
}

/// Per Monday-keyed week: mean weight and first-to-last change
pub fn weekly_table(records: &[WeightRecord]) -> Vec<WeeklyRow> {
    group_by(records, |r| monday_of_week(r.date))
        .into_iter()
        .rev()
        .filter_map(|(week_start, weights)| {
            Some(WeeklyRow {
                week_start,
                average: round1(mean(&weights)?),
                change: round1(*weights.last()? - *weights.first()?),
            })
        })
        .collect()
}

pub fn milestones(records: &[WeightRecord]) -> Vec<Milestone> {
    let Some(first) = records.first() else {
        return Vec::new();
    };
    let band = ZoneBanding::OneKg;
    let mut zone = band.zone_of(first.weight);
    let mut since = first.date;
    let mut reached = Vec::new();

    for record in &records[1..] {
        let z = band.zone_of(record.weight);
        if z < zone {
            reached.push(Milestone {
                zone_kg: z,
                date: record.date,
                days_taken: days_between(since, record.date),
            });
            zone = z;
            since = record.date;
        }
    }
    reached
}

/// Quickest 1kg losses, each starting from a different record
pub fn sprints(records: &[WeightRecord]) -> Vec<Sprint> {
    let mut found: Vec<Sprint> = records
        .iter()
        .enumerate()
        .filter_map(|(i, start)| {
            let end_index = (i + SPRINT_WINDOW).min(records.len());
            records[i + 1..end_index]
                .iter()
                .find(|r| start.weight - r.weight >= SPRINT_LOSS)
                .map(|end| Sprint {
                    start: start.date,
                    end: end.date,
                    loss_kg: round1(start.weight - end.weight),
                    days: days_between(start.date, end.date),
                })
        })
        .collect();

    // Stable sort keeps the earlier sprint first on ties
    found.sort_by_key(|s| s.days);
    found.truncate(TOP_N);
    found
}

pub fn top_changes(records: &[WeightRecord]) -> TopChanges {
    let changes: Vec<ChangeEntry> = records
        .windows(2)
        .map(|pair| ChangeEntry {
            date: pair[1].date,
            change_kg: round1(pair[1].weight - pair[0].weight),
        })
        .collect();

    let mut drops: Vec<ChangeEntry> = changes
        .iter()
        .filter(|c| c.change_kg < Decimal::ZERO)
        .cloned()
        .collect();
    drops.sort_by(|a, b| a.change_kg.cmp(&b.change_kg));
    drops.truncate(TOP_N);

    let mut gains: Vec<ChangeEntry> = changes
        .iter()
        .filter(|c| c.change_kg > Decimal::ZERO)
        .cloned()
        .collect();
    gains.sort_by(|a, b| b.change_kg.cmp(&a.change_kg));
    gains.truncate(TOP_N);

    TopChanges {
        drops,
        gains,
        longest_loss_streak: longest_run(&changes, |c| c.change_kg < Decimal::ZERO),
    }
}

pub fn streak_details(records: &[WeightRecord]) -> StreakDetails {
    let diffs: Vec<Decimal> = records.windows(2).map(|p| p[1].weight - p[0].weight).collect();
    let gaps: Vec<i64> = records
        .windows(2)
        .map(|p| days_between(p[0].date, p[1].date))
        .collect();

    StreakDetails {
        longest_loss: longest_run(&diffs, |d| *d < Decimal::ZERO),
        longest_gain: longest_run(&diffs, |d| *d > Decimal::ZERO),
        longest_recording: longest_run(&gaps, |g| *g == 1),
        longest_gap_days: gaps.iter().copied().filter(|g| *g != 1).max().unwrap_or(0),
    }
}

/// Share of losing entries per month, keyed by the later record's month
pub fn monthly_success(records: &[WeightRecord]) -> Vec<MonthlySuccess> {
    let mut months: BTreeMap<YearMonth, (usize, usize)> = BTreeMap::new();
    for pair in records.windows(2) {
        let entry = months.entry(YearMonth::of(pair[1].date)).or_default();
        entry.1 += 1;
        if pair[1].weight < pair[0].weight {
            entry.0 += 1;
        }
    }

    months
        .into_iter()
        .rev()
        .map(|(month, (losses, total))| MonthlySuccess {
            month,
            losses,
            total,
            rate_percent: round_dp(percent(Decimal::from(losses), Decimal::from(total)), 0),
        })
        .collect()
}

/// Entries and time spent in each 10kg zone, heaviest first
pub fn zone_durations(records: &[WeightRecord]) -> Vec<ZoneDuration> {
    let band = ZoneBanding::TenKg;
    let mut zones: BTreeMap<i64, ZoneDuration> = BTreeMap::new();
    for record in records {
        let zone_kg = band.zone_of(record.weight);
        let entry = zones.entry(zone_kg).or_insert(ZoneDuration {
            zone_kg,
            entries: 0,
            first_date: record.date,
            last_date: record.date,
            span_days: 0,
        });
        entry.entries += 1;
        entry.last_date = record.date;
        entry.span_days = days_between(entry.first_date, entry.last_date);
    }
    zones.into_values().rev().collect()
}

/// Grade each weekday with data, Monday first
pub fn weekday_grades(records: &[WeightRecord]) -> Vec<WeekdayGrade> {
    let mut buckets: [Vec<Decimal>; 7] = Default::default();
    for pair in records.windows(2) {
        buckets[weekday_index(pair[1].date)].push(pair[1].weight - pair[0].weight);
    }

    WEEKDAYS
        .iter()
        .zip(buckets.iter())
        .filter_map(|(weekday, diffs)| {
            let average = mean(diffs)?;
            let wins = diffs.iter().filter(|d| **d < Decimal::ZERO).count();
            let win_rate = round_dp(
                percent(Decimal::from(wins), Decimal::from(diffs.len())),
                0,
            );
            Some(WeekdayGrade {
                weekday: *weekday,
                average_change: round2(average),
                win_rate_percent: win_rate,
                grade: Grade::from_weekday(average, win_rate),
            })
        })
        .collect()
}

/// Top three months by net loss and by net gain
pub fn month_ranking(records: &[WeightRecord]) -> MonthRanking {
    let mut totals: BTreeMap<YearMonth, Decimal> = BTreeMap::new();
    for pair in records.windows(2) {
        *totals.entry(YearMonth::of(pair[1].date)).or_default() += pair[1].weight - pair[0].weight;
    }

    let mut sorted: Vec<(YearMonth, Decimal)> =
        totals.into_iter().map(|(m, v)| (m, round1(v))).collect();
    sorted.sort_by(|a, b| a.1.cmp(&b.1));

    MonthRanking {
        best: sorted.iter().take(3).cloned().collect(),
        worst: sorted.iter().rev().take(3).cloned().collect(),
    }
}

/// One row per record, newest first
pub fn history(records: &[WeightRecord]) -> Vec<HistoryRow> {
    records
        .iter()
        .enumerate()
        .rev()
        .map(|(i, record)| HistoryRow {
            date: record.date,
            weight: record.weight,
            fat: record.fat,
            change: i
                .checked_sub(1)
                .map(|prev| round1(record.weight - records[prev].weight)),
        })
        .collect()
}

pub fn consistency(records: &[WeightRecord], today: NaiveDate) -> Consistency {
    let cutoff = add_days(today, -30);
    let recent: Vec<&WeightRecord> = records.iter().filter(|r| r.date >= cutoff).collect();
    let unique: BTreeSet<NaiveDate> = recent.iter().map(|r| r.date).collect();

    let score = round_dp(
        percent(Decimal::from(unique.len()), Decimal::from(30)),
        0,
    )
    .min(Decimal::ONE_HUNDRED);

    let loss_consistency = (recent.len() > 1).then(|| {
        let losses = recent.windows(2).filter(|p| p[1].weight < p[0].weight).count();
        round_dp(
            percent(Decimal::from(losses), Decimal::from(recent.len() - 1)),
            0,
        )
    });

    Consistency {
        record_score: score.to_u32().unwrap_or(0),
        loss_consistency,
    }
}

/// Classify the last 14 records; needs at least 7
pub fn plateau_status(records: &[WeightRecord]) -> PlateauStatus {
    let recent = &records[records.len().saturating_sub(14)..];
    if recent.len() < 7 {
        return PlateauStatus::NotEnoughData;
    }
    let weights: Vec<Decimal> = recent.iter().map(|r| r.weight).collect();
    let Some((lo, hi)) = min_max(&weights) else {
        return PlateauStatus::NotEnoughData;
    };

    let range = round1(hi - lo);
    if range < dec!(0.5) {
        PlateauStatus::Stalled { range_kg: range }
    } else if weights[weights.len() - 1] < weights[0] {
        PlateauStatus::Losing
    } else {
        PlateauStatus::Gaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn rec(date: NaiveDate, weight: Decimal) -> WeightRecord {
        WeightRecord::new(date, weight, None).unwrap()
    }

    fn create_test_records(start: NaiveDate, weights: &[Decimal]) -> Vec<WeightRecord> {
        weights
            .iter()
            .enumerate()
            .map(|(i, w)| rec(add_days(start, i as i64), *w))
            .collect()
    }

    #[test]
    fn test_monthly_table_newest_first() {
        let records = vec![
            rec(d(2024, 1, 1), dec!(82)),
            rec(d(2024, 1, 20), dec!(80.9)),
            rec(d(2024, 2, 1), dec!(80.5)),
            rec(d(2024, 2, 10), dec!(79.4)),
        ];
        let rows = monthly_table(&records);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].month.to_string(), "2024-02");
        assert_eq!(rows[0].change, dec!(-1.1));
        assert_eq!(rows[1].average, dec!(81.5));
    }

    #[test]
    fn test_weekly_table() {
        // 2024-01-01 is a Monday
        let records = create_test_records(d(2024, 1, 6), &[dec!(80), dec!(79.5), dec!(79.1)]);
        let rows = weekly_table(&records);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].week_start, d(2024, 1, 8));
        assert_eq!(rows[1].week_start, d(2024, 1, 1));
        assert_eq!(rows[1].change, dec!(-0.5));
        assert_eq!(rows[1].average, dec!(79.8));
    }

    #[test]
    fn test_milestones() {
        let records = vec![
            rec(d(2024, 1, 1), dec!(80.2)),
            rec(d(2024, 1, 5), dec!(79.9)),
            rec(d(2024, 1, 6), dec!(80.1)),
            rec(d(2024, 1, 15), dec!(78.8)),
        ];
        let reached = milestones(&records);
        assert_eq!(reached.len(), 2);
        assert_eq!(reached[0].zone_kg, 79);
        assert_eq!(reached[0].days_taken, 4);
        assert_eq!(reached[1].zone_kg, 78);
        assert_eq!(reached[1].days_taken, 10);
    }

    #[test]
    fn test_sprints_sorted_by_days() {
        let records = vec![
            rec(d(2024, 1, 1), dec!(82)),
            rec(d(2024, 1, 5), dec!(81)),
            rec(d(2024, 1, 6), dec!(80)),
        ];
        let found = sprints(&records);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].start, d(2024, 1, 5));
        assert_eq!(found[0].days, 1);
        assert_eq!(found[1].days, 4);
    }

    #[test]
    fn test_top_changes_and_streaks() {
        let records = create_test_records(
            d(2024, 1, 1),
            &[dec!(80), dec!(79.5), dec!(79), dec!(79.8), dec!(79.8), dec!(78)],
        );
        let top = top_changes(&records);
        assert_eq!(top.drops[0].change_kg, dec!(-1.8));
        assert_eq!(top.gains.len(), 1);
        assert_eq!(top.gains[0].change_kg, dec!(0.8));
        assert_eq!(top.longest_loss_streak, 2);

        let streaks = streak_details(&records);
        assert_eq!(streaks.longest_loss, 2);
        assert_eq!(streaks.longest_gain, 1);
        assert_eq!(streaks.longest_recording, 5);
        assert_eq!(streaks.longest_gap_days, 0);
    }

    #[test]
    fn test_weekday_grades() {
        // Tuesday and Wednesday both lose 0.5
        let records = create_test_records(d(2024, 1, 1), &[dec!(80), dec!(79.5), dec!(79)]);
        let grades = weekday_grades(&records);
        assert_eq!(grades.len(), 2);
        assert_eq!(grades[0].weekday, Weekday::Tue);
        assert_eq!(grades[0].grade, Grade::A);
        assert_eq!(grades[0].win_rate_percent, dec!(100));
    }

    #[test]
    fn test_zone_durations_heaviest_first() {
        let records = vec![
            rec(d(2024, 1, 1), dec!(81)),
            rec(d(2024, 1, 10), dec!(80.2)),
            rec(d(2024, 1, 20), dec!(79.9)),
        ];
        let zones = zone_durations(&records);
        assert_eq!(zones[0].zone_kg, 80);
        assert_eq!(zones[0].entries, 2);
        assert_eq!(zones[0].span_days, 9);
        assert_eq!(zones[1].zone_kg, 70);
    }

    #[test]
    fn test_history_rows() {
        let records = create_test_records(d(2024, 1, 1), &[dec!(80), dec!(80.4)]);
        let rows = history(&records);
        assert_eq!(rows[0].change, Some(dec!(0.4)));
        assert_eq!(rows[1].change, None);
    }

    #[test]
    fn test_consistency() {
        let records = create_test_records(d(2024, 1, 1), &[dec!(80), dec!(79.8), dec!(79.9), dec!(79.5)]);
        let result = consistency(&records, d(2024, 1, 10));
        assert_eq!(result.record_score, 13);
        assert_eq!(result.loss_consistency, Some(dec!(67)));
    }

    #[test]
    fn test_plateau_status() {
        let flat = create_test_records(d(2024, 1, 1), &[dec!(80); 8]);
        assert_eq!(
            plateau_status(&flat),
            PlateauStatus::Stalled {
                range_kg: dec!(0)
            }
        );
        assert_eq!(plateau_status(&flat[..5]), PlateauStatus::NotEnoughData);
    }
}
