//! Structured advanced insights
//!
//! Each insight is a variant carrying the numbers behind it. Rendering the
//! text is left to the caller.

use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::dates::{weekday_index, YearMonth};
use crate::metabolic::{short_trend, ShortTrendReading};
use crate::models::WeightRecord;
use crate::numeric::{mean, population_std_dev, round1, round_dp};
use crate::patterns::{
    cheat_recovery_pattern, recovery_events, weekday_averages, zone_analysis, CheatRecoveryPattern,
    ZoneBanding,
};
use crate::projection::{confidence_window, ConfidenceWindow};
use crate::stats::{daily_diffs, AnalysisContext};

/// Records needed before any insight is produced
pub const MIN_RECORDS: usize = 5;

/// Overall character of the weight curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Persona {
    RollerCoaster,
    SteadyTortoise,
    Balanced,
    WeekendBinger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VolatilityLevel {
    Stable,
    Moderate,
    Volatile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonthGrade {
    #[serde(rename = "A+")]
    APlus,
    B,
    C,
    D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LossStyle {
    Hare,
    Tortoise,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Insight {
    Persona { persona: Persona },
    /// Body fat fell while weight held or rose
    WaterMasking { fat_change: Decimal },
    /// 7-record mean crossed below the 30-record mean
    GoldenCross,
    /// 7-record mean crossed above the 30-record mean
    DeadCross,
    BestWorstWeekday { best: Weekday, worst: Weekday },
    /// Recurring gains roughly every 28 records
    CyclePattern { cycles_with_gain: usize },
    ReboundWarning { drop_kg: Decimal },
    SeasonalGain { month: u32, gain_kg: Decimal },
    CheatRecovery(CheatRecoveryPattern),
    ZoneSpeed { fastest_zone_kg: i64, slowest_zone_kg: i64 },
    LongestPlateau { entries: usize },
    Volatility { score: u32, level: VolatilityLevel },
    ConfidenceWindow(ConfidenceWindow),
    MonthlyGrade { month: YearMonth, grade: MonthGrade, loss_kg: Decimal },
    RapidLossWarning { weekly_drop_kg: Decimal },
    BestPerformance { from: NaiveDate, to: NaiveDate, loss_kg: Decimal },
    /// Losing through Thursday, gaining back Friday or Saturday
    FridayPattern,
    StopLoss { gain_streak: usize, gained_kg: Decimal },
    /// Flat week with the latest entry below the weekly mean
    FalsePlateau,
    WhooshExpected { plateau_entries: usize },
    TrendReversal { peak_kg: Decimal },
    CheatRecoveryDays { average_days: Decimal },
    LossStyle { style: LossStyle },
    ShortTrend(ShortTrendReading),
}

/// Produce every applicable insight; empty below [`MIN_RECORDS`]
pub fn generate(ctx: &AnalysisContext) -> Vec<Insight> {
    let records = ctx.records;
    if records.len() < MIN_RECORDS {
        return Vec::new();
    }

    let weights: Vec<Decimal> = records.iter().map(|r| r.weight).collect();
    let diffs = if ctx.snapshot.daily_diffs.len() + 1 == records.len() {
        ctx.snapshot.daily_diffs.clone()
    } else {
        daily_diffs(records)
    };
    let max_plateau = ctx.snapshot.max_plateau_days;
    let weekdays = weekday_averages(records);
    let cycle = cycle_pattern(&weights);

    let mut insights = vec![Insight::Persona {
        persona: persona(records, ctx.snapshot.std_dev),
    }];

    insights.extend(water_masking(records));
    insights.extend(moving_average_cross(&weights));

    if let (Some(best), Some(worst)) = (weekdays.best, weekdays.worst) {
        insights.push(Insight::BestWorstWeekday { best, worst });
    }
    insights.extend(cycle);

    let tail = &weights[weights.len() - 3..];
    let drop3 = tail[0] - tail[2];
    if drop3 >= dec!(2.0) {
        insights.push(Insight::ReboundWarning { drop_kg: round1(drop3) });
    }

    insights.extend(seasonal_gain(records));
    insights.extend(cheat_recovery_pattern(records).map(Insight::CheatRecovery));

    let zones = zone_analysis(records, ZoneBanding::OneKg);
    if zones.zones.len() >= 2 {
        if let (Some(fastest), Some(slowest)) = (zones.fastest, zones.slowest) {
            insights.push(Insight::ZoneSpeed {
                fastest_zone_kg: fastest,
                slowest_zone_kg: slowest,
            });
        }
    }

    if max_plateau >= 3 {
        insights.push(Insight::LongestPlateau { entries: max_plateau });
    }

    insights.extend(volatility(&diffs));
    insights.extend(
        confidence_window(records, ctx.settings.goal_weight, ctx.today).map(Insight::ConfidenceWindow),
    );
    insights.extend(monthly_grade(records, ctx.today));

    if weights.len() > 7 {
        let week = &weights[weights.len() - 7..];
        let drop = round1(week[0] - week[6]);
        if drop > dec!(2.0) {
            insights.push(Insight::RapidLossWarning { weekly_drop_kg: drop });
        }
    }

    insights.extend(best_performance(records));

    let day_avg = |day: Weekday| {
        weekdays.days[weekday_index_of(day)]
            .average_diff
            .unwrap_or(Decimal::ZERO)
    };
    if day_avg(Weekday::Thu) < Decimal::ZERO
        && (day_avg(Weekday::Fri) > Decimal::ZERO || day_avg(Weekday::Sat) > Decimal::ZERO)
    {
        insights.push(Insight::FridayPattern);
    }

    insights.extend(stop_loss(&weights));

    if max_plateau >= 7 {
        let week = &weights[weights.len() - 7..];
        let flat = (week[0] - week[6]).abs() < dec!(0.2);
        let below_mean = mean(week).map_or(false, |m| week[6] - m < Decimal::ZERO);
        if flat && below_mean {
            insights.push(Insight::FalsePlateau);
        }
    }

    if max_plateau > 10 {
        insights.push(Insight::WhooshExpected {
            plateau_entries: max_plateau,
        });
    }

    if weights.len() > 20 {
        let recent = &weights[weights.len() - 10..];
        let peak = recent[5];
        if recent[0] < peak && recent[9] < peak && peak > recent[0] + dec!(1) {
            insights.push(Insight::TrendReversal { peak_kg: peak });
        }
    }

    insights.extend(cheat_recovery_days(records));
    insights.extend(loss_style(&weights));
    insights.extend(short_trend(records).map(Insight::ShortTrend));

    debug!(count = insights.len(), "Generated insights");
    insights
}

fn weekday_index_of(day: Weekday) -> usize {
    day.num_days_from_monday() as usize
}

fn persona(records: &[WeightRecord], std_dev: Decimal) -> Persona {
    let monday_spikes = records
        .windows(2)
        .filter(|pair| weekday_index(pair[1].date) == 0 && pair[1].weight > pair[0].weight + dec!(0.5))
        .count();

    if monday_spikes >= 3 {
        Persona::WeekendBinger
    } else if std_dev > dec!(0.8) {
        Persona::RollerCoaster
    } else if std_dev < dec!(0.3) {
        Persona::SteadyTortoise
    } else {
        Persona::Balanced
    }
}

fn water_masking(records: &[WeightRecord]) -> Option<Insight> {
    let [.., prev, last] = records else {
        return None;
    };
    if records.len() < 3 {
        return None;
    }
    let (prev_fat, last_fat) = (prev.fat?, last.fat?);
    (last_fat < prev_fat && last.weight >= prev.weight).then(|| Insight::WaterMasking {
        fat_change: round1(last_fat - prev_fat),
    })
}

fn moving_average_cross(weights: &[Decimal]) -> Option<Insight> {
    let n = weights.len();
    if n < 31 {
        return None;
    }
    let window_mean = |end: usize, len: usize| mean(&weights[end - len..end]);

    let (last7, last30) = (window_mean(n, 7)?, window_mean(n, 30)?);
    let (prev7, prev30) = (window_mean(n - 1, 7)?, window_mean(n - 1, 30)?);

    if prev7 >= prev30 && last7 < last30 {
        Some(Insight::GoldenCross)
    } else if prev7 <= prev30 && last7 > last30 {
        Some(Insight::DeadCross)
    } else {
        None
    }
}

/// Looks back from the latest record in 28-record steps for a gain above
/// 0.5kg in the first five entries of each step
fn cycle_pattern(weights: &[Decimal]) -> Option<Insight> {
    let n = weights.len();
    if n <= 60 {
        return None;
    }
    let reversed: Vec<Decimal> = weights.iter().rev().copied().collect();

    let cycles_with_gain = (0..n - 30)
        .step_by(28)
        .filter(|&start| {
            (start..start + 5)
                .filter(|j| j + 1 < n)
                .any(|j| reversed[j] > reversed[j + 1] + dec!(0.5))
        })
        .count();

    (cycles_with_gain >= 2).then_some(Insight::CyclePattern { cycles_with_gain })
}

fn seasonal_gain(records: &[WeightRecord]) -> Option<Insight> {
    let mut by_month: BTreeMap<u32, Decimal> = BTreeMap::new();
    for pair in records.windows(2) {
        *by_month.entry(pair[1].date.month()).or_default() += pair[1].weight - pair[0].weight;
    }

    // Earliest month wins ties
    let (month, gain) = by_month
        .into_iter()
        .fold(None::<(u32, Decimal)>, |acc, (m, g)| match acc {
            Some((_, best)) if best >= g => acc,
            _ => Some((m, g)),
        })?;

    (gain > dec!(1.0)).then(|| Insight::SeasonalGain {
        month,
        gain_kg: round1(gain),
    })
}

fn volatility(diffs: &[Decimal]) -> Option<Insight> {
    let std_dev = population_std_dev(diffs)?;
    let raw = (Decimal::ONE_HUNDRED - std_dev * dec!(50)).max(Decimal::ZERO);
    let level = if raw > dec!(80) {
        VolatilityLevel::Stable
    } else if raw > dec!(50) {
        VolatilityLevel::Moderate
    } else {
        VolatilityLevel::Volatile
    };
    let score = round_dp(raw, 0).to_u32().unwrap_or(0);
    Some(Insight::Volatility { score, level })
}

fn monthly_grade(records: &[WeightRecord], today: NaiveDate) -> Option<Insight> {
    let month = YearMonth::of(today);
    let in_month: Vec<&WeightRecord> = records.iter().filter(|r| month.contains(r.date)).collect();
    if in_month.len() <= 3 {
        return None;
    }

    let loss = round1(in_month[0].weight - in_month[in_month.len() - 1].weight);
    let unique_days: BTreeSet<NaiveDate> = in_month.iter().map(|r| r.date).collect();
    let consistency =
        Decimal::from(unique_days.len()) / Decimal::from(today.day()) * Decimal::ONE_HUNDRED;

    let grade = if loss > dec!(2) && consistency > dec!(80) {
        MonthGrade::APlus
    } else if loss > dec!(1) && consistency > dec!(60) {
        MonthGrade::B
    } else if loss < Decimal::ZERO {
        MonthGrade::D
    } else {
        MonthGrade::C
    };

    Some(Insight::MonthlyGrade {
        month,
        grade,
        loss_kg: loss,
    })
}

/// Largest loss over any 30-record span
fn best_performance(records: &[WeightRecord]) -> Option<Insight> {
    if records.len() <= 30 {
        return None;
    }
    let mut best: Option<(usize, Decimal)> = None;
    for i in 30..records.len() {
        let loss = round1(records[i - 30].weight - records[i].weight);
        if best.map_or(true, |(_, b)| loss > b) {
            best = Some((i, loss));
        }
    }

    let (end, loss) = best?;
    (loss > Decimal::ZERO).then(|| Insight::BestPerformance {
        from: records[end - 30].date,
        to: records[end].date,
        loss_kg: loss,
    })
}

fn stop_loss(weights: &[Decimal]) -> Option<Insight> {
    let gains: Vec<Decimal> = weights
        .windows(2)
        .rev()
        .map(|pair| pair[1] - pair[0])
        .take_while(|diff| *diff > Decimal::ZERO)
        .collect();
    let gained: Decimal = gains.iter().copied().sum();

    (gains.len() >= 3 && gained >= dec!(1.5)).then(|| Insight::StopLoss {
        gain_streak: gains.len(),
        gained_kg: round1(gained),
    })
}

/// Average calendar days to undo a gain of 1kg or more
///
/// Only reported once more than two smaller cheat spikes recovered within
/// six entries.
fn cheat_recovery_days(records: &[WeightRecord]) -> Option<Insight> {
    let quick_recoveries = recovery_events(records, dec!(0.4))
        .iter()
        .filter(|e| e.entries_to_recover.map_or(false, |n| n <= 6))
        .count();
    if quick_recoveries <= 2 {
        return None;
    }

    let days: Vec<Decimal> = recovery_events(records, dec!(1.0))
        .iter()
        .filter_map(|e| e.calendar_days().map(Decimal::from))
        .collect();
    let average = mean(&days)?;
    Some(Insight::CheatRecoveryDays {
        average_days: round1(average),
    })
}

fn loss_style(weights: &[Decimal]) -> Option<Insight> {
    if weights.len() <= 30 {
        return None;
    }
    let swings: Vec<Decimal> = weights.windows(2).map(|pair| (pair[1] - pair[0]).abs()).collect();
    let spread = population_std_dev(&swings)?;
    let style = if spread > dec!(0.5) {
        LossStyle::Hare
    } else {
        LossStyle::Tortoise
    };
    Some(Insight::LossStyle { style })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::add_days;
    use crate::models::Settings;
    use crate::stats::analyze;

    fn create_test_records(start: NaiveDate, weights: &[Decimal]) -> Vec<WeightRecord> {
        weights
            .iter()
            .enumerate()
            .map(|(i, w)| WeightRecord::new(add_days(start, i as i64), *w, None).unwrap())
            .collect()
    }

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    fn run(records: &[WeightRecord], today: NaiveDate) -> Vec<Insight> {
        let settings = Settings::default();
        let snapshot = analyze(records);
        let ctx = AnalysisContext::new(records, &settings, &snapshot, today);
        generate(&ctx)
    }

    fn has(insights: &[Insight], pred: impl Fn(&Insight) -> bool) -> bool {
        insights.iter().any(pred)
    }

    #[test]
    fn test_requires_five_records() {
        let records = create_test_records(start(), &[dec!(80), dec!(79.8), dec!(79.6), dec!(79.4)]);
        assert!(run(&records, start()).is_empty());
    }

    #[test]
    fn test_persona_and_rebound_warning() {
        let records = create_test_records(
            start(),
            &[dec!(80), dec!(80), dec!(80.1), dec!(79), dec!(78)],
        );
        let insights = run(&records, add_days(start(), 4));

        assert!(matches!(insights[0], Insight::Persona { .. }));
        assert!(has(&insights, |i| matches!(
            i,
            Insight::ReboundWarning { drop_kg } if *drop_kg == dec!(2.1)
        )));
        assert!(has(&insights, |i| matches!(
            i,
            Insight::ShortTrend(reading) if reading.change_kg == dec!(-2.1)
        )));
    }

    #[test]
    fn test_steady_persona() {
        let records = create_test_records(
            start(),
            &[dec!(80), dec!(80), dec!(80.1), dec!(80), dec!(80)],
        );
        let insights = run(&records, add_days(start(), 4));
        assert_eq!(
            insights[0],
            Insight::Persona {
                persona: Persona::SteadyTortoise
            }
        );
    }

    #[test]
    fn test_water_masking() {
        let records = vec![
            WeightRecord::new(start(), dec!(80), Some(dec!(25))).unwrap(),
            WeightRecord::new(add_days(start(), 1), dec!(80), Some(dec!(25))).unwrap(),
            WeightRecord::new(add_days(start(), 2), dec!(80), Some(dec!(25))).unwrap(),
            WeightRecord::new(add_days(start(), 3), dec!(80), Some(dec!(25))).unwrap(),
            WeightRecord::new(add_days(start(), 4), dec!(80.2), Some(dec!(24.5))).unwrap(),
        ];
        let insights = run(&records, add_days(start(), 4));
        assert!(has(&insights, |i| matches!(i, Insight::WaterMasking { .. })));
    }

    #[test]
    fn test_stop_loss() {
        let records = create_test_records(
            start(),
            &[dec!(80), dec!(79), dec!(79.5), dec!(80), dec!(80.6)],
        );
        let insights = run(&records, add_days(start(), 4));
        assert!(has(&insights, |i| matches!(
            i,
            Insight::StopLoss { gain_streak: 3, gained_kg } if *gained_kg == dec!(1.6)
        )));
    }

    #[test]
    fn test_plateau_family_insights() {
        let mut weights = vec![dec!(80); 12];
        weights.push(dec!(80.1));
        let records = create_test_records(start(), &weights);
        let insights = run(&records, add_days(start(), 12));

        assert!(has(&insights, |i| matches!(i, Insight::LongestPlateau { entries: 12 })));
        assert!(has(&insights, |i| matches!(i, Insight::WhooshExpected { .. })));
        assert!(!has(&insights, |i| matches!(i, Insight::FalsePlateau)));
    }

    #[test]
    fn test_monthly_grade() {
        // 2024-03-04 .. 2024-03-08, today is the 8th
        let records = create_test_records(
            start(),
            &[dec!(82), dec!(81.5), dec!(81), dec!(80.5), dec!(79.8)],
        );
        let insights = run(&records, add_days(start(), 4));
        assert!(has(&insights, |i| matches!(
            i,
            Insight::MonthlyGrade { grade: MonthGrade::B, loss_kg, .. } if *loss_kg == dec!(2.2)
        )));
    }

    #[test]
    fn test_golden_cross() {
        let mut weights = vec![dec!(80); 30];
        weights.push(dec!(76));
        let records = create_test_records(start(), &weights);
        let insights = run(&records, add_days(start(), 30));
        assert!(has(&insights, |i| matches!(i, Insight::GoldenCross)));
        assert!(has(&insights, |i| matches!(
            i,
            Insight::BestPerformance { loss_kg, .. } if *loss_kg == dec!(4)
        )));
    }
}
