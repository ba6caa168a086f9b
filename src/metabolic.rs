//! Energy-balance estimates derived from weight change
//!
//! All estimates assume 7700 kcal per kg of body weight and an intake taken
//! from [`Settings`]; they are rough guides, not measurements.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::body::bmi;
use crate::dates::days_between;
use crate::models::{Settings, WeightRecord};
use crate::numeric::{mean, percent, population_std_dev, round1, round2, round_dp};
use crate::patterns::RiskLevel;

/// Energy content of one kg of body weight
pub const KCAL_PER_KG: Decimal = dec!(7700);

/// Trailing records used for the energy estimate
pub const ENERGY_WINDOW: usize = 14;

/// Horizon used for the required-deficit plan
pub const DEFICIT_PLAN_DAYS: i64 = 90;

/// Daily expenditure inferred from recent weight change and planned intake
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyEstimate {
    pub intake_kcal: Decimal,
    /// Recent loss per day; positive is losing
    pub daily_loss_kg: Decimal,
    pub tdee_kcal: Decimal,
    pub deficit_kcal: Decimal,
    /// Deficit as a share of expenditure
    pub efficiency_percent: Decimal,
    /// Loss per day over the whole history
    pub long_term_daily_loss_kg: Option<Decimal>,
    /// Recent loss lags the long-term pace by more than 50g/day
    pub adaptation_suspected: bool,
}

fn daily_loss(window: &[WeightRecord]) -> Option<Decimal> {
    let first = window.first()?;
    let last = window.last()?;
    let days = days_between(first.date, last.date);
    (days > 0).then(|| round1(first.weight - last.weight) / Decimal::from(days))
}

/// Estimate expenditure from the last 14 records
///
/// Needs at least three records spanning more than one calendar day.
pub fn estimate_energy(records: &[WeightRecord], settings: &Settings) -> Option<EnergyEstimate> {
    let start = records.len().saturating_sub(ENERGY_WINDOW);
    let window = &records[start..];
    if window.len() <= 2 {
        return None;
    }

    let loss = daily_loss(window)?;
    let intake = settings.effective_intake();
    let deficit = loss * KCAL_PER_KG;
    let tdee = intake + deficit;
    let efficiency = if tdee.is_zero() {
        Decimal::ZERO
    } else {
        round1(percent(deficit, tdee))
    };

    let long_term = if start > 0 { daily_loss(records) } else { None };
    let adaptation_suspected = long_term.map_or(false, |expected| loss - expected < dec!(-0.05));

    Some(EnergyEstimate {
        intake_kcal: intake,
        daily_loss_kg: round_dp(loss, 3),
        tdee_kcal: round_dp(tdee, 0),
        deficit_kcal: round_dp(deficit, 0),
        efficiency_percent: efficiency,
        long_term_daily_loss_kg: long_term.map(|l| round_dp(l, 3)),
        adaptation_suspected,
    })
}

/// Rough metabolic age from BMI and body fat of the latest record
///
/// `None` when the latest record has no body fat. Never below 18.
pub fn metabolic_age(records: &[WeightRecord], settings: &Settings) -> Option<Decimal> {
    let last = records.last()?;
    let fat = last.fat?;
    let bmi = bmi(last.weight, settings.height_cm)?;
    let age = dec!(25) + (bmi - dec!(22)) * dec!(2) + (fat - dec!(20)) * dec!(0.5);
    Some(round_dp(age.max(dec!(18)), 0))
}

/// Deficit needed to reach the goal within the plan horizon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeficitPlan {
    pub remaining_kg: Decimal,
    pub daily_deficit_kcal: Decimal,
    pub weekly_loss_kg: Decimal,
}

pub fn required_deficit(current: Decimal, goal: Decimal) -> Option<DeficitPlan> {
    let remaining = round1(current - goal);
    if remaining <= Decimal::ZERO {
        return None;
    }
    let days = Decimal::from(DEFICIT_PLAN_DAYS);
    Some(DeficitPlan {
        remaining_kg: remaining,
        daily_deficit_kcal: round_dp(remaining * KCAL_PER_KG / days, 0),
        weekly_loss_kg: round2(remaining / (days / dec!(7))),
    })
}

/// Yo-yo risk score out of 100
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YoyoRisk {
    pub score: u32,
    pub level: RiskLevel,
}

impl YoyoRisk {
    fn from_score(score: u32) -> Self {
        let level = if score >= 70 {
            RiskLevel::High
        } else if score >= 40 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };
        Self { score, level }
    }
}

/// Indicators over the last seven records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyIndicators {
    /// Current minus the seven-record mean
    pub ma_disparity: Decimal,
    /// Same deviation rounded to 0.1kg, read as water retention
    pub water_index: Decimal,
    /// Last minus first of the seven records
    pub weekly_change: Decimal,
    /// Seven-record standard deviation times ten
    pub volatility_index: Decimal,
    pub yoyo_risk: YoyoRisk,
    /// Days needed to lose 1% of body weight at this week's pace
    pub one_percent_days: Option<Decimal>,
}

pub fn weekly_indicators(records: &[WeightRecord]) -> Option<WeeklyIndicators> {
    if records.len() < 7 {
        return None;
    }
    let last7 = &records[records.len() - 7..];
    let weights: Vec<Decimal> = last7.iter().map(|r| r.weight).collect();
    let current = weights[6];
    let avg7 = mean(&weights)?;
    let std7 = population_std_dev(&weights)?;

    let deviation = round1(current - avg7);
    let weekly_change = round1(weights[6] - weights[0]);

    let mut score = 0;
    if weekly_change < dec!(-1.5) {
        score += 40;
    } else if weekly_change < dec!(-1.0) {
        score += 20;
    }
    if std7 > dec!(0.5) {
        score += 30;
    }
    if deviation > dec!(1.0) {
        score += 30;
    }

    let daily_rate = (weekly_change / dec!(7)).abs();
    let one_percent_days =
        (!daily_rate.is_zero()).then(|| round1(current * dec!(0.01) / daily_rate));

    Some(WeeklyIndicators {
        ma_disparity: round2(current - avg7),
        water_index: deviation,
        weekly_change,
        volatility_index: round1(std7 * dec!(10)),
        yoyo_risk: YoyoRisk::from_score(score),
        one_percent_days,
    })
}

/// Calories implied by every gain in the history
pub fn surplus_kcal(records: &[WeightRecord]) -> Decimal {
    let gained: Decimal = records
        .windows(2)
        .map(|pair| pair[1].weight - pair[0].weight)
        .filter(|diff| *diff > Decimal::ZERO)
        .sum();
    round_dp(gained * KCAL_PER_KG, 0)
}

/// Direction of the last three records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShortTrend {
    SharpDrop,
    Falling,
    Stable,
    Rising,
    SharpRise,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortTrendReading {
    pub trend: ShortTrend,
    pub change_kg: Decimal,
    pub per_entry_kg: Decimal,
}

pub fn short_trend(records: &[WeightRecord]) -> Option<ShortTrendReading> {
    if records.len() < 3 {
        return None;
    }
    let change = round1(records[records.len() - 1].weight - records[records.len() - 3].weight);
    let trend = if change < dec!(-0.4) {
        ShortTrend::SharpDrop
    } else if change < Decimal::ZERO {
        ShortTrend::Falling
    } else if change > dec!(0.4) {
        ShortTrend::SharpRise
    } else if change > Decimal::ZERO {
        ShortTrend::Rising
    } else {
        ShortTrend::Stable
    };

    Some(ShortTrendReading {
        trend,
        change_kg: change,
        per_entry_kg: round2(change / dec!(2)),
    })
}

/// Overall pace of the diet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DietEfficiency {
    /// Day number of the latest record, counting the first as day 1
    pub day_number: i64,
    pub weekly_loss_kg: Decimal,
    /// Days spent per kg lost, when anything was lost
    pub days_per_kg: Option<Decimal>,
}

pub fn diet_efficiency(records: &[WeightRecord], settings: &Settings) -> Option<DietEfficiency> {
    let first = records.first()?;
    let last = records.last()?;
    let span = days_between(first.date, last.date);
    let total_days = Decimal::from(span.max(1));
    let total_lost = round1(settings.start_weight - last.weight);

    Some(DietEfficiency {
        day_number: span + 1,
        weekly_loss_kg: round2(total_lost / total_days * dec!(7)),
        days_per_kg: (total_lost > Decimal::ZERO).then(|| round1(total_days / total_lost)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::add_days;
    use chrono::NaiveDate;

    fn create_test_records(weights: &[Decimal]) -> Vec<WeightRecord> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        weights
            .iter()
            .enumerate()
            .map(|(i, w)| WeightRecord::new(add_days(start, i as i64), *w, None).unwrap())
            .collect()
    }

    #[test]
    fn test_energy_estimate() {
        let records = create_test_records(&[dec!(80), dec!(79.9), dec!(79.8)]);
        let settings = Settings {
            daily_intake_kcal: dec!(1800),
            ..Settings::default()
        };
        let estimate = estimate_energy(&records, &settings).unwrap();
        assert_eq!(estimate.daily_loss_kg, dec!(0.1));
        assert_eq!(estimate.tdee_kcal, dec!(2570));
        assert_eq!(estimate.deficit_kcal, dec!(770));
        assert_eq!(estimate.efficiency_percent, dec!(30.0));
        assert!(!estimate.adaptation_suspected);

        assert!(estimate_energy(&records[..2], &settings).is_none());
    }

    #[test]
    fn test_adaptation_against_long_term_pace() {
        // Fast start, then two flat weeks
        let mut weights: Vec<Decimal> = (0..10).map(|i| dec!(90) - Decimal::from(i) * dec!(0.5)).collect();
        weights.extend(std::iter::repeat(dec!(85.5)).take(14));
        let records = create_test_records(&weights);

        let estimate = estimate_energy(&records, &Settings::default()).unwrap();
        assert_eq!(estimate.daily_loss_kg, dec!(0));
        assert!(estimate.adaptation_suspected);
    }

    #[test]
    fn test_metabolic_age() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let settings = Settings {
            height_cm: dec!(200),
            ..Settings::default()
        };
        let records = vec![WeightRecord::new(start, dec!(96), Some(dec!(30))).unwrap()];
        // bmi 24 -> 25 + 4 + 5
        assert_eq!(metabolic_age(&records, &settings), Some(dec!(34)));

        let lean = vec![WeightRecord::new(start, dec!(60), Some(dec!(8))).unwrap()];
        assert_eq!(metabolic_age(&lean, &settings), Some(dec!(18)));

        let no_fat = create_test_records(&[dec!(80)]);
        assert_eq!(metabolic_age(&no_fat, &settings), None);
    }

    #[test]
    fn test_required_deficit() {
        let plan = required_deficit(dec!(79), dec!(70)).unwrap();
        assert_eq!(plan.daily_deficit_kcal, dec!(770));
        assert_eq!(plan.weekly_loss_kg, dec!(0.70));
        assert!(required_deficit(dec!(70), dec!(70)).is_none());
    }

    #[test]
    fn test_weekly_indicators_and_yoyo_risk() {
        let records = create_test_records(&[
            dec!(82),
            dec!(81.5),
            dec!(81),
            dec!(80.5),
            dec!(80),
            dec!(79.6),
            dec!(80.2),
        ]);
        let indicators = weekly_indicators(&records).unwrap();
        assert_eq!(indicators.weekly_change, dec!(-1.8));
        assert_eq!(indicators.yoyo_risk.score, 70);
        assert_eq!(indicators.yoyo_risk.level, RiskLevel::High);
        assert!(indicators.one_percent_days.is_some());

        assert!(weekly_indicators(&records[..6]).is_none());
    }

    #[test]
    fn test_surplus_and_short_trend() {
        let records = create_test_records(&[dec!(80), dec!(80.5), dec!(80.2), dec!(80.4)]);
        assert_eq!(surplus_kcal(&records), dec!(5390));

        let trend = short_trend(&records).unwrap();
        assert_eq!(trend.trend, ShortTrend::Falling);
        assert_eq!(trend.change_kg, dec!(-0.1));
    }

    #[test]
    fn test_diet_efficiency() {
        let records = create_test_records(&[dec!(78.5), dec!(78), dec!(77.1)]);
        let efficiency = diet_efficiency(&records, &Settings::default()).unwrap();
        assert_eq!(efficiency.day_number, 3);
        assert_eq!(efficiency.weekly_loss_kg, dec!(4.90));
        assert_eq!(efficiency.days_per_kg, Some(dec!(1.4)));
    }
}
