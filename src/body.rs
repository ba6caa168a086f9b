//! BMI, progress toward goal, body composition and weight classes

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::models::{Settings, WeightRecord};
use crate::numeric::{clamp, percent, round1, round2};

/// BMI bands used by the Korean Society for the Study of Obesity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BmiCategory {
    Underweight,
    Normal,
    PreObese,
    ObeseClass1,
    ObeseClass2,
    ObeseClass3,
}

pub const BMI_UNDERWEIGHT: Decimal = dec!(18.5);
pub const BMI_NORMAL_END: Decimal = dec!(23);
pub const BMI_PRE_OBESE_END: Decimal = dec!(25);
pub const BMI_OBESE_1_END: Decimal = dec!(30);
pub const BMI_OBESE_2_END: Decimal = dec!(35);

impl BmiCategory {
    pub fn from_bmi(bmi: Decimal) -> Self {
        if bmi < BMI_UNDERWEIGHT {
            BmiCategory::Underweight
        } else if bmi < BMI_NORMAL_END {
            BmiCategory::Normal
        } else if bmi < BMI_PRE_OBESE_END {
            BmiCategory::PreObese
        } else if bmi < BMI_OBESE_1_END {
            BmiCategory::ObeseClass1
        } else if bmi < BMI_OBESE_2_END {
            BmiCategory::ObeseClass2
        } else {
            BmiCategory::ObeseClass3
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BmiCategory::Underweight => "Underweight",
            BmiCategory::Normal => "Normal",
            BmiCategory::PreObese => "Pre-obese",
            BmiCategory::ObeseClass1 => "Obese I",
            BmiCategory::ObeseClass2 => "Obese II",
            BmiCategory::ObeseClass3 => "Obese III",
        }
    }
}

/// Body mass index, `None` when height is not positive
pub fn bmi(weight: Decimal, height_cm: Decimal) -> Option<Decimal> {
    if height_cm <= Decimal::ZERO {
        return None;
    }
    let h = height_cm / Decimal::ONE_HUNDRED;
    Some(weight / (h * h))
}

/// BMI relative to the upper bound of the normal band
pub fn bmi_prime(bmi: Decimal) -> Decimal {
    round2(bmi / BMI_NORMAL_END)
}

/// Weights at the BMI band edges for a given height
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BmiBands {
    pub underweight_below: Decimal,
    pub normal_below: Decimal,
    pub pre_obese_below: Decimal,
}

pub fn bmi_bands(height_cm: Decimal) -> BmiBands {
    let h = height_cm / Decimal::ONE_HUNDRED;
    let h2 = h * h;
    BmiBands {
        underweight_below: round1(BMI_UNDERWEIGHT * h2),
        normal_below: round1(BMI_NORMAL_END * h2),
        pre_obese_below: round1(BMI_PRE_OBESE_END * h2),
    }
}

/// Progress from the start weight toward the goal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub current: Decimal,
    /// Start minus current; negative when heavier than at the start
    pub total_lost: Decimal,
    /// Share of the planned loss achieved, unclamped
    pub percent_of_goal: Decimal,
    /// `percent_of_goal` clamped to 0..=100 for progress bars
    pub percent_of_goal_display: Decimal,
    /// Kilograms still to lose, never negative
    pub remaining_kg: Decimal,
    pub remaining_percent: Decimal,
    /// Total lost relative to the start weight
    pub percent_lost_from_start: Decimal,
    pub bmi: Option<Decimal>,
    pub bmi_category: Option<BmiCategory>,
}

pub fn progress_summary(records: &[WeightRecord], settings: &Settings) -> Option<ProgressSummary> {
    let current = records.last()?.weight;
    let total_lost = settings.start_weight - current;
    let planned = settings.start_weight - settings.goal_weight;
    let percent_of_goal = round1(percent(total_lost, planned));
    let display = clamp(percent_of_goal, Decimal::ZERO, Decimal::ONE_HUNDRED);
    let bmi = bmi(current, settings.height_cm);

    Some(ProgressSummary {
        current,
        total_lost: round1(total_lost),
        percent_of_goal,
        percent_of_goal_display: display,
        remaining_kg: (current - settings.goal_weight).max(Decimal::ZERO),
        remaining_percent: Decimal::ONE_HUNDRED - display,
        percent_lost_from_start: round1(percent(total_lost, settings.start_weight)),
        bmi: bmi.map(round1),
        bmi_category: bmi.map(BmiCategory::from_bmi),
    })
}

/// Lean mass indices for the latest record with body fat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeanMassIndices {
    pub lean_mass_kg: Decimal,
    pub fat_mass_kg: Decimal,
    /// Lean mass over height squared
    pub lbmi: Decimal,
    /// Fat-free mass index normalised to 1.8m
    pub ffmi: Decimal,
}

pub fn lean_mass_indices(records: &[WeightRecord], height_cm: Decimal) -> Option<LeanMassIndices> {
    let latest = records.iter().rev().find(|r| r.fat.is_some())?;
    if height_cm <= Decimal::ZERO {
        return None;
    }
    let h = height_cm / Decimal::ONE_HUNDRED;
    let lean = latest.lean_mass()?;
    let lbmi = lean / (h * h);

    Some(LeanMassIndices {
        lean_mass_kg: round1(lean),
        fat_mass_kg: round1(latest.fat_mass()?),
        lbmi: round1(lbmi),
        ffmi: round1(lbmi + dec!(6.1) * (dec!(1.8) - h)),
    })
}

/// Split of weight lost into fat and lean mass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionChange {
    pub fat_loss_kg: Decimal,
    pub lean_loss_kg: Decimal,
    pub total_loss_kg: Decimal,
    /// Fat share of the total loss in percent
    pub fat_loss_ratio: Option<Decimal>,
    /// Current lean mass per kg of fat mass
    pub lean_fat_balance: Option<Decimal>,
    /// Lean loss is over 40% of a total loss above 2kg
    pub muscle_loss_warning: bool,
}

/// Compare the first record with body fat against the latest record
///
/// `None` unless the latest record carries body fat and an earlier one does too.
pub fn composition_change(records: &[WeightRecord]) -> Option<CompositionChange> {
    let last = records.last().filter(|r| r.fat.is_some())?;
    let first = records.iter().find(|r| r.fat.is_some())?;
    if first.date == last.date {
        return None;
    }

    let fat_loss = first.fat_mass()? - last.fat_mass()?;
    let lean_loss = first.lean_mass()? - last.lean_mass()?;
    let total = fat_loss + lean_loss;
    let ratio = (total > Decimal::ZERO).then(|| round1(percent(fat_loss, total)));
    let balance = last
        .fat_mass()
        .filter(|fat| !fat.is_zero())
        .zip(last.lean_mass())
        .map(|(fat, lean)| round2(lean / fat));
    let warning = lean_loss > Decimal::ZERO
        && total > dec!(2)
        && lean_loss / total > dec!(0.4);

    Some(CompositionChange {
        fat_loss_kg: round1(fat_loss),
        lean_loss_kg: round1(lean_loss),
        total_loss_kg: round1(total),
        fat_loss_ratio: ratio,
        lean_fat_balance: balance,
        muscle_loss_warning: warning,
    })
}

/// Professional boxing weight classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightClass {
    Heavyweight,
    Cruiserweight,
    LightHeavyweight,
    SuperMiddleweight,
    Middleweight,
    SuperWelterweight,
    Welterweight,
    SuperLightweight,
    Lightweight,
    SuperFeatherweight,
    Featherweight,
    SuperBantamweight,
    Bantamweight,
    SuperFlyweight,
    Flyweight,
    LightFlyweight,
    Minimumweight,
}

/// Lower bound of each class in kg, heaviest first
const WEIGHT_CLASSES: [(WeightClass, Decimal); 17] = [
    (WeightClass::Heavyweight, dec!(90.7)),
    (WeightClass::Cruiserweight, dec!(79.4)),
    (WeightClass::LightHeavyweight, dec!(76.2)),
    (WeightClass::SuperMiddleweight, dec!(72.6)),
    (WeightClass::Middleweight, dec!(69.9)),
    (WeightClass::SuperWelterweight, dec!(66.7)),
    (WeightClass::Welterweight, dec!(63.5)),
    (WeightClass::SuperLightweight, dec!(61.2)),
    (WeightClass::Lightweight, dec!(59.0)),
    (WeightClass::SuperFeatherweight, dec!(57.2)),
    (WeightClass::Featherweight, dec!(55.3)),
    (WeightClass::SuperBantamweight, dec!(53.5)),
    (WeightClass::Bantamweight, dec!(52.2)),
    (WeightClass::SuperFlyweight, dec!(50.8)),
    (WeightClass::Flyweight, dec!(49.0)),
    (WeightClass::LightFlyweight, dec!(47.6)),
    (WeightClass::Minimumweight, dec!(0)),
];

impl WeightClass {
    /// Heaviest class whose lower bound the weight reaches
    pub fn from_weight(weight: Decimal) -> Self {
        WEIGHT_CLASSES
            .iter()
            .find(|(_, min)| weight >= *min)
            .map(|(class, _)| *class)
            .unwrap_or(WeightClass::Minimumweight)
    }

    pub fn lower_bound_kg(&self) -> Decimal {
        WEIGHT_CLASSES
            .iter()
            .find(|(class, _)| class == self)
            .map(|(_, min)| *min)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rec(day: u32, weight: Decimal, fat: Option<Decimal>) -> WeightRecord {
        WeightRecord::new(NaiveDate::from_ymd_opt(2024, 1, day).unwrap(), weight, fat).unwrap()
    }

    #[test]
    fn test_bmi_categories() {
        let value = bmi(dec!(78.5), dec!(179)).unwrap();
        assert_eq!(round1(value), dec!(24.5));
        assert_eq!(BmiCategory::from_bmi(value), BmiCategory::PreObese);
        assert_eq!(BmiCategory::from_bmi(dec!(23)), BmiCategory::PreObese);
        assert_eq!(BmiCategory::from_bmi(dec!(22.9)), BmiCategory::Normal);
        assert_eq!(BmiCategory::from_bmi(dec!(35)), BmiCategory::ObeseClass3);
        assert!(bmi(dec!(70), dec!(0)).is_none());
        assert_eq!(bmi_prime(dec!(23)), dec!(1));
    }

    #[test]
    fn test_bmi_bands() {
        let bands = bmi_bands(dec!(200));
        assert_eq!(bands.underweight_below, dec!(74));
        assert_eq!(bands.normal_below, dec!(92));
        assert_eq!(bands.pre_obese_below, dec!(100));
    }

    #[test]
    fn test_progress_summary() {
        let settings = Settings::default();
        let records = vec![rec(1, dec!(74.25), None)];
        let progress = progress_summary(&records, &settings).unwrap();
        assert_eq!(progress.current, dec!(74.3));
        assert_eq!(progress.total_lost, dec!(4.2));
        assert_eq!(progress.percent_of_goal, dec!(49.4));
        assert_eq!(progress.remaining_kg, dec!(4.3));

        let beyond = vec![rec(1, dec!(68), None)];
        let progress = progress_summary(&beyond, &settings).unwrap();
        assert_eq!(progress.remaining_kg, Decimal::ZERO);
        assert_eq!(progress.percent_of_goal_display, dec!(100));
        assert_eq!(progress.remaining_percent, Decimal::ZERO);
    }

    #[test]
    fn test_composition_change_warning() {
        let records = vec![
            rec(1, dec!(90), Some(dec!(30))),
            rec(2, dec!(86), Some(dec!(30))),
        ];
        let change = composition_change(&records).unwrap();
        assert_eq!(change.fat_loss_kg, dec!(1.2));
        assert_eq!(change.lean_loss_kg, dec!(2.8));
        assert_eq!(change.fat_loss_ratio, Some(dec!(30)));
        assert_eq!(change.lean_fat_balance, Some(dec!(2.33)));
        assert!(change.muscle_loss_warning);

        assert!(composition_change(&records[..1]).is_none());
    }

    #[test]
    fn test_lean_mass_indices() {
        let records = vec![rec(1, dec!(80), Some(dec!(20))), rec(2, dec!(79), None)];
        let indices = lean_mass_indices(&records, dec!(200)).unwrap();
        assert_eq!(indices.lean_mass_kg, dec!(64));
        assert_eq!(indices.lbmi, dec!(16));
        assert_eq!(indices.ffmi, dec!(14.8));
    }

    #[test]
    fn test_weight_class() {
        assert_eq!(WeightClass::from_weight(dec!(95)), WeightClass::Heavyweight);
        assert_eq!(WeightClass::from_weight(dec!(79.4)), WeightClass::Cruiserweight);
        assert_eq!(WeightClass::from_weight(dec!(79.3)), WeightClass::LightHeavyweight);
        assert_eq!(WeightClass::from_weight(dec!(70)), WeightClass::Middleweight);
        assert_eq!(WeightClass::Middleweight.lower_bound_kg(), dec!(69.9));
    }
}
