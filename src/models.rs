use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::numeric::round1;

/// Lightest accepted weight in kg
pub const MIN_WEIGHT: Decimal = dec!(30);
/// Heaviest accepted weight in kg
pub const MAX_WEIGHT: Decimal = dec!(300);
/// Lowest accepted body fat percentage
pub const MIN_FAT: Decimal = dec!(1);
/// Highest accepted body fat percentage
pub const MAX_FAT: Decimal = dec!(70);

/// Intake assumed by metabolic estimates when none is configured
pub const FALLBACK_INTAKE_KCAL: Decimal = dec!(2000);

/// A single day's weigh-in
///
/// Identity is the date: a store holds at most one record per day. Weight and
/// body fat are normalised to one decimal place on construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightRecord {
    /// Calendar date of the measurement
    pub date: NaiveDate,

    /// Body weight in kg
    #[serde(with = "rust_decimal::serde::float")]
    pub weight: Decimal,

    /// Body fat percentage, when measured
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub fat: Option<Decimal>,
}

impl WeightRecord {
    /// Build a validated record
    ///
    /// A body fat of exactly zero is read as "not measured".
    pub fn new(
        date: NaiveDate,
        weight: Decimal,
        fat: Option<Decimal>,
    ) -> Result<Self, ValidationError> {
        let weight = round1(weight);
        if weight < MIN_WEIGHT || weight > MAX_WEIGHT {
            return Err(ValidationError::WeightOutOfRange {
                value: weight,
                min: MIN_WEIGHT,
                max: MAX_WEIGHT,
            });
        }

        let fat = match fat.map(round1) {
            Some(f) if f.is_zero() => None,
            Some(f) if f < MIN_FAT || f > MAX_FAT => {
                return Err(ValidationError::FatOutOfRange {
                    value: f,
                    min: MIN_FAT,
                    max: MAX_FAT,
                })
            }
            other => other,
        };

        Ok(Self { date, weight, fat })
    }

    /// Fat mass in kg, when body fat is known
    pub fn fat_mass(&self) -> Option<Decimal> {
        self.fat.map(|f| self.weight * f / Decimal::ONE_HUNDRED)
    }

    /// Lean body mass in kg, when body fat is known
    pub fn lean_mass(&self) -> Option<Decimal> {
        self.fat
            .map(|f| self.weight * (Decimal::ONE - f / Decimal::ONE_HUNDRED))
    }
}

/// User profile the analytics read from
///
/// Serialized in camelCase; older backups using `height`, `goal1` and
/// `intake` are accepted as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Height in centimetres
    #[serde(alias = "height", with = "rust_decimal::serde::float")]
    pub height_cm: Decimal,

    /// Weight at the start of the diet in kg
    #[serde(with = "rust_decimal::serde::float")]
    pub start_weight: Decimal,

    /// Target weight in kg
    #[serde(alias = "goal1", with = "rust_decimal::serde::float")]
    pub goal_weight: Decimal,

    /// Planned daily intake in kcal; zero means unknown
    #[serde(alias = "intake", with = "rust_decimal::serde::float")]
    pub daily_intake_kcal: Decimal,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            height_cm: dec!(179),
            start_weight: dec!(78.5),
            goal_weight: dec!(70),
            daily_intake_kcal: dec!(1862),
        }
    }
}

impl Settings {
    /// Check interactive settings input
    pub fn validate(&self) -> Result<(), ValidationError> {
        let checks = [
            ("height", self.height_cm, dec!(300)),
            ("startWeight", self.start_weight, dec!(500)),
            ("goalWeight", self.goal_weight, dec!(500)),
        ];
        for (field, value, max) in checks {
            if value <= Decimal::ZERO || value > max {
                return Err(ValidationError::InvalidSetting {
                    field: field.to_string(),
                    value: value.to_string(),
                });
            }
        }
        if self.daily_intake_kcal < Decimal::ZERO {
            return Err(ValidationError::InvalidSetting {
                field: "dailyIntake".to_string(),
                value: self.daily_intake_kcal.to_string(),
            });
        }
        Ok(())
    }

    /// Height in metres
    pub fn height_m(&self) -> Decimal {
        self.height_cm / Decimal::ONE_HUNDRED
    }

    /// Intake used by metabolic estimates
    pub fn effective_intake(&self) -> Decimal {
        if self.daily_intake_kcal.is_zero() {
            FALLBACK_INTAKE_KCAL
        } else {
            self.daily_intake_kcal
        }
    }
}
