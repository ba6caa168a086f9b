//! Achievement badges
//!
//! Badges are never stored as earned. Each evaluation builds one
//! [`BadgeContext`] with the intermediate arrays the rules share (changes,
//! calendar gaps, plateau breaks, Friday/Monday pairs, spike recoveries) and
//! then runs every rule in the registry against it. Rules are independent, so
//! editing history can take a badge away again.

use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use crate::body::{bmi, BmiCategory};
use crate::dates::{add_days, days_between, sub_months};
use crate::numeric::{format_fixed, mean, min_max, round1};
use crate::patterns::{recovery_events, RecoveryEvent};
use crate::stats::{daily_diffs, AnalysisContext};

/// Stable badge identifiers, serialized in camelCase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BadgeId {
    Start,
    Holiday,
    Zombie,
    Sniper,
    Coaster,
    Zen,
    Loss3,
    Loss5,
    Loss10,
    Streak3,
    Streak7,
    Digit,
    Goal,
    Weekend,
    Plateau,
    Bmi,
    Yoyo,
    Ottogi,
    RecordGod,
    GoldenCross,
    FatDestroyer,
    PlateauMaster,
    RecordMaster,
    Reborn,
    SlowSteady,
    WeightExpert,
    PlateauDestroyer,
    IconOfConstancy,
    BigStep,
    Phoenix,
    WeekendRuler,
    Curiosity,
    TimeTraveler,
    Parking,
    Whoosh,
    FullMoon,
    Lucky7,
    IronWall,
    Seasonality,
    Decalcomania,
    Cleaning,
    GyroDrop,
    WeekendSniper,
    PiMiracle,
    Palindrome,
    Anniversary,
}

/// Static catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub id: BadgeId,
    pub name: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
}

type Predicate = fn(&BadgeContext) -> bool;

struct BadgeRule {
    badge: Badge,
    /// Rule only applies once there are at least two records
    needs_history: bool,
    predicate: Predicate,
}

/// Change below which a step counts toward a plateau
const STABLE_STEP: Decimal = dec!(0.2);

/// Month-day pairs checked by the holiday badge
const HOLIDAYS: [(u32, u32); 4] = [(12, 25), (1, 1), (1, 29), (10, 6)];

macro_rules! rule {
    ($id:ident, $name:expr, $icon:expr, $desc:expr, $history:expr, $pred:expr) => {
        BadgeRule {
            badge: Badge {
                id: BadgeId::$id,
                name: $name,
                icon: $icon,
                description: $desc,
            },
            needs_history: $history,
            predicate: $pred,
        }
    };
}

static REGISTRY: [BadgeRule; 46] = [
    rule!(Start, "Half Way There", "🐣", "Logged the first weigh-in.", false, |c| c.n >= 1),
    rule!(Holiday, "Holiday Survivor", "🎅", "Kept holiday gain under 0.5kg.", true, holiday),
    rule!(Zombie, "Prodigal Return", "🧟", "Came back after a gap of 15 days or more.", true, |c| {
        c.gaps.iter().any(|g| *g >= 15)
    }),
    rule!(Sniper, "Sniper", "🎯", "Hit the goal weight exactly.", true, |c| {
        (c.current - c.ctx.settings.goal_weight).abs() < dec!(0.01)
    }),
    rule!(Coaster, "Roller Coaster", "🎢", "Changed 1.5kg or more in a single day.", true, |c| {
        c.one_day_steps().any(|d| d.abs() >= dec!(1.5))
    }),
    rule!(Zen, "Equanimity", "🧘", "Seven entries in a row within 0.1kg of each other.", true, |c| {
        c.diffs.windows(6).any(|w| w.iter().all(|d| d.abs() <= dec!(0.1)))
    }),
    rule!(Loss3, "3kg Down", "🥉", "Lost 3kg in total.", false, |c| c.total_lost >= dec!(3)),
    rule!(Loss5, "5kg Down", "🥈", "Lost 5kg in total.", false, |c| c.total_lost >= dec!(5)),
    rule!(Loss10, "10kg Down", "🥇", "Lost 10kg in total.", false, |c| c.total_lost >= dec!(10)),
    rule!(Streak3, "Past Day Three", "🔥", "Three entries in a row without gaining.", false, |c| {
        c.ctx.snapshot.max_streak_days >= 3
    }),
    rule!(Streak7, "Full Week", "⚡", "Seven entries in a row without gaining.", false, |c| {
        c.ctx.snapshot.max_streak_days >= 7
    }),
    rule!(Digit, "New Decade", "✨", "The tens digit of your weight dropped.", false, |c| {
        (c.current / dec!(10)).floor() < (c.ctx.settings.start_weight / dec!(10)).floor()
    }),
    rule!(Goal, "Goal Reached", "👑", "Reached the goal weight.", false, |c| {
        c.current <= c.ctx.settings.goal_weight
    }),
    rule!(Weekend, "Weekend Defense", "🛡️", "No gain from Saturday to Monday.", true, weekend_defense),
    rule!(Plateau, "Plateau Breaker", "🧗", "Broke a plateau of seven entries with a loss.", true, |c| {
        c.plateau_breaks.iter().any(|(run, diff)| *run >= 7 && *diff < Decimal::ZERO)
    }),
    rule!(Bmi, "BMI Breakthrough", "🩸", "Moved into a different BMI band.", true, bmi_breakthrough),
    rule!(Yoyo, "Yo-yo Blocker", "🧘", "Held within 0.5kg of goal for ten entries.", true, yoyo_blocker),
    rule!(Ottogi, "Bounce Back", "💪", "Undid a spike within three entries.", true, |c| {
        c.spikes
            .iter()
            .any(|e| e.index + 2 < c.n && c.weights[e.index + 2] <= e.baseline)
    }),
    rule!(RecordGod, "Record Deity", "📝", "Logged 365 entries.", false, |c| c.n >= 365),
    rule!(GoldenCross, "Golden Cross", "📉", "Seven-entry average fell 0.5kg below the 30-entry average.", true, golden_cross),
    rule!(FatDestroyer, "Fat Destroyer", "🥓", "Body fat under 25%.", true, |c| {
        c.ctx.records[c.n - 1].fat.map_or(false, |f| f < dec!(25))
    }),
    rule!(PlateauMaster, "Plateau Master", "🧱", "Broke a plateau of seven entries with a 0.5kg drop.", true, |c| {
        c.plateau_breaks.iter().any(|(run, diff)| *run >= 7 && *diff <= dec!(-0.5))
    }),
    rule!(RecordMaster, "Record Master", "📅", "Ninety entries in a row without gaining.", true, |c| {
        c.ctx.snapshot.max_streak_days >= 90
    }),
    rule!(Reborn, "Reborn", "🦋", "Ten kg below your heaviest.", true, |c| c.max - c.current >= dec!(10)),
    rule!(SlowSteady, "Slow and Steady", "🐢", "Three months at 2kg a month or less.", true, slow_and_steady),
    rule!(WeightExpert, "Weight Expert", "🎓", "Lost 4kg within a month.", true, weight_expert),
    rule!(PlateauDestroyer, "Plateau Destroyer", "🔨", "Broke a plateau of two weeks with a loss.", true, |c| {
        c.ctx.snapshot.max_plateau_days >= 14
            && c.plateau_breaks.iter().any(|(run, diff)| *run >= 14 && *diff < Decimal::ZERO)
    }),
    rule!(IconOfConstancy, "Icon of Constancy", "🗿", "180 entries in a row without gaining.", true, |c| {
        c.ctx.snapshot.max_streak_days >= 180
    }),
    rule!(BigStep, "Big Step", "👣", "Gained 1kg or more in a single day.", true, |c| {
        c.one_day_steps().any(|d| d >= dec!(1.0))
    }),
    rule!(Phoenix, "Phoenix", "🐦", "Rebounded, then set a new low.", true, phoenix),
    rule!(WeekendRuler, "Weekend Ruler", "🧛", "Monday at or below the previous Friday.", true, |c| {
        c.monday_vs_friday.iter().any(|d| *d <= Decimal::ZERO)
    }),
    rule!(Curiosity, "Curiosity", "🕵️", "Ten body-fat readings in a row after ten without.", true, curiosity),
    rule!(TimeTraveler, "Time Traveler", "🚀", "Recent pace brings the goal 10 days closer.", true, time_traveler),
    rule!(Parking, "Parking Pro", "🅿️", "Fourteen entries within a 0.6kg band.", true, |c| {
        c.n >= 14
            && min_max(&c.weights[c.n - 14..]).map_or(false, |(lo, hi)| hi - lo <= dec!(0.6))
    }),
    rule!(Whoosh, "Whoosh", "📉", "Dropped 0.8kg right after a plateau.", true, |c| {
        c.plateau_breaks.iter().any(|(run, diff)| *run >= 3 && *diff <= dec!(-0.8))
    }),
    rule!(FullMoon, "Full Moon", "🌕", "Thirty days in a row without missing one.", true, |c| {
        crate::stats::longest_run(&c.gaps, |g| *g == 1) >= 30
    }),
    rule!(Lucky7, "Lucky Seven", "🎰", "Current weight ends in .7", true, |c| {
        format_fixed(c.current, 1).ends_with(".7")
    }),
    rule!(IronWall, "Iron Wall", "🧱", "Turned back down just below your heaviest.", true, iron_wall),
    rule!(Seasonality, "Season Player", "🗓️", "Entries in March, June, September and December.", true, |c| {
        let months: BTreeSet<u32> = c.ctx.records.iter().map(|r| r.date.month()).collect();
        [3, 6, 9, 12].iter().all(|m| months.contains(m))
    }),
    rule!(Decalcomania, "Decalcomania", "🪞", "Identical weight two days running.", true, |c| {
        c.one_day_steps().any(|d| d.is_zero())
    }),
    rule!(Cleaning, "Deep Clean", "🧹", "Lost more fat than total weight.", true, |c| {
        c.ctx
            .snapshot
            .fat_change_kg
            .map_or(false, |f| f < Decimal::ZERO && f < -c.total_lost)
    }),
    rule!(GyroDrop, "Drop Tower", "📉", "Lost 1kg or more in a single day.", true, |c| {
        c.one_day_steps().any(|d| d <= dec!(-1.0))
    }),
    rule!(WeekendSniper, "Weekend Sniper", "🗓️", "Monday lighter than the previous Friday.", true, |c| {
        c.monday_vs_friday.iter().any(|d| *d < Decimal::ZERO)
    }),
    rule!(PiMiracle, "Pi Miracle", "🔢", "Lost 3.14kg, or weigh something ending in .14", true, |c| {
        (c.total_lost - dec!(3.14)).abs() < dec!(0.05) || format_fixed(c.current, 2).ends_with(".14")
    }),
    rule!(Palindrome, "Palindrome", "🪞", "Current weight reads the same backwards.", true, |c| {
        let digits: Vec<char> = format_fixed(c.current, 1).chars().filter(|ch| *ch != '.').collect();
        digits.iter().eq(digits.iter().rev())
    }),
    rule!(Anniversary, "Anniversary", "🎉", "Day 100, 365 or 1000 of your journey.", true, |c| {
        matches!(c.ctx.span_days() + 1, 100 | 365 | 1000)
    }),
];

/// Shared, precomputed view over the history for badge rules
pub struct BadgeContext<'a> {
    pub ctx: &'a AnalysisContext<'a>,
    pub n: usize,
    pub weights: Vec<Decimal>,
    pub current: Decimal,
    pub max: Decimal,
    /// Start weight minus current, rounded to 0.1kg
    pub total_lost: Decimal,
    /// `diffs[i]` is record i+1 minus record i
    pub diffs: Vec<Decimal>,
    /// `gaps[i]` is the calendar gap between record i and i+1
    pub gaps: Vec<i64>,
    /// Each non-stable step with the length of the stable run before it
    pub plateau_breaks: Vec<(usize, Decimal)>,
    /// Monday minus the Friday three days earlier, where both exist
    pub monday_vs_friday: Vec<Decimal>,
    pub spikes: Vec<RecoveryEvent>,
}

impl<'a> BadgeContext<'a> {
    /// `None` for an empty history
    pub fn new(ctx: &'a AnalysisContext<'a>) -> Option<Self> {
        let records = ctx.records;
        let current = records.last()?.weight;
        let weights: Vec<Decimal> = records.iter().map(|r| r.weight).collect();
        let n = weights.len();

        let diffs = if ctx.snapshot.daily_diffs.len() + 1 == n {
            ctx.snapshot.daily_diffs.clone()
        } else {
            daily_diffs(records)
        };
        let gaps: Vec<i64> = records
            .windows(2)
            .map(|pair| days_between(pair[0].date, pair[1].date))
            .collect();

        let mut plateau_breaks = Vec::new();
        let mut stable = 0;
        for diff in &diffs {
            if diff.abs() < STABLE_STEP {
                stable += 1;
            } else {
                plateau_breaks.push((stable, *diff));
                stable = 0;
            }
        }

        let by_date: HashMap<NaiveDate, Decimal> =
            records.iter().map(|r| (r.date, r.weight)).collect();
        let monday_vs_friday = records
            .iter()
            .filter(|r| r.date.weekday() == Weekday::Mon)
            .filter_map(|r| by_date.get(&add_days(r.date, -3)).map(|fri| r.weight - fri))
            .collect();

        Some(Self {
            ctx,
            n,
            max: ctx.snapshot.max.unwrap_or(current).max(current),
            current,
            total_lost: round1(ctx.settings.start_weight - current),
            weights,
            diffs,
            gaps,
            plateau_breaks,
            monday_vs_friday,
            spikes: recovery_events(records, dec!(0.5)),
        })
    }

    /// Changes between records exactly one calendar day apart
    pub fn one_day_steps(&self) -> impl Iterator<Item = Decimal> + '_ {
        self.diffs
            .iter()
            .zip(&self.gaps)
            .filter(|(_, gap)| **gap == 1)
            .map(|(diff, _)| *diff)
    }
}

fn holiday(c: &BadgeContext) -> bool {
    let year = c.ctx.today.year();
    HOLIDAYS.iter().any(|(month, day)| {
        let Some(holiday) = NaiveDate::from_ymd_opt(year, *month, *day) else {
            return false;
        };
        let around: Vec<Decimal> = c
            .ctx
            .records
            .iter()
            .filter(|r| days_between(r.date, holiday).abs() <= 3)
            .map(|r| r.weight)
            .collect();
        around.len() >= 2 && around[around.len() - 1] - around[0] < dec!(0.5)
    })
}

fn weekend_defense(c: &BadgeContext) -> bool {
    c.ctx.records.windows(2).any(|pair| {
        pair[0].date.weekday() == Weekday::Sat
            && pair[1].date.weekday() == Weekday::Mon
            && pair[1].weight <= pair[0].weight
    })
}

fn bmi_breakthrough(c: &BadgeContext) -> bool {
    let height = c.ctx.settings.height_cm;
    match (bmi(c.ctx.settings.start_weight, height), bmi(c.current, height)) {
        (Some(start), Some(now)) => BmiCategory::from_bmi(start) != BmiCategory::from_bmi(now),
        _ => false,
    }
}

fn yoyo_blocker(c: &BadgeContext) -> bool {
    let goal = c.ctx.settings.goal_weight;
    c.current <= goal
        && c.n >= 10
        && c.weights[c.n - 10..]
            .iter()
            .all(|w| (*w - goal).abs() <= dec!(0.5))
}

fn golden_cross(c: &BadgeContext) -> bool {
    if c.n <= 30 {
        return false;
    }
    match (mean(&c.weights[c.n - 7..]), mean(&c.weights[c.n - 30..])) {
        (Some(short), Some(long)) => short < long - dec!(0.5),
        _ => false,
    }
}

fn slow_and_steady(c: &BadgeContext) -> bool {
    if c.n < 90 {
        return false;
    }
    let since = sub_months(c.ctx.today, 3);
    let Some(first) = c.ctx.records.iter().find(|r| r.date >= since) else {
        return false;
    };
    let monthly = round1(first.weight - c.current) / dec!(3);
    monthly > Decimal::ZERO && monthly <= dec!(2)
}

fn weight_expert(c: &BadgeContext) -> bool {
    if c.n < 30 {
        return false;
    }
    let since = sub_months(c.ctx.today, 1);
    c.ctx
        .records
        .iter()
        .find(|r| r.date >= since)
        .map_or(false, |r| r.weight - c.current >= dec!(4))
}

fn phoenix(c: &BadgeContext) -> bool {
    // The latest record is excluded from the running low it has to beat
    let mut low: Option<Decimal> = None;
    let mut rebound = false;
    for weight in &c.weights[..c.n - 1] {
        let current_low = low.map_or(*weight, |l| l.min(*weight));
        low = Some(current_low);
        if *weight > current_low + dec!(3) {
            rebound = true;
        }
    }
    rebound && low.map_or(false, |l| c.current < l)
}

fn curiosity(c: &BadgeContext) -> bool {
    let records = c.ctx.records;
    let mut without_fat = 0;
    for (i, record) in records.iter().enumerate() {
        if record.fat.is_none() {
            without_fat += 1;
            continue;
        }
        if without_fat >= 10 {
            let with_fat = records[i..]
                .iter()
                .take(10)
                .take_while(|r| r.fat.is_some())
                .count();
            if with_fat >= 10 {
                return true;
            }
        }
        without_fat = 0;
    }
    false
}

fn time_traveler(c: &BadgeContext) -> bool {
    let remaining = c.current - c.ctx.settings.goal_weight;
    if remaining <= Decimal::ZERO || c.n <= 30 {
        return false;
    }
    let records = c.ctx.records;
    let first = &records[0];
    let recent = &records[c.n - 15];
    let last = &records[c.n - 1];

    let total_days = days_between(first.date, last.date);
    let recent_days = days_between(recent.date, last.date);
    if total_days <= 0 || recent_days <= 0 {
        return false;
    }

    let total_speed = (first.weight - c.current) / Decimal::from(total_days);
    let recent_speed = (recent.weight - c.current) / Decimal::from(recent_days);
    if total_speed <= Decimal::ZERO || recent_speed <= Decimal::ZERO {
        return false;
    }

    remaining / total_speed - remaining / recent_speed >= dec!(10)
}

fn iron_wall(c: &BadgeContext) -> bool {
    if c.max - c.current < dec!(0.5) {
        return false;
    }
    (1..c.n - 1).any(|i| (c.weights[i] - c.max).abs() < dec!(0.5) && c.weights[i] > c.weights[i + 1])
}

/// Full catalog in display order
pub fn catalog() -> impl Iterator<Item = &'static Badge> {
    REGISTRY.iter().map(|rule| &rule.badge)
}

pub fn badge(id: BadgeId) -> Option<&'static Badge> {
    catalog().find(|b| b.id == id)
}

/// Evaluate every badge; an empty history unlocks nothing
pub fn evaluate(ctx: &AnalysisContext) -> BTreeMap<BadgeId, bool> {
    let badge_ctx = BadgeContext::new(ctx);

    let results: BTreeMap<BadgeId, bool> = REGISTRY
        .iter()
        .map(|rule| {
            let unlocked = match &badge_ctx {
                Some(c) if rule.needs_history && c.n < 2 => false,
                Some(c) => (rule.predicate)(c),
                None => false,
            };
            (rule.badge.id, unlocked)
        })
        .collect();

    debug!(
        unlocked = results.values().filter(|v| **v).count(),
        total = results.len(),
        "Evaluated badges"
    );
    results
}

/// Badges currently unlocked, in catalog order
pub fn unlocked(ctx: &AnalysisContext) -> Vec<&'static Badge> {
    let results = evaluate(ctx);
    catalog()
        .filter(|b| results.get(&b.id).copied().unwrap_or(false))
        .collect()
}
