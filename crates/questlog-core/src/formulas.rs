//! Formula engine: pure progression math.
//!
//! Everything in here is deterministic and side-effect free. Intermediate
//! math runs in `f64`; flooring happens exactly once, at the point a reward
//! is applied ([`completion_reward`]), never inside the building blocks.

// XP math uses f64 intermediates; floored results fit comfortably in u64.
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use crate::models::Rank;

/// Base XP for any completion before streak bonuses kick in.
const BASE_XP: f64 = 10.0;

/// Streak multiplier contribution is capped at +200% (3x total).
const STREAK_FRACTION_CAP: f64 = 2.0;

/// Flat XP boost per rank step.
const RANK_STEP_BOOST: f64 = 0.03;

/// Streak values that pay a one-time milestone bonus. Keyed on the exact
/// value, not a range: breaking a streak and re-reaching the same number
/// re-triggers the bonus.
const MILESTONES: [u32; 8] = [5, 10, 25, 50, 100, 150, 200, 365];

/// Rank thresholds, highest first. A level maps to the highest rank whose
/// threshold it meets.
const RANK_THRESHOLDS: [(u32, Rank); 8] = [
    (100, Rank::SSS),
    (85, Rank::SS),
    (70, Rank::S),
    (50, Rank::A),
    (35, Rank::B),
    (20, Rank::C),
    (10, Rank::D),
    (1, Rank::E),
];

/// XP needed to advance past `level`.
///
/// Base 150, scaled by `1 + level * 0.1`, with a 1.2x multiplier above level
/// 25 and 1.5x above level 50. Strictly increasing in `level`, including
/// across both breakpoints.
#[must_use]
pub fn xp_required_for_next_level(level: u32) -> u64 {
    let scaled = 150.0 * (1.0 + f64::from(level) * 0.1);
    let scaled = if level > 50 {
        scaled * 1.5
    } else if level > 25 {
        scaled * 1.2
    } else {
        scaled
    };
    scaled.floor() as u64
}

/// Rank for a given level. Monotonic non-decreasing.
#[must_use]
pub fn rank_for_level(level: u32) -> Rank {
    RANK_THRESHOLDS
        .iter()
        .find(|&&(threshold, _)| level >= threshold)
        .map_or(Rank::E, |&(_, rank)| rank)
}

/// Base completion XP for day `streak` of a streak, before multipliers.
///
/// 10 plus a tiered per-day bonus: +1 for days 1-5, +2 for days 6-10, +3 for
/// days 11-20, +4 for days 21-50, +5 beyond. Strictly increasing and
/// piecewise linear, so sustained streaks outpace sporadic completion.
#[must_use]
pub fn base_completion_xp(streak: u32) -> f64 {
    let bonus: u32 = (1..=streak)
        .map(|day| match day {
            1..=5 => 1,
            6..=10 => 2,
            11..=20 => 3,
            21..=50 => 4,
            _ => 5,
        })
        .sum();
    BASE_XP + f64::from(bonus)
}

/// Difficulty-independent XP multiplier for day `streak` at `rank`.
///
/// `(1 + streak fraction) * (1 + 0.03 * rank step)`. The streak fraction
/// grows 5%/day for days 1-5, 7%/day for days 6-10, 10%/day beyond, capped
/// at 200%. The rank boost runs 0% at E through 21% at SSS.
#[must_use]
pub fn xp_multiplier(streak: u32, rank: Rank) -> f64 {
    let fraction: f64 = (1..=streak)
        .map(|day| match day {
            1..=5 => 0.05,
            6..=10 => 0.07,
            _ => 0.10,
        })
        .sum();
    let fraction = fraction.min(STREAK_FRACTION_CAP);
    (1.0 + fraction) * (1.0 + RANK_STEP_BOOST * f64::from(rank.index()))
}

/// One-time bonus paid when a streak lands exactly on a milestone value.
#[must_use]
pub fn milestone_bonus(streak: u32) -> u64 {
    if MILESTONES.contains(&streak) {
        u64::from(streak) * 2
    } else {
        0
    }
}

/// Total XP awarded for completing day `streak` of a streak at `rank`.
///
/// This is the single flooring point: the base/multiplier product is floored
/// here, then the (already integral) milestone bonus is added.
#[must_use]
pub fn completion_reward(streak: u32, rank: Rank) -> u64 {
    let scaled = base_completion_xp(streak) * xp_multiplier(streak, rank);
    scaled.floor() as u64 + milestone_bonus(streak)
}
