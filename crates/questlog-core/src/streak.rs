//! Streak continuity rules.
//!
//! Pure date arithmetic: given when a habit was last completed and what day
//! it is now, decide whether a new completion continues, starts, or breaks
//! the streak. The controller layers streak-protection spending on top.

use chrono::{Days, NaiveDate};

/// How a new completion relates to the habit's existing streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuity {
    /// Never completed before; streak starts at 1.
    Start,
    /// Last completed yesterday; streak continues.
    Continued,
    /// Already completed today. Still increments the streak — preserved
    /// behavior, see the open-question note in DESIGN.md.
    SameDay,
    /// Last completed before yesterday; streak breaks unless a protection
    /// charge is spent.
    Broken,
}

/// Classify a completion happening on `today` against the habit's
/// `last_completed_on`.
#[must_use]
pub fn continuity(last_completed_on: Option<NaiveDate>, today: NaiveDate) -> Continuity {
    let Some(last) = last_completed_on else {
        return Continuity::Start;
    };
    if last == today {
        return Continuity::SameDay;
    }
    match today.checked_sub_days(Days::new(1)) {
        Some(yesterday) if last == yesterday => Continuity::Continued,
        _ => Continuity::Broken,
    }
}

/// The streak value after a completion with the given continuity.
///
/// `protected` only matters for [`Continuity::Broken`]: a spent protection
/// charge preserves continuity, otherwise the streak resets to 1.
#[must_use]
pub fn next_streak(current: u32, continuity: Continuity, protected: bool) -> u32 {
    match continuity {
        Continuity::Start => 1,
        Continuity::Continued | Continuity::SameDay => current + 1,
        Continuity::Broken => {
            if protected {
                current + 1
            } else {
                1
            }
        }
    }
}
