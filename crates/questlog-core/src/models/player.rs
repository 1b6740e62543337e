//! Player state model

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::formulas;

/// Coarse progression tier, purely derived from level.
///
/// Rank is never stored authoritatively or mutated on its own; it is always
/// recomputed from level, which makes rank/level desynchronization
/// impossible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rank {
    E,
    D,
    C,
    B,
    A,
    S,
    SS,
    SSS,
}

impl Rank {
    /// Zero-based rank step, E = 0 through SSS = 7. Feeds the flat 3%-per-step
    /// XP boost.
    #[must_use]
    pub const fn index(self) -> u32 {
        match self {
            Self::E => 0,
            Self::D => 1,
            Self::C => 2,
            Self::B => 3,
            Self::A => 4,
            Self::S => 5,
            Self::SS => 6,
            Self::SSS => 7,
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::E => "E",
            Self::D => "D",
            Self::C => "C",
            Self::B => "B",
            Self::A => "A",
            Self::S => "S",
            Self::SS => "SS",
            Self::SSS => "SSS",
        };
        write!(f, "{name}")
    }
}

/// Per-user progression state.
///
/// Invariant: `xp < xp_required_for_next_level(level)`. Any operation that
/// would violate it must immediately roll the excess into level-ups via
/// [`PlayerState::normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Current level, starts at 1
    pub level: u32,
    /// XP accumulated toward the next level
    pub xp: u64,
    /// Lifetime XP counter, never decreases
    pub total_xp_earned: u64,
    /// Longest streak ever reached on any habit, never decreases
    pub longest_streak: u32,
    /// Remaining streak-protection charges
    #[serde(default)]
    pub streak_protections: u32,
    /// Last mutation timestamp (Unix ms)
    pub last_updated: i64,
}

impl PlayerState {
    /// Fresh level-1 state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            level: 1,
            xp: 0,
            total_xp_earned: 0,
            longest_streak: 0,
            streak_protections: 0,
            last_updated: crate::util::unix_ms_now(),
        }
    }

    /// Current rank, derived from level.
    #[must_use]
    pub fn rank(&self) -> Rank {
        formulas::rank_for_level(self.level)
    }

    /// Restore the xp/level invariant by rolling excess XP into level-ups.
    ///
    /// Returns the number of levels gained. Supports multi-level-ups from a
    /// single large reward.
    pub fn normalize(&mut self) -> u32 {
        let mut gained = 0;
        while self.xp >= formulas::xp_required_for_next_level(self.level) {
            self.xp -= formulas::xp_required_for_next_level(self.level);
            self.level += 1;
            gained += 1;
        }
        gained
    }
}

impl Default for PlayerState {
    fn default() -> Self {
        Self::new()
    }
}
