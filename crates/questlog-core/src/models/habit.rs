//! Habit model

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix distinguishing locally generated identifiers from server-issued
/// ones. A habit created offline carries a `local:` UUID v7 until the remote
/// store accepts it and hands back its own identifier.
const LOCAL_ID_PREFIX: &str = "local:";

/// A unique identifier for a habit.
///
/// Server-issued identifiers are opaque strings; locally generated ones use
/// UUID v7 (time-sortable) behind a recognizable prefix so the reconciliation
/// engine can tell a not-yet-synced creation apart from an accepted record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HabitId(String);

impl HabitId {
    /// Create a new locally generated habit ID.
    #[must_use]
    pub fn new_local() -> Self {
        Self(format!("{LOCAL_ID_PREFIX}{}", Uuid::now_v7()))
    }

    /// Wrap a server-issued identifier.
    pub fn remote(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Whether this identifier was generated locally and has not yet been
    /// accepted by the remote store.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_ID_PREFIX)
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HabitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Difficulty tier of a habit.
///
/// Difficulty is descriptive data carried by the habit; the XP multiplier is
/// difficulty-independent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
    Epic,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Easy => "easy",
            Self::Normal => "normal",
            Self::Hard => "hard",
            Self::Epic => "epic",
        };
        write!(f, "{name}")
    }
}

/// A recurring task in the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    /// Unique identifier
    pub id: HabitId,
    /// Display name
    pub name: String,
    /// Owning user identifier
    pub owner: String,
    /// Whether the habit is currently checked off
    pub completed: bool,
    /// Consecutive qualifying days completed
    pub streak: u32,
    /// Cumulative tracked time, minutes
    pub time_spent: u32,
    /// XP awarded for the most recent completion; zero while unchecked.
    /// Kept so an accidental un-check refunds exactly what was earned.
    pub last_earned_xp: u64,
    /// Day of the most recent completion, used for streak continuity
    pub last_completed_on: Option<NaiveDate>,
    /// Day of the completion before the most recent one. Local undo
    /// bookkeeping, like `last_earned_xp`: un-checking restores it into
    /// `last_completed_on` so continuity rolls back exactly. Cleared at day
    /// rollover, when the most recent completion becomes final.
    #[serde(default)]
    pub previous_completed_on: Option<NaiveDate>,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Difficulty tier
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl Habit {
    /// Create a new unchecked habit owned by `owner`.
    #[must_use]
    pub fn new(owner: impl Into<String>, name: impl Into<String>, difficulty: Difficulty) -> Self {
        Self {
            id: HabitId::new_local(),
            name: name.into(),
            owner: owner.into(),
            completed: false,
            streak: 0,
            time_spent: 0,
            last_earned_xp: 0,
            last_completed_on: None,
            previous_completed_on: None,
            tags: Vec::new(),
            difficulty,
            created_at: crate::util::unix_ms_now(),
        }
    }

    /// Whether the habit content matches another copy, ignoring identifier,
    /// owner, and local undo bookkeeping. Used by reconciliation to decide
    /// if two copies of the same record actually diverged.
    #[must_use]
    pub fn content_eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.completed == other.completed
            && self.streak == other.streak
            && self.time_spent == other.time_spent
            && self.last_earned_xp == other.last_earned_xp
            && self.last_completed_on == other.last_completed_on
            && self.tags == other.tags
            && self.difficulty == other.difficulty
    }
}
