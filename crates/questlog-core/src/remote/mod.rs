//! Remote store adapter.
//!
//! A document-oriented, per-user view of the same entities the local store
//! holds. May be unreachable indefinitely; every failure here is non-fatal
//! by policy and is converted to a `sync-failed` notification at the
//! boundary instead of propagating into the completion path.

mod memory;

pub use memory::MemoryRemote;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Difficulty, Habit, HabitId, PlayerState};

/// Remote store failure taxonomy.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Network unavailable or the service is unreachable.
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    /// The authenticated user may not touch this document.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Document does not exist.
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Any other service-reported error.
    #[error("Remote API error: {0}")]
    Api(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Partial update for a habit document. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitPatch {
    pub name: Option<String>,
    pub completed: Option<bool>,
    pub streak: Option<u32>,
    pub time_spent: Option<u32>,
    pub last_earned_xp: Option<u64>,
    pub last_completed_on: Option<NaiveDate>,
    pub tags: Option<Vec<String>>,
    pub difficulty: Option<Difficulty>,
}

impl HabitPatch {
    /// Patch capturing every mutable field of `habit`, for write-through
    /// pushes after a local mutation.
    #[must_use]
    pub fn full(habit: &Habit) -> Self {
        Self {
            name: Some(habit.name.clone()),
            completed: Some(habit.completed),
            streak: Some(habit.streak),
            time_spent: Some(habit.time_spent),
            last_earned_xp: Some(habit.last_earned_xp),
            last_completed_on: habit.last_completed_on,
            tags: Some(habit.tags.clone()),
            difficulty: Some(habit.difficulty),
        }
    }

    /// Apply this patch to a habit in place.
    pub fn apply(&self, habit: &mut Habit) {
        if let Some(name) = &self.name {
            habit.name.clone_from(name);
        }
        if let Some(completed) = self.completed {
            habit.completed = completed;
        }
        if let Some(streak) = self.streak {
            habit.streak = streak;
        }
        if let Some(time_spent) = self.time_spent {
            habit.time_spent = time_spent;
        }
        if let Some(last_earned_xp) = self.last_earned_xp {
            habit.last_earned_xp = last_earned_xp;
        }
        if let Some(last_completed_on) = self.last_completed_on {
            habit.last_completed_on = Some(last_completed_on);
        }
        if let Some(tags) = &self.tags {
            habit.tags.clone_from(tags);
        }
        if let Some(difficulty) = self.difficulty {
            habit.difficulty = difficulty;
        }
    }
}

/// Partial update for a player-state document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPatch {
    pub level: Option<u32>,
    pub xp: Option<u64>,
    pub total_xp_earned: Option<u64>,
    pub longest_streak: Option<u32>,
    pub streak_protections: Option<u32>,
    pub last_updated: Option<i64>,
}

/// Document-store operations, keyed by user identifier.
///
/// No cross-document transactions are assumed; each call reports its own
/// success or failure.
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    /// Create a habit document. The server issues the identifier; the
    /// habit's local id is discarded on acceptance.
    async fn create_habit(&self, habit: &Habit) -> RemoteResult<HabitId>;

    /// Partially update an existing habit document.
    async fn update_habit(&self, id: &HabitId, patch: &HabitPatch) -> RemoteResult<()>;

    /// Delete a habit document.
    async fn delete_habit(&self, id: &HabitId) -> RemoteResult<()>;

    /// All habit documents owned by `user_id`.
    async fn habits_by_user(&self, user_id: &str) -> RemoteResult<Vec<Habit>>;

    /// The player-state document for `user_id`, if one exists.
    async fn player_state(&self, user_id: &str) -> RemoteResult<Option<PlayerState>>;

    /// Replace the player-state document for `user_id`.
    async fn set_player_state(&self, user_id: &str, state: &PlayerState) -> RemoteResult<()>;

    /// Partially update the player-state document for `user_id`.
    async fn update_player_state(&self, user_id: &str, patch: &PlayerPatch) -> RemoteResult<()>;
}
