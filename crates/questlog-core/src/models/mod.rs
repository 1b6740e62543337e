//! Data models for Questlog

mod habit;
mod player;
mod sync_conflict;

pub use habit::{Difficulty, Habit, HabitId};
pub use player::{PlayerState, Rank};
pub use sync_conflict::{ConflictEntity, ConflictResolution, SyncConflict};
