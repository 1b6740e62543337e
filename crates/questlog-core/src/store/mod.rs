//! Local store adapter.
//!
//! The device-local snapshot of the habit collection and player state.
//! Synchronous and assumed always available: a failing local store is
//! treated as fatal to the current operation (corrupted device state is
//! outside this system's remit). Values are plain JSON under fixed keys.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::models::{Habit, PlayerState};

/// Fixed keys the snapshot layer reads and writes.
pub mod keys {
    pub const HABITS: &str = "habits";
    pub const LEVEL: &str = "level";
    pub const XP: &str = "xp";
    pub const RANK: &str = "rank";
    pub const TOTAL_XP_EARNED: &str = "totalXPEarned";
    pub const LONGEST_STREAK: &str = "longestStreak";
    pub const STREAK_PROTECTIONS: &str = "streakProtections";
    pub const LAST_UPDATED: &str = "lastUpdated";
}

/// Byte-oriented key-value storage.
///
/// The reconciliation rules are storage-agnostic; any implementation of this
/// trait works. The crate ships [`MemoryStore`] and [`SqliteStore`].
pub trait LocalStore {
    /// Read the value stored under `key`, if any.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write `value` under `key`, replacing any previous value.
    fn write(&self, key: &str, value: &[u8]) -> Result<()>;
}

/// Load the habit collection. Absent key means no habits yet.
pub fn load_habits(store: &impl LocalStore) -> Result<Vec<Habit>> {
    match store.read(keys::HABITS)? {
        Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
        None => Ok(Vec::new()),
    }
}

/// Persist the habit collection.
pub fn save_habits(store: &impl LocalStore, habits: &[Habit]) -> Result<()> {
    store.write(keys::HABITS, &serde_json::to_vec(habits)?)
}

/// Load player state from its per-field keys, defaulting missing fields.
///
/// The level/xp invariant is re-established on load, so a snapshot written
/// by an older or foreign client cannot smuggle in an over-full xp value.
pub fn load_player(store: &impl LocalStore) -> Result<PlayerState> {
    let mut player = PlayerState::new();
    if let Some(level) = read_json(store, keys::LEVEL)? {
        player.level = std::cmp::max(1, level);
    }
    if let Some(xp) = read_json(store, keys::XP)? {
        player.xp = xp;
    }
    if let Some(total) = read_json(store, keys::TOTAL_XP_EARNED)? {
        player.total_xp_earned = total;
    }
    if let Some(longest) = read_json(store, keys::LONGEST_STREAK)? {
        player.longest_streak = longest;
    }
    if let Some(protections) = read_json(store, keys::STREAK_PROTECTIONS)? {
        player.streak_protections = protections;
    }
    if let Some(updated) = read_json(store, keys::LAST_UPDATED)? {
        player.last_updated = updated;
    }
    player.normalize();
    Ok(player)
}

/// Persist player state across its per-field keys.
///
/// `rank` is derived from level but still written, since the key is part of
/// the local-store interface and lets dumb readers show it without
/// recomputing.
pub fn save_player(store: &impl LocalStore, player: &PlayerState) -> Result<()> {
    write_json(store, keys::LEVEL, &player.level)?;
    write_json(store, keys::XP, &player.xp)?;
    write_json(store, keys::RANK, &player.rank())?;
    write_json(store, keys::TOTAL_XP_EARNED, &player.total_xp_earned)?;
    write_json(store, keys::LONGEST_STREAK, &player.longest_streak)?;
    write_json(store, keys::STREAK_PROTECTIONS, &player.streak_protections)?;
    write_json(store, keys::LAST_UPDATED, &player.last_updated)?;
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(
    store: &impl LocalStore,
    key: &str,
) -> Result<Option<T>> {
    match store.read(key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

fn write_json<T: serde::Serialize>(store: &impl LocalStore, key: &str, value: &T) -> Result<()> {
    store.write(key, &serde_json::to_vec(value)?)
}
