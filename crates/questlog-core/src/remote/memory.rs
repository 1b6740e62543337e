//! In-memory remote store.
//!
//! Reference implementation of [`RemoteStore`](crate::remote::RemoteStore)
//! semantics and the test double for sync paths: it can be flipped offline
//! to inject the failure modes reconciliation must tolerate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::models::{Habit, HabitId, PlayerState};
use crate::remote::{HabitPatch, PlayerPatch, RemoteError, RemoteResult, RemoteStore};

#[derive(Default)]
struct RemoteInner {
    online: bool,
    next_id: u64,
    habits: HashMap<String, Habit>,
    players: HashMap<String, PlayerState>,
}

/// Process-local document store keyed the way a real backend would be.
#[derive(Clone)]
pub struct MemoryRemote {
    inner: Arc<Mutex<RemoteInner>>,
}

impl MemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RemoteInner {
                online: true,
                ..RemoteInner::default()
            })),
        }
    }

    /// Flip connectivity. While offline every call fails with
    /// [`RemoteError::Unavailable`].
    pub fn set_online(&self, online: bool) {
        self.lock().online = online;
    }

    /// Number of habit documents held, across all users.
    #[must_use]
    pub fn habit_count(&self) -> usize {
        self.lock().habits.len()
    }

    /// Seed a habit document directly, as another device would have.
    pub fn insert_habit(&self, habit: Habit) {
        self.lock().habits.insert(habit.id.as_str().to_string(), habit);
    }

    /// Seed a player-state document directly.
    pub fn insert_player(&self, user_id: &str, state: PlayerState) {
        self.lock().players.insert(user_id.to_string(), state);
    }

    fn lock(&self) -> MutexGuard<'_, RemoteInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_online(inner: &RemoteInner) -> RemoteResult<()> {
        if inner.online {
            Ok(())
        } else {
            Err(RemoteError::Unavailable("network offline".to_string()))
        }
    }
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteStore for MemoryRemote {
    async fn create_habit(&self, habit: &Habit) -> RemoteResult<HabitId> {
        let mut inner = self.lock();
        Self::check_online(&inner)?;
        inner.next_id += 1;
        let id = HabitId::remote(format!("h-{:06}", inner.next_id));
        let mut accepted = habit.clone();
        accepted.id = id.clone();
        inner.habits.insert(id.as_str().to_string(), accepted);
        Ok(id)
    }

    async fn update_habit(&self, id: &HabitId, patch: &HabitPatch) -> RemoteResult<()> {
        let mut inner = self.lock();
        Self::check_online(&inner)?;
        let habit = inner
            .habits
            .get_mut(id.as_str())
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        patch.apply(habit);
        Ok(())
    }

    async fn delete_habit(&self, id: &HabitId) -> RemoteResult<()> {
        let mut inner = self.lock();
        Self::check_online(&inner)?;
        inner
            .habits
            .remove(id.as_str())
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }

    async fn habits_by_user(&self, user_id: &str) -> RemoteResult<Vec<Habit>> {
        let inner = self.lock();
        Self::check_online(&inner)?;
        let mut habits: Vec<Habit> = inner
            .habits
            .values()
            .filter(|habit| habit.owner == user_id)
            .cloned()
            .collect();
        habits.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        Ok(habits)
    }

    async fn player_state(&self, user_id: &str) -> RemoteResult<Option<PlayerState>> {
        let inner = self.lock();
        Self::check_online(&inner)?;
        Ok(inner.players.get(user_id).cloned())
    }

    async fn set_player_state(&self, user_id: &str, state: &PlayerState) -> RemoteResult<()> {
        let mut inner = self.lock();
        Self::check_online(&inner)?;
        inner.players.insert(user_id.to_string(), state.clone());
        Ok(())
    }

    async fn update_player_state(&self, user_id: &str, patch: &PlayerPatch) -> RemoteResult<()> {
        let mut inner = self.lock();
        Self::check_online(&inner)?;
        let state = inner
            .players
            .get_mut(user_id)
            .ok_or_else(|| RemoteError::NotFound(user_id.to_string()))?;
        if let Some(level) = patch.level {
            state.level = level;
        }
        if let Some(xp) = patch.xp {
            state.xp = xp;
        }
        if let Some(total) = patch.total_xp_earned {
            state.total_xp_earned = total;
        }
        if let Some(longest) = patch.longest_streak {
            state.longest_streak = longest;
        }
        if let Some(protections) = patch.streak_protections {
            state.streak_protections = protections;
        }
        if let Some(updated) = patch.last_updated {
            state.last_updated = updated;
        }
        Ok(())
    }
}
