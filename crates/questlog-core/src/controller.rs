//! Progression controller.
//!
//! Orchestrates habit-completion events: formulas compute the deltas, state
//! is applied write-through to the local store, remote propagation is
//! best-effort, and the notification bus announces what changed. Each event
//! runs the same straight-line phases (compute, apply, notify, propagate);
//! `&mut self` on every mutation gives the no-interleaving guarantee — a
//! reconciliation pass and a completion event can never overlap.

use tracing::{debug, warn};

use crate::bus::{Event, NotificationBus};
use crate::error::{Error, Result};
use crate::formulas;
use crate::identity::{Identity, IdentityProvider, ANONYMOUS_OWNER};
use crate::models::{Difficulty, Habit, HabitId, PlayerState};
use crate::remote::{HabitPatch, RemoteError, RemoteStore};
use crate::store::{self, LocalStore};
use crate::streak::{self, Continuity};
use crate::sync::{Reconciler, SyncReport, SyncState};
use crate::util;

/// Caller's decision on spending a streak-protection charge when a
/// completion would otherwise break the streak. Spending is always an
/// explicit user choice, never automatic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionChoice {
    Decline,
    Spend,
}

/// Content-only habit edit. Completion state, streak, and XP are not
/// editable here; they only move through the completion path, which keeps
/// the undo symmetry intact.
#[derive(Debug, Clone, Default)]
pub struct EditHabit {
    pub name: Option<String>,
    pub tags: Option<Vec<String>>,
    pub difficulty: Option<Difficulty>,
}

/// Session-scoped owner of the player state and habit collection.
///
/// Holds both exclusively for mutation; the reconciliation engine is the
/// only other writer and runs to completion inside [`Self::reconcile`].
pub struct ProgressionController<L, R, I> {
    local: L,
    remote: R,
    identity: I,
    bus: NotificationBus,
    habits: Vec<Habit>,
    player: PlayerState,
    last_identity: Identity,
    sync_state: SyncState,
}

impl<L: LocalStore, R: RemoteStore, I: IdentityProvider> ProgressionController<L, R, I> {
    /// Build a controller from its collaborators, loading the local
    /// snapshot.
    pub fn new(local: L, remote: R, identity: I, bus: NotificationBus) -> Result<Self> {
        let habits = store::load_habits(&local)?;
        let player = store::load_player(&local)?;
        let last_identity = identity.current_identity();
        Ok(Self {
            local,
            remote,
            identity,
            bus,
            habits,
            player,
            last_identity,
            sync_state: SyncState::Offline,
        })
    }

    pub fn habits(&self) -> &[Habit] {
        &self.habits
    }

    pub fn habit(&self, id: &HabitId) -> Option<&Habit> {
        self.habits.iter().find(|habit| &habit.id == id)
    }

    pub fn player(&self) -> &PlayerState {
        &self.player
    }

    pub const fn sync_state(&self) -> SyncState {
        self.sync_state
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    /// Run the login-time reconciliation pass if a user is signed in.
    pub async fn start_session(&mut self) -> Result<SyncReport> {
        self.reconcile().await
    }

    /// Observe the identity provider and react to transitions.
    ///
    /// An anonymous-to-signed-in transition folds anonymously owned local
    /// data into the account and triggers a reconciliation pass. Sign-out
    /// just stops remote propagation.
    pub async fn refresh_identity(&mut self) -> Result<Option<SyncReport>> {
        let current = self.identity.current_identity();
        if current == self.last_identity {
            return Ok(None);
        }
        let was_anonymous = self.last_identity.is_anonymous();
        self.last_identity = current.clone();

        let Some(user_id) = current.user_id().map(ToString::to_string) else {
            debug!("signed out; continuing against the local store only");
            self.sync_state = SyncState::Offline;
            return Ok(None);
        };

        if was_anonymous {
            let mut folded = 0;
            for habit in &mut self.habits {
                if habit.owner == ANONYMOUS_OWNER {
                    habit.owner.clone_from(&user_id);
                    folded += 1;
                }
            }
            if folded > 0 {
                debug!(folded, user = %user_id, "folded anonymous habits into account");
                store::save_habits(&self.local, &self.habits)?;
            }
        }

        self.reconcile().await.map(Some)
    }

    /// Run one reconciliation pass for the signed-in user.
    ///
    /// Idempotent; new completion events are held off for the duration
    /// because the pass owns `&mut self`.
    pub async fn reconcile(&mut self) -> Result<SyncReport> {
        let Some(user_id) = self.last_identity.user_id().map(ToString::to_string) else {
            return Ok(SyncReport::skipped(SyncState::Offline));
        };

        self.sync_state = SyncState::Syncing;
        let report = Reconciler::new(&self.local, &self.remote, &self.bus)
            .run(&user_id)
            .await?;

        // The reconciler wrote the merged snapshot; pick it up.
        self.habits = store::load_habits(&self.local)?;
        self.player = store::load_player(&self.local)?;
        self.sync_state = report.state;
        Ok(report)
    }

    /// Create a habit. Written locally first; the remote creation is
    /// best-effort and, when it fails, retried by the next reconciliation
    /// pass off the local-format identifier.
    pub async fn create_habit(
        &mut self,
        name: &str,
        difficulty: Difficulty,
        tags: Vec<String>,
    ) -> Result<HabitId> {
        let name = util::normalize_name(name)
            .ok_or_else(|| Error::InvalidInput("habit name must not be empty".to_string()))?;
        let mut habit = Habit::new(self.last_identity.owner_id(), name, difficulty);
        habit.tags = tags;
        let local_id = habit.id.clone();

        self.habits.push(habit.clone());
        store::save_habits(&self.local, &self.habits)?;

        if self.last_identity.user_id().is_some() {
            match self.remote.create_habit(&habit).await {
                Ok(remote_id) => {
                    if let Some(entry) = self.habits.iter_mut().find(|h| h.id == local_id) {
                        entry.id = remote_id.clone();
                    }
                    store::save_habits(&self.local, &self.habits)?;
                    return Ok(remote_id);
                }
                Err(error) => self.note_remote_failure("create habit", &error),
            }
        }
        Ok(local_id)
    }

    /// Edit habit content.
    pub async fn edit_habit(&mut self, id: &HabitId, edit: EditHabit) -> Result<()> {
        let index = self.index_of(id)?;
        let habit = &mut self.habits[index];
        if let Some(name) = edit.name {
            habit.name = util::normalize_name(&name)
                .ok_or_else(|| Error::InvalidInput("habit name must not be empty".to_string()))?;
        }
        if let Some(tags) = edit.tags {
            habit.tags = tags;
        }
        if let Some(difficulty) = edit.difficulty {
            habit.difficulty = difficulty;
        }
        store::save_habits(&self.local, &self.habits)?;
        self.push_habit(index).await;
        Ok(())
    }

    /// Delete a habit locally and, best-effort, remotely.
    pub async fn delete_habit(&mut self, id: &HabitId) -> Result<()> {
        let index = self.index_of(id)?;
        let habit = self.habits.remove(index);
        store::save_habits(&self.local, &self.habits)?;

        if self.last_identity.user_id().is_some() && !habit.id.is_local() {
            if let Err(error) = self.remote.delete_habit(&habit.id).await {
                self.note_remote_failure("delete habit", &error);
            }
        }
        Ok(())
    }

    /// Accrue timer-tracked minutes on a habit.
    pub async fn record_time(&mut self, id: &HabitId, minutes: u32) -> Result<()> {
        let index = self.index_of(id)?;
        let habit = &mut self.habits[index];
        habit.time_spent = habit.time_spent.saturating_add(minutes);
        store::save_habits(&self.local, &self.habits)?;
        self.push_habit(index).await;
        Ok(())
    }

    /// Toggle a habit's completion for today.
    ///
    /// Unchecked habits get completed and awarded XP; checked habits get
    /// un-completed, refunding exactly the XP of the most recent completion.
    /// Returns the signed XP delta applied.
    pub async fn complete_habit(
        &mut self,
        id: &HabitId,
        protection: ProtectionChoice,
    ) -> Result<i64> {
        self.complete_habit_on(id, util::today_utc(), protection)
            .await
    }

    /// [`Self::complete_habit`] with an explicit day, for deterministic
    /// callers and tests.
    pub async fn complete_habit_on(
        &mut self,
        id: &HabitId,
        today: chrono::NaiveDate,
        protection: ProtectionChoice,
    ) -> Result<i64> {
        let index = self.index_of(id)?;
        if self.habits[index].completed {
            self.uncomplete_at(index).await
        } else {
            self.complete_at(index, today, protection).await
        }
    }

    /// Day-rollover reset: uncheck every habit not completed `today`.
    ///
    /// This is how a new day begins; it clears the completion flag without
    /// reversing anything (streak and awarded XP stand, `last_completed_on`
    /// keeps feeding continuity). Written through locally; remote copies
    /// converge at the next reconciliation pass.
    pub fn reset_daily_checkmarks(&mut self, today: chrono::NaiveDate) -> Result<()> {
        let mut reset = 0;
        for habit in &mut self.habits {
            if habit.completed && habit.last_completed_on != Some(today) {
                habit.completed = false;
                habit.last_earned_xp = 0;
                habit.previous_completed_on = None;
                reset += 1;
            }
        }
        if reset > 0 {
            debug!(reset, "daily checkmark reset");
            store::save_habits(&self.local, &self.habits)?;
        }
        Ok(())
    }

    /// Grant streak-protection charges (e.g. a milestone reward configured
    /// by the host app).
    pub async fn grant_streak_protections(&mut self, count: u32) -> Result<()> {
        self.player.streak_protections = self.player.streak_protections.saturating_add(count);
        self.player.last_updated = util::unix_ms_now();
        store::save_player(&self.local, &self.player)?;
        self.push_player().await;
        Ok(())
    }

    /// Add XP directly, rolling excess into level-ups (multi-level jumps
    /// from one large reward included) and publishing the change.
    pub async fn add_xp(&mut self, amount: u64) -> Result<()> {
        let events = self.apply_xp_gain(amount);
        store::save_player(&self.local, &self.player)?;
        self.publish_all(&events);
        self.push_player().await;
        Ok(())
    }

    /// Remove XP with a floor of zero. Never reduces the level: leveling
    /// down is not modeled, an accepted asymmetry of the undo path.
    pub async fn remove_xp(&mut self, amount: u64) -> Result<()> {
        let event = self.apply_xp_loss(amount);
        store::save_player(&self.local, &self.player)?;
        self.bus.publish(&event);
        self.push_player().await;
        Ok(())
    }

    async fn complete_at(
        &mut self,
        index: usize,
        today: chrono::NaiveDate,
        protection: ProtectionChoice,
    ) -> Result<i64> {
        // Compute phase: everything below is pure formula evaluation.
        let habit = &self.habits[index];
        let continuity = streak::continuity(habit.last_completed_on, today);
        debug!(id = %habit.id, ?continuity, "computing completion reward");

        let mut protected = false;
        if continuity == Continuity::Broken
            && protection == ProtectionChoice::Spend
            && self.player.streak_protections > 0
        {
            self.player.streak_protections -= 1;
            protected = true;
            debug!(remaining = self.player.streak_protections, "spent streak protection");
        }

        let new_streak = streak::next_streak(habit.streak, continuity, protected);
        let reward = formulas::completion_reward(new_streak, self.player.rank());

        // Apply phase: habit first, then player, then one local write.
        let habit = &mut self.habits[index];
        habit.streak = new_streak;
        habit.completed = true;
        habit.last_earned_xp = reward;
        habit.previous_completed_on = habit.last_completed_on;
        habit.last_completed_on = Some(today);
        self.player.longest_streak = self.player.longest_streak.max(new_streak);
        let events = self.apply_xp_gain(reward);
        self.persist()?;

        // Notify, then best-effort remote propagation.
        self.publish_all(&events);
        self.push_habit(index).await;
        self.push_player().await;
        Ok(i64::try_from(reward).unwrap_or(i64::MAX))
    }

    async fn uncomplete_at(&mut self, index: usize) -> Result<i64> {
        let habit = &mut self.habits[index];
        let refund = habit.last_earned_xp;
        debug!(id = %habit.id, refund, "reversing most recent completion");

        // Exact reversal of the last completion: the stored award is
        // refunded rather than recomputed, so toggling cannot farm XP, and
        // continuity rolls back to the prior completion day so the next
        // completion scores as if this one never happened.
        habit.streak = habit.streak.saturating_sub(1);
        habit.completed = false;
        habit.last_earned_xp = 0;
        habit.last_completed_on = habit.previous_completed_on.take();
        let event = self.apply_xp_loss(refund);
        self.persist()?;

        self.bus.publish(&event);
        self.push_habit(index).await;
        self.push_player().await;
        Ok(-i64::try_from(refund).unwrap_or(i64::MAX))
    }

    fn apply_xp_gain(&mut self, amount: u64) -> Vec<Event> {
        let mut rank = self.player.rank();
        self.player.xp += amount;
        self.player.total_xp_earned += amount;

        let mut events = vec![Event::XpChanged {
            xp: self.player.xp,
            level: self.player.level,
            delta: i64::try_from(amount).unwrap_or(i64::MAX),
        }];
        while self.player.xp >= formulas::xp_required_for_next_level(self.player.level) {
            self.player.xp -= formulas::xp_required_for_next_level(self.player.level);
            self.player.level += 1;
            events.push(Event::LevelUp {
                level: self.player.level,
            });
            let new_rank = self.player.rank();
            if new_rank != rank {
                events.push(Event::RankUp { rank: new_rank });
                rank = new_rank;
            }
        }
        if let Some(Event::XpChanged { xp, level, .. }) = events.first_mut() {
            // Report the post-level-up values.
            *xp = self.player.xp;
            *level = self.player.level;
        }
        self.player.last_updated = util::unix_ms_now();
        events
    }

    fn apply_xp_loss(&mut self, amount: u64) -> Event {
        self.player.xp = self.player.xp.saturating_sub(amount);
        self.player.last_updated = util::unix_ms_now();
        Event::XpChanged {
            xp: self.player.xp,
            level: self.player.level,
            delta: -i64::try_from(amount).unwrap_or(i64::MAX),
        }
    }

    fn persist(&self) -> Result<()> {
        store::save_habits(&self.local, &self.habits)?;
        store::save_player(&self.local, &self.player)
    }

    fn publish_all(&self, events: &[Event]) {
        for event in events {
            self.bus.publish(event);
        }
    }

    fn index_of(&self, id: &HabitId) -> Result<usize> {
        self.habits
            .iter()
            .position(|habit| &habit.id == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Push one habit's current content to the remote store, best-effort.
    /// Local-id habits are skipped; the next reconciliation pass creates
    /// them.
    async fn push_habit(&mut self, index: usize) {
        if self.last_identity.user_id().is_none() || self.habits[index].id.is_local() {
            return;
        }
        let id = self.habits[index].id.clone();
        let patch = HabitPatch::full(&self.habits[index]);
        if let Err(error) = self.remote.update_habit(&id, &patch).await {
            self.note_remote_failure("update habit", &error);
        }
    }

    /// Push the player state to the remote store, best-effort.
    async fn push_player(&mut self) {
        let Some(user_id) = self.last_identity.user_id().map(ToString::to_string) else {
            return;
        };
        if let Err(error) = self.remote.set_player_state(&user_id, &self.player).await {
            self.note_remote_failure("push player state", &error);
        }
    }

    /// Swallow a remote failure: log it, surface it as a notification, and
    /// record the connectivity state. The local mutation stands.
    fn note_remote_failure(&mut self, stage: &str, error: &RemoteError) {
        warn!(stage, %error, "remote propagation failed; continuing locally");
        self.sync_state = match error {
            RemoteError::Unavailable(_) => SyncState::Offline,
            _ => SyncState::Error,
        };
        self.bus.publish(&Event::SyncFailed {
            reason: format!("{stage}: {error}"),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventKind;
    use crate::identity::SharedIdentity;
    use crate::remote::MemoryRemote;
    use crate::store::MemoryStore;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    type TestController = ProgressionController<MemoryStore, MemoryRemote, SharedIdentity>;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn signed_in() -> (TestController, MemoryRemote) {
        init_tracing();
        let remote = MemoryRemote::new();
        let controller = ProgressionController::new(
            MemoryStore::new(),
            remote.clone(),
            SharedIdentity::new(Identity::User("u-1".to_string())),
            NotificationBus::new(),
        )
        .unwrap();
        (controller, remote)
    }

    fn counter(bus: &NotificationBus, kind: EventKind) -> Arc<AtomicUsize> {
        let counter = Arc::new(AtomicUsize::new(0));
        let clone = Arc::clone(&counter);
        bus.subscribe(kind, move |_| {
            clone.fetch_add(1, Ordering::SeqCst);
        });
        counter
    }

    #[tokio::test]
    async fn test_first_completion_awards_day_one_reward() {
        let (mut controller, _remote) = signed_in();
        let id = controller
            .create_habit("run", Difficulty::Normal, vec![])
            .await
            .unwrap();

        let delta = controller
            .complete_habit_on(&id, day("2026-08-26"), ProtectionChoice::Decline)
            .await
            .unwrap();

        // Day 1: floor(11 * 1.05) = 11 at rank E.
        assert_eq!(delta, 11);
        assert_eq!(controller.player().xp, 11);
        assert_eq!(controller.player().level, 1);
        let habit = controller.habit(&id).unwrap();
        assert_eq!(habit.streak, 1);
        assert!(habit.completed);
        assert_eq!(habit.last_earned_xp, 11);
    }

    #[tokio::test]
    async fn test_streak_day_five_hits_milestone() {
        let (mut controller, _remote) = signed_in();
        let id = controller
            .create_habit("read", Difficulty::Normal, vec![])
            .await
            .unwrap();

        let mut last_delta = 0;
        for offset in 0..5 {
            let today = day("2026-08-01") + chrono::Days::new(offset);
            controller.reset_daily_checkmarks(today).unwrap();
            last_delta = controller
                .complete_habit_on(&id, today, ProtectionChoice::Decline)
                .await
                .unwrap();
        }
        // Day 5: floor(15 * 1.25) + 10 = 28.
        assert_eq!(last_delta, 28);
        assert_eq!(controller.habit(&id).unwrap().streak, 5);
        assert_eq!(controller.player().longest_streak, 5);
    }

    #[tokio::test]
    async fn test_complete_then_uncomplete_round_trips() {
        let (mut controller, _remote) = signed_in();
        let id = controller
            .create_habit("stretch", Difficulty::Easy, vec![])
            .await
            .unwrap();

        let xp_before = controller.player().xp;
        let level_before = controller.player().level;
        let habit_before = controller.habit(&id).unwrap().clone();

        controller
            .complete_habit_on(&id, day("2026-08-26"), ProtectionChoice::Decline)
            .await
            .unwrap();
        controller
            .complete_habit_on(&id, day("2026-08-26"), ProtectionChoice::Decline)
            .await
            .unwrap();

        assert_eq!(controller.player().xp, xp_before);
        assert_eq!(controller.player().level, level_before);
        let habit = controller.habit(&id).unwrap();
        assert_eq!(habit.streak, habit_before.streak);
        assert_eq!(habit.completed, habit_before.completed);
        assert_eq!(habit.last_earned_xp, habit_before.last_earned_xp);
        assert_eq!(habit.last_completed_on, habit_before.last_completed_on);
    }

    #[tokio::test]
    async fn test_uncomplete_restores_streak_continuity() {
        let (mut controller, _remote) = signed_in();
        let id = controller
            .create_habit("floss", Difficulty::Normal, vec![])
            .await
            .unwrap();

        controller
            .complete_habit_on(&id, day("2026-08-01"), ProtectionChoice::Decline)
            .await
            .unwrap();
        controller.reset_daily_checkmarks(day("2026-08-02")).unwrap();
        controller
            .complete_habit_on(&id, day("2026-08-02"), ProtectionChoice::Decline)
            .await
            .unwrap();

        // Undoing today's completion rolls continuity back to yesterday.
        controller
            .complete_habit_on(&id, day("2026-08-02"), ProtectionChoice::Decline)
            .await
            .unwrap();
        assert_eq!(
            controller.habit(&id).unwrap().last_completed_on,
            Some(day("2026-08-01"))
        );

        // Re-completing continues the streak instead of restarting it.
        controller
            .complete_habit_on(&id, day("2026-08-02"), ProtectionChoice::Decline)
            .await
            .unwrap();
        assert_eq!(controller.habit(&id).unwrap().streak, 2);
    }

    #[tokio::test]
    async fn test_uncomplete_first_completion_clears_continuity() {
        let (mut controller, _remote) = signed_in();
        let id = controller
            .create_habit("floss", Difficulty::Normal, vec![])
            .await
            .unwrap();

        controller
            .complete_habit_on(&id, day("2026-08-01"), ProtectionChoice::Decline)
            .await
            .unwrap();
        controller
            .complete_habit_on(&id, day("2026-08-01"), ProtectionChoice::Decline)
            .await
            .unwrap();
        assert_eq!(controller.habit(&id).unwrap().last_completed_on, None);

        // A later completion starts fresh; the undone day never counted.
        let delta = controller
            .complete_habit_on(&id, day("2026-08-03"), ProtectionChoice::Decline)
            .await
            .unwrap();
        assert_eq!(controller.habit(&id).unwrap().streak, 1);
        assert_eq!(delta, 11);
    }

    #[tokio::test]
    async fn test_toggling_cannot_farm_xp() {
        let (mut controller, _remote) = signed_in();
        let id = controller
            .create_habit("journal", Difficulty::Normal, vec![])
            .await
            .unwrap();

        let today = day("2026-08-26");
        for _ in 0..5 {
            controller
                .complete_habit_on(&id, today, ProtectionChoice::Decline)
                .await
                .unwrap();
            controller
                .complete_habit_on(&id, today, ProtectionChoice::Decline)
                .await
                .unwrap();
        }
        let delta = controller
            .complete_habit_on(&id, today, ProtectionChoice::Decline)
            .await
            .unwrap();

        // Net XP after any toggle sequence equals the last completion alone.
        assert_eq!(controller.player().xp, u64::try_from(delta).unwrap());
    }

    #[tokio::test]
    async fn test_streak_break_resets_to_one() {
        let (mut controller, _remote) = signed_in();
        let id = controller
            .create_habit("swim", Difficulty::Hard, vec![])
            .await
            .unwrap();

        controller
            .complete_habit_on(&id, day("2026-08-01"), ProtectionChoice::Decline)
            .await
            .unwrap();
        controller.reset_daily_checkmarks(day("2026-08-10")).unwrap();
        controller
            .complete_habit_on(&id, day("2026-08-10"), ProtectionChoice::Decline)
            .await
            .unwrap();

        assert_eq!(controller.habit(&id).unwrap().streak, 1);
    }

    #[tokio::test]
    async fn test_streak_protection_preserves_continuity() {
        let (mut controller, _remote) = signed_in();
        let id = controller
            .create_habit("swim", Difficulty::Hard, vec![])
            .await
            .unwrap();
        controller.grant_streak_protections(1).await.unwrap();

        controller
            .complete_habit_on(&id, day("2026-08-01"), ProtectionChoice::Decline)
            .await
            .unwrap();
        controller.reset_daily_checkmarks(day("2026-08-10")).unwrap();
        controller
            .complete_habit_on(&id, day("2026-08-10"), ProtectionChoice::Spend)
            .await
            .unwrap();

        assert_eq!(controller.habit(&id).unwrap().streak, 2);
        assert_eq!(controller.player().streak_protections, 0);
    }

    #[tokio::test]
    async fn test_protection_not_spent_when_streak_unbroken() {
        let (mut controller, _remote) = signed_in();
        let id = controller
            .create_habit("swim", Difficulty::Hard, vec![])
            .await
            .unwrap();
        controller.grant_streak_protections(2).await.unwrap();

        controller
            .complete_habit_on(&id, day("2026-08-01"), ProtectionChoice::Spend)
            .await
            .unwrap();

        assert_eq!(controller.player().streak_protections, 2);
    }

    #[tokio::test]
    async fn test_add_xp_multi_level_jump() {
        let (mut controller, _remote) = signed_in();
        let bus = controller.bus().clone();
        let level_ups = counter(&bus, EventKind::LevelUp);

        // 165 + 180 + 10 crosses two thresholds in one award.
        controller.add_xp(355).await.unwrap();

        assert_eq!(controller.player().level, 3);
        assert_eq!(controller.player().xp, 10);
        assert_eq!(controller.player().total_xp_earned, 355);
        assert_eq!(level_ups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rank_up_event_on_threshold_level() {
        let (mut controller, _remote) = signed_in();
        let bus = controller.bus().clone();
        let rank_ups = counter(&bus, EventKind::RankUp);

        // Walk from level 1 to 10 (rank D threshold).
        while controller.player().level < 10 {
            let needed = formulas::xp_required_for_next_level(controller.player().level)
                - controller.player().xp;
            controller.add_xp(needed).await.unwrap();
        }

        assert_eq!(controller.player().rank(), crate::models::Rank::D);
        assert_eq!(rank_ups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remove_xp_floors_at_zero_and_keeps_level() {
        let (mut controller, _remote) = signed_in();
        controller.add_xp(200).await.unwrap(); // level 2, xp 35
        controller.remove_xp(1000).await.unwrap();

        assert_eq!(controller.player().xp, 0);
        assert_eq!(controller.player().level, 2);
        assert_eq!(controller.player().total_xp_earned, 200);
    }

    #[tokio::test]
    async fn test_invariant_holds_through_mixed_sequence() {
        let (mut controller, _remote) = signed_in();
        for amount in [10, 500, 3, 900, 42] {
            controller.add_xp(amount).await.unwrap();
            controller.remove_xp(amount / 2).await.unwrap();
            let player = controller.player();
            assert!(player.xp < formulas::xp_required_for_next_level(player.level));
        }
    }

    #[tokio::test]
    async fn test_completion_succeeds_while_offline() {
        let local = MemoryStore::new();
        let remote = MemoryRemote::new();
        let mut controller = ProgressionController::new(
            local.clone(),
            remote.clone(),
            SharedIdentity::new(Identity::User("u-1".to_string())),
            NotificationBus::new(),
        )
        .unwrap();
        let bus = controller.bus().clone();
        let failures = counter(&bus, EventKind::SyncFailed);

        let id = controller
            .create_habit("run", Difficulty::Normal, vec![])
            .await
            .unwrap();
        remote.set_online(false);

        let delta = controller
            .complete_habit_on(&id, day("2026-08-26"), ProtectionChoice::Decline)
            .await
            .unwrap();

        assert_eq!(delta, 11);
        assert_eq!(controller.sync_state(), SyncState::Offline);
        assert!(failures.load(Ordering::SeqCst) >= 1);

        // Local store carries the completion despite the remote failure.
        let habits = store::load_habits(&local).unwrap();
        assert!(habits[0].completed);
    }

    #[tokio::test]
    async fn test_local_store_failure_is_fatal_to_operation() {
        let local = MemoryStore::new();
        let mut controller = ProgressionController::new(
            local.clone(),
            MemoryRemote::new(),
            SharedIdentity::new(Identity::User("u-1".to_string())),
            NotificationBus::new(),
        )
        .unwrap();
        let id = controller
            .create_habit("run", Difficulty::Normal, vec![])
            .await
            .unwrap();

        local.set_fail_writes(true);
        let result = controller
            .complete_habit_on(&id, day("2026-08-26"), ProtectionChoice::Decline)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_create_habit_offline_keeps_local_id_until_reconcile() {
        let (mut controller, remote) = signed_in();
        remote.set_online(false);

        let id = controller
            .create_habit("run", Difficulty::Normal, vec![])
            .await
            .unwrap();
        assert!(id.is_local());

        remote.set_online(true);
        let report = controller.reconcile().await.unwrap();
        assert_eq!(report.created_remotely, 1);

        let habits = controller.habits();
        assert_eq!(habits.len(), 1);
        assert!(!habits[0].id.is_local());
        assert_eq!(remote.habit_count(), 1);
    }

    #[tokio::test]
    async fn test_sign_in_folds_anonymous_habits() {
        let identity = SharedIdentity::anonymous();
        let remote = MemoryRemote::new();
        let mut controller = ProgressionController::new(
            MemoryStore::new(),
            remote.clone(),
            identity.clone(),
            NotificationBus::new(),
        )
        .unwrap();

        let id = controller
            .create_habit("run", Difficulty::Normal, vec![])
            .await
            .unwrap();
        assert_eq!(controller.habit(&id).unwrap().owner, ANONYMOUS_OWNER);

        identity.set(Identity::User("u-1".to_string()));
        let report = controller.refresh_identity().await.unwrap().unwrap();
        assert_eq!(report.created_remotely, 1);

        let habits = controller.habits();
        assert_eq!(habits[0].owner, "u-1");
        assert!(!habits[0].id.is_local());
        assert_eq!(remote.habits_by_user("u-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_identity_noop_without_transition() {
        let (mut controller, _remote) = signed_in();
        assert!(controller.refresh_identity().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_edit_habit_content_only() {
        let (mut controller, remote) = signed_in();
        let id = controller
            .create_habit("run", Difficulty::Normal, vec![])
            .await
            .unwrap();

        controller
            .edit_habit(
                &id,
                EditHabit {
                    name: Some("morning run".to_string()),
                    tags: Some(vec!["health".to_string()]),
                    difficulty: Some(Difficulty::Epic),
                },
            )
            .await
            .unwrap();

        let habit = controller.habit(&id).unwrap();
        assert_eq!(habit.name, "morning run");
        assert_eq!(habit.tags, vec!["health".to_string()]);
        assert_eq!(habit.difficulty, Difficulty::Epic);

        // Write-through reached the remote copy too.
        let remote_copy = remote.habits_by_user("u-1").await.unwrap();
        assert_eq!(remote_copy[0].name, "morning run");
    }

    #[tokio::test]
    async fn test_delete_habit_removes_both_copies() {
        let (mut controller, remote) = signed_in();
        let id = controller
            .create_habit("run", Difficulty::Normal, vec![])
            .await
            .unwrap();

        controller.delete_habit(&id).await.unwrap();
        assert!(controller.habits().is_empty());
        assert_eq!(remote.habit_count(), 0);

        assert!(matches!(
            controller.delete_habit(&id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_record_time_accrues() {
        let (mut controller, _remote) = signed_in();
        let id = controller
            .create_habit("practice", Difficulty::Normal, vec![])
            .await
            .unwrap();

        controller.record_time(&id, 25).await.unwrap();
        controller.record_time(&id, 25).await.unwrap();
        assert_eq!(controller.habit(&id).unwrap().time_spent, 50);
    }

    #[tokio::test]
    async fn test_create_habit_rejects_blank_name() {
        let (mut controller, _remote) = signed_in();
        assert!(matches!(
            controller.create_habit("   ", Difficulty::Easy, vec![]).await,
            Err(Error::InvalidInput(_))
        ));
    }
}
