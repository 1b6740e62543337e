//! Reconciliation engine.
//!
//! Merges the local and remote copies of the habit collection and player
//! state into one consistent result without losing completions or
//! double-counting XP. Passes are idempotent and safe to run redundantly:
//! cross-device event ordering cannot be assumed, so the merge rules are
//! commutative where it matters and a converged pair of stores comes out
//! unchanged.

use tracing::{debug, info, warn};

use crate::bus::{Event, NotificationBus};
use crate::error::Result;
use crate::models::{ConflictResolution, Habit, HabitId, PlayerState, SyncConflict};
use crate::remote::{RemoteError, RemoteStore};
use crate::store::{self, LocalStore};

/// Connectivity and convergence status after a reconciliation pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    /// Remote store unreachable; operated against the local store only.
    Offline,
    /// A pass is in flight.
    Syncing,
    /// Last pass converged cleanly.
    Synced,
    /// Last pass hit a non-connectivity remote failure.
    Error,
}

/// Outcome of one reconciliation pass.
#[derive(Debug)]
pub struct SyncReport {
    pub state: SyncState,
    /// Divergences resolved during the pass.
    pub conflicts: Vec<SyncConflict>,
    /// Not-yet-synced local creations accepted by the remote store.
    pub created_remotely: usize,
    /// Local creations the remote store rejected; retained locally and
    /// retried on the next pass.
    pub deferred_creations: usize,
}

impl SyncReport {
    /// An empty report for a pass that did no merging: no signed-in user,
    /// or the remote store failed before any work.
    #[must_use]
    pub fn skipped(state: SyncState) -> Self {
        Self {
            state,
            conflicts: Vec::new(),
            created_remotely: 0,
            deferred_creations: 0,
        }
    }
}

/// Result of the pure habit merge, before any remote writes.
#[derive(Debug)]
pub struct HabitMerge {
    /// Merged collection, remote entries first.
    pub habits: Vec<Habit>,
    /// Same-identifier content divergences, resolved remote-wins.
    pub conflicts: Vec<SyncConflict>,
    /// Identifiers of local creations not yet accepted remotely.
    pub pending_creations: Vec<HabitId>,
}

/// Merge two copies of the habit collection.
///
/// Remote is the source of truth for identifier assignment: remote entries
/// go in first, local entries whose identifier is unknown remotely are kept
/// as-is, and entries carrying a locally generated identifier are flagged
/// for remote creation. Content conflicts on a shared identifier prefer the
/// remote copy, recording a [`SyncConflict`] so the discarded local edit is
/// at least observable.
#[must_use]
pub fn merge_habits(local: &[Habit], remote: &[Habit]) -> HabitMerge {
    let mut habits: Vec<Habit> = Vec::with_capacity(remote.len() + local.len());
    let mut conflicts = Vec::new();
    let mut pending_creations = Vec::new();

    habits.extend(remote.iter().cloned());

    for local_habit in local {
        if let Some(remote_habit) = remote.iter().find(|r| r.id == local_habit.id) {
            if !remote_habit.content_eq(local_habit) {
                conflicts.push(SyncConflict::habit(
                    local_habit.clone(),
                    remote_habit.clone(),
                    ConflictResolution::RemoteWins,
                ));
            }
            continue;
        }

        if local_habit.id.is_local() {
            pending_creations.push(local_habit.id.clone());
        }
        habits.push(local_habit.clone());
    }

    HabitMerge {
        habits,
        conflicts,
        pending_creations,
    }
}

/// Merge two copies of player state.
///
/// Monotonic counters take the max of both sides. `level` and `xp` move
/// jointly: the pair with the greater implied progress wins (level first,
/// xp as tie-break), never independent maxima, which could pair an xp value
/// invalid for the winning level. The invariant is re-normalized afterwards
/// regardless.
#[must_use]
pub fn merge_player(local: &PlayerState, remote: &PlayerState) -> PlayerState {
    let (level, xp) = if (local.level, local.xp) >= (remote.level, remote.xp) {
        (local.level, local.xp)
    } else {
        (remote.level, remote.xp)
    };

    let mut merged = PlayerState {
        level,
        xp,
        total_xp_earned: local.total_xp_earned.max(remote.total_xp_earned),
        longest_streak: local.longest_streak.max(remote.longest_streak),
        streak_protections: local.streak_protections.max(remote.streak_protections),
        last_updated: local.last_updated.max(remote.last_updated),
    };
    merged.normalize();
    merged
}

/// Detect a player-state divergence worth reporting.
///
/// The monotonic counters merge losslessly and are never in conflict; only a
/// `(level, xp)` disagreement is, because [`merge_player`] keeps one side's
/// pair wholesale and discards the other's. The resolution names the side
/// whose pair was kept.
#[must_use]
pub fn player_conflict(local: &PlayerState, remote: &PlayerState) -> Option<SyncConflict> {
    if (local.level, local.xp) == (remote.level, remote.xp) {
        return None;
    }
    let resolution = if (local.level, local.xp) > (remote.level, remote.xp) {
        ConflictResolution::LocalWins
    } else {
        ConflictResolution::RemoteWins
    };
    Some(SyncConflict::player(
        local.clone(),
        remote.clone(),
        resolution,
    ))
}

/// Runs reconciliation passes against a local/remote store pair.
pub struct Reconciler<'a, L, R> {
    local: &'a L,
    remote: &'a R,
    bus: &'a NotificationBus,
}

impl<'a, L: LocalStore, R: RemoteStore> Reconciler<'a, L, R> {
    pub const fn new(local: &'a L, remote: &'a R, bus: &'a NotificationBus) -> Self {
        Self { local, remote, bus }
    }

    /// Run one pass for `user_id`.
    ///
    /// Errors only on local-store failure. Remote failures end the pass
    /// early with an `Offline`/`Error` report and a `sync-failed`
    /// notification; the local snapshot is left exactly as it was.
    pub async fn run(&self, user_id: &str) -> Result<SyncReport> {
        let local_habits = store::load_habits(self.local)?;
        let local_player = store::load_player(self.local)?;

        let remote_habits = match self.remote.habits_by_user(user_id).await {
            Ok(habits) => habits,
            Err(error) => return Ok(self.remote_failure("fetch habits", &error)),
        };
        let remote_player = match self.remote.player_state(user_id).await {
            Ok(state) => state,
            Err(error) => return Ok(self.remote_failure("fetch player state", &error)),
        };

        let mut merge = merge_habits(&local_habits, &remote_habits);
        debug!(
            habits = merge.habits.len(),
            conflicts = merge.conflicts.len(),
            pending = merge.pending_creations.len(),
            "merged habit collections"
        );

        // Push not-yet-synced creations. Each accepted habit swaps its local
        // identifier for the server-issued one in the merged result, never
        // leaving both entries. Rejected ones stay local-id and retry next
        // pass.
        let mut created_remotely = 0;
        let mut deferred_creations = 0;
        for pending_id in &merge.pending_creations {
            let Some(entry) = merge.habits.iter_mut().find(|h| &h.id == pending_id) else {
                continue;
            };
            entry.owner = user_id.to_string();
            match self.remote.create_habit(entry).await {
                Ok(remote_id) => {
                    entry.id = remote_id;
                    created_remotely += 1;
                }
                Err(error) => {
                    warn!(id = %pending_id, %error, "deferring habit creation");
                    deferred_creations += 1;
                }
            }
        }

        let merged_player = match remote_player {
            Some(remote_state) => {
                if let Some(conflict) = player_conflict(&local_player, &remote_state) {
                    merge.conflicts.push(conflict);
                }
                merge_player(&local_player, &remote_state)
            }
            None => local_player,
        };

        // Canonical identifier order, so a redundant pass over an already
        // converged pair rewrites a byte-identical snapshot.
        merge.habits.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        store::save_habits(self.local, &merge.habits)?;
        store::save_player(self.local, &merged_player)?;

        // Best-effort: remote gets the merged player state for cross-device
        // continuity, but a failure here never rolls back the local write.
        let mut state = SyncState::Synced;
        if let Err(error) = self.remote.set_player_state(user_id, &merged_player).await {
            warn!(%error, "failed to push merged player state");
            state = Self::failure_state(&error);
        }

        if state == SyncState::Synced {
            info!(
                conflicts = merge.conflicts.len(),
                created = created_remotely,
                deferred = deferred_creations,
                "reconciliation completed"
            );
            self.bus.publish(&Event::SyncCompleted {
                conflicts: merge.conflicts.len(),
            });
        } else {
            self.bus.publish(&Event::SyncFailed {
                reason: "failed to push merged player state".to_string(),
            });
        }

        Ok(SyncReport {
            state,
            conflicts: merge.conflicts,
            created_remotely,
            deferred_creations,
        })
    }

    fn remote_failure(&self, stage: &str, error: &RemoteError) -> SyncReport {
        warn!(stage, %error, "reconciliation aborted, local store untouched");
        self.bus.publish(&Event::SyncFailed {
            reason: format!("{stage}: {error}"),
        });
        SyncReport::skipped(Self::failure_state(error))
    }

    const fn failure_state(error: &RemoteError) -> SyncState {
        match error {
            RemoteError::Unavailable(_) => SyncState::Offline,
            _ => SyncState::Error,
        }
    }
}
