//! Sync conflict model

use serde::{Deserialize, Serialize};

use super::{Habit, HabitId, PlayerState};

/// Which side of a divergence won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictResolution {
    /// Remote copy was kept
    RemoteWins,
    /// Local copy was kept
    LocalWins,
}

/// The diverged entity, carrying both versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictEntity {
    Habit {
        id: HabitId,
        local: Box<Habit>,
        remote: Box<Habit>,
    },
    Player {
        local: Box<PlayerState>,
        remote: Box<PlayerState>,
    },
}

/// A divergence between the local and remote copy of an entity, discovered
/// during reconciliation. Transient: reported to the caller and surfaced via
/// notifications, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConflict {
    /// Both versions of the diverged entity
    pub entity: ConflictEntity,
    /// Resolution applied
    pub resolution: ConflictResolution,
    /// Resolution timestamp (Unix ms)
    pub resolved_at: i64,
}

impl SyncConflict {
    /// Record a habit content conflict.
    #[must_use]
    pub fn habit(local: Habit, remote: Habit, resolution: ConflictResolution) -> Self {
        Self {
            entity: ConflictEntity::Habit {
                id: remote.id.clone(),
                local: Box::new(local),
                remote: Box::new(remote),
            },
            resolution,
            resolved_at: crate::util::unix_ms_now(),
        }
    }

    /// Record a player-state divergence.
    #[must_use]
    pub fn player(local: PlayerState, remote: PlayerState, resolution: ConflictResolution) -> Self {
        Self {
            entity: ConflictEntity::Player {
                local: Box::new(local),
                remote: Box::new(remote),
            },
            resolution,
            resolved_at: crate::util::unix_ms_now(),
        }
    }
}
