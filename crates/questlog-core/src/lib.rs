//! questlog-core - Core library for Questlog
//!
//! The player progression and state reconciliation engine behind a gamified
//! habit tracker: deterministic XP/level/rank/streak formulas, a
//! write-through local store with best-effort remote propagation, a
//! conflict-resolving reconciliation engine, and a notification bus the UI
//! layers subscribe to. Rendering, auth flows, and the backing document
//! service live elsewhere and talk to this crate through the adapter traits.

pub mod bus;
pub mod controller;
pub mod error;
pub mod formulas;
pub mod identity;
pub mod models;
pub mod remote;
pub mod store;
pub mod streak;
pub mod sync;
pub mod util;

pub use bus::{Event, EventKind, NotificationBus, SubscriptionId};
pub use controller::{EditHabit, ProgressionController, ProtectionChoice};
pub use error::{Error, Result};
pub use identity::{Identity, IdentityProvider, SharedIdentity};
pub use models::{Difficulty, Habit, HabitId, PlayerState, Rank, SyncConflict};
pub use sync::{SyncReport, SyncState};
