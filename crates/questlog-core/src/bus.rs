//! Process-wide notification bus.
//!
//! A single publish/subscribe channel decoupling the progression core from
//! whatever renders it. Delivery is synchronous within the publishing call,
//! at-most-once per publish, and never replayed: a subscriber that joins
//! after a publish simply does not see it. Authoritative state stays
//! re-derivable from the player/habit snapshots, so missed notifications
//! lose nothing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::models::Rank;

/// A progression or sync notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Event {
    /// XP changed by `delta` (negative on un-completion refunds).
    XpChanged { xp: u64, level: u32, delta: i64 },
    /// Player reached a new level.
    LevelUp { level: u32 },
    /// Player reached a new rank.
    RankUp { rank: Rank },
    /// A reconciliation pass finished cleanly.
    SyncCompleted { conflicts: usize },
    /// Remote propagation or a reconciliation pass failed; local state is
    /// unaffected.
    SyncFailed { reason: String },
}

impl Event {
    /// The subscription key for this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::XpChanged { .. } => EventKind::XpChanged,
            Self::LevelUp { .. } => EventKind::LevelUp,
            Self::RankUp { .. } => EventKind::RankUp,
            Self::SyncCompleted { .. } => EventKind::SyncCompleted,
            Self::SyncFailed { .. } => EventKind::SyncFailed,
        }
    }
}

/// Event kinds subscribers can register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    XpChanged,
    LevelUp,
    RankUp,
    SyncCompleted,
    SyncFailed,
}

/// Token returned by [`NotificationBus::subscribe`]; pass it back to
/// [`NotificationBus::unsubscribe`] to stop receiving events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
struct BusInner {
    next_id: u64,
    subscribers: HashMap<EventKind, Vec<(SubscriptionId, Handler)>>,
}

/// Shared publish/subscribe channel. Cloning is cheap and clones observe the
/// same subscriber registry.
#[derive(Clone, Default)]
pub struct NotificationBus {
    inner: Arc<Mutex<BusInner>>,
}

impl NotificationBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of `kind`.
    pub fn subscribe(
        &self,
        kind: EventKind,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.next_id += 1;
        let id = SubscriptionId(inner.next_id);
        inner
            .subscribers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a subscription. Returns false when the token was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut removed = false;
        for handlers in inner.subscribers.values_mut() {
            let before = handlers.len();
            handlers.retain(|(handler_id, _)| *handler_id != id);
            removed |= handlers.len() != before;
        }
        removed
    }

    /// Deliver `event` to every current subscriber of its kind.
    ///
    /// Handlers run outside the registry lock, so a handler may subscribe or
    /// unsubscribe; changes take effect from the next publish.
    pub fn publish(&self, event: &Event) {
        let handlers: Vec<Handler> = {
            let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner
                .subscribers
                .get(&event.kind())
                .map(|handlers| handlers.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default()
        };
        for handler in handlers {
            handler(event);
        }
    }
}
