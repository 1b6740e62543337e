//! Identity provider boundary.
//!
//! The auth system itself is an external collaborator; the core only needs
//! to know who the current user is, and to notice the anonymous-to-signed-in
//! transition that triggers folding local data into the account.

use std::sync::{Arc, Mutex, PoisonError};

/// Owner identifier used for habits created before sign-in.
pub const ANONYMOUS_OWNER: &str = "anonymous";

/// The current user as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    User(String),
}

impl Identity {
    /// The user identifier, if signed in.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::User(id) => Some(id.as_str()),
        }
    }

    /// Owner string habits created under this identity carry.
    #[must_use]
    pub fn owner_id(&self) -> &str {
        self.user_id().unwrap_or(ANONYMOUS_OWNER)
    }

    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

/// Source of the current identity.
pub trait IdentityProvider {
    fn current_identity(&self) -> Identity;
}

/// Shared, swappable identity handle.
///
/// Embeds the auth provider's session state for the core: the host flips it
/// on sign-in/sign-out and the controller observes transitions through
/// [`IdentityProvider::current_identity`]. Also the natural test double.
#[derive(Clone)]
pub struct SharedIdentity {
    inner: Arc<Mutex<Identity>>,
}

impl SharedIdentity {
    #[must_use]
    pub fn new(identity: Identity) -> Self {
        Self {
            inner: Arc::new(Mutex::new(identity)),
        }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(Identity::Anonymous)
    }

    /// Replace the current identity (sign-in or sign-out).
    pub fn set(&self, identity: Identity) {
        *self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = identity;
    }
}

impl IdentityProvider for SharedIdentity {
    fn current_identity(&self) -> Identity {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
