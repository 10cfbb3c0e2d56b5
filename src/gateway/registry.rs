//! The set of live sessions.
//!
//! [`SessionRegistry`] maps session IDs to [`Session`]s behind a
//! [`std::sync::RwLock`]. No lock is ever held across an `.await`, so the
//! registry can be walked synchronously from bus callbacks.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use super::session::{ConnectionHandle, Session, SessionId};
use crate::auth::Identity;

/// Concurrent store of live sessions, looked up by ID only.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new session for an authenticated connection.
    pub fn create(&self, connection: ConnectionHandle, identity: Identity) -> Arc<Session> {
        let session = Arc::new(Session::new(connection, identity));
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.id(), Arc::clone(&session));
        session
    }

    /// Removes a session and returns the channels it held.
    ///
    /// Returns `None` if the session was already gone.
    pub fn remove(&self, id: SessionId) -> Option<HashSet<String>> {
        let session = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)?;
        Some(session.take_channels())
    }

    /// Calls `f` for every session holding `channel`.
    ///
    /// The registry is read-locked for the whole walk: sessions cannot be
    /// added or removed while `f` runs.
    pub fn for_each_subscriber(&self, channel: &str, mut f: impl FnMut(&Session)) {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        for session in sessions.values() {
            if session.holds(channel) {
                f(session);
            }
        }
    }

    /// Number of sessions holding `channel`.
    #[cfg(test)]
    pub(crate) fn subscriber_count(&self, channel: &str) -> usize {
        let mut count = 0usize;
        self.for_each_subscriber(channel, |_| count += 1);
        count
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if no session is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn identity(subject: &str) -> Identity {
        Identity {
            subject: subject.into(),
            scopes: vec![],
        }
    }

    #[test]
    fn create_assigns_unique_ids() {
        let registry = SessionRegistry::new();
        let (c1, _r1) = ConnectionHandle::channel();
        let (c2, _r2) = ConnectionHandle::channel();
        let a = registry.create(c1, identity("a"));
        let b = registry.create(c2, identity("a"));
        assert_ne!(a.id(), b.id());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.subscriber_count("none"), 0);
    }

    #[test]
    fn remove_returns_held_channels() {
        let registry = SessionRegistry::new();
        let (conn, _rx) = ConnectionHandle::channel();
        let session = registry.create(conn, identity("a"));
        session.hold("tasks");
        session.hold("alerts");

        let Some(channels) = registry.remove(session.id()) else {
            panic!("session should exist");
        };
        assert_eq!(channels.len(), 2);
        assert!(channels.contains("tasks"));
        assert!(registry.is_empty());
        assert!(registry.remove(session.id()).is_none());
    }

    #[test]
    fn for_each_subscriber_filters_by_channel() {
        let registry = SessionRegistry::new();
        let (c1, _r1) = ConnectionHandle::channel();
        let (c2, _r2) = ConnectionHandle::channel();
        let a = registry.create(c1, identity("a"));
        let b = registry.create(c2, identity("b"));
        a.hold("tasks");
        b.hold("alerts");

        let mut seen = Vec::new();
        registry.for_each_subscriber("tasks", |s| seen.push(s.id()));
        assert_eq!(seen, vec![a.id()]);
        assert_eq!(registry.subscriber_count("alerts"), 1);
        assert_eq!(registry.subscriber_count("none"), 0);
    }
}
