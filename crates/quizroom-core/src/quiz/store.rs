//! In-memory session store keyed by conversation.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::session::Session;
use crate::events::ConversationId;

/// At most one [`Session`] per conversation. Lives only in process memory.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<ConversationId, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConversationId, Session>> {
        // A panic while holding the lock leaves the map itself intact.
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert a session, replacing (and returning) any previous one.
    pub fn insert(&self, conversation: ConversationId, session: Session) -> Option<Session> {
        self.lock().insert(conversation, session)
    }

    pub fn remove(&self, conversation: ConversationId) -> Option<Session> {
        self.lock().remove(&conversation)
    }

    pub fn contains(&self, conversation: ConversationId) -> bool {
        self.lock().contains_key(&conversation)
    }

    /// Copy of the current session state.
    pub fn get(&self, conversation: ConversationId) -> Option<Session> {
        self.lock().get(&conversation).cloned()
    }

    /// Run `f` against the conversation's session while holding the lock.
    pub fn with_session<R>(
        &self,
        conversation: ConversationId,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Option<R> {
        self.lock().get_mut(&conversation).map(f)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::small_catalog;

    #[test]
    fn insert_replaces_existing_session() {
        let store = SessionStore::new();
        let catalog = small_catalog();
        let id = ConversationId(7);

        assert!(store.insert(id, Session::new("a", &catalog)).is_none());
        let previous = store.insert(id, Session::new("b", &catalog)).unwrap();
        assert_eq!(previous.participant(), "a");
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(id).unwrap().participant(), "b");
    }

    #[test]
    fn with_session_is_none_for_unknown_conversation() {
        let store = SessionStore::new();
        assert!(store.with_session(ConversationId(1), |_| ()).is_none());
        assert!(store.is_empty());
    }
}
