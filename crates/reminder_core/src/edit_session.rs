//! crates/reminder_core/src/edit_session.rs
//!
//! In-memory implementation of the `EditSessionStore` port.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::{EditSession, OwnerId};
use crate::ports::EditSessionStore;

/// Edit sessions keyed by owner, behind one reader/writer lock.
#[derive(Debug, Default)]
pub struct InMemoryEditSessions {
    sessions: RwLock<HashMap<OwnerId, EditSession>>,
}

impl InMemoryEditSessions {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EditSessionStore for InMemoryEditSessions {
    async fn set(&self, owner_id: OwnerId, session: EditSession) {
        self.sessions.write().await.insert(owner_id, session);
    }

    async fn get(&self, owner_id: OwnerId) -> Option<EditSession> {
        self.sessions.read().await.get(&owner_id).copied()
    }

    async fn clear(&self, owner_id: OwnerId) {
        self.sessions.write().await.remove(&owner_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EditAction;
    use std::sync::Arc;

    #[tokio::test]
    async fn set_get_clear() {
        let sessions = InMemoryEditSessions::new();
        assert_eq!(sessions.get(1).await, None);

        sessions.set(1, EditSession::edit(7)).await;
        let session = sessions.get(1).await.unwrap();
        assert_eq!(session.action, EditAction::Edit);
        assert_eq!(session.target_reminder_id, 7);

        sessions.clear(1).await;
        assert_eq!(sessions.get(1).await, None);
    }

    #[tokio::test]
    async fn new_request_overwrites_previous_session() {
        let sessions = InMemoryEditSessions::new();
        sessions.set(1, EditSession::edit(7)).await;
        sessions.set(1, EditSession::edit(9)).await;
        assert_eq!(sessions.get(1).await, Some(EditSession::edit(9)));
    }

    #[tokio::test]
    async fn owners_are_isolated() {
        let sessions = Arc::new(InMemoryEditSessions::new());
        let handles: Vec<_> = (1..=8)
            .map(|owner| {
                let sessions = sessions.clone();
                tokio::spawn(async move { sessions.set(owner, EditSession::edit(owner * 10)).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        sessions.clear(3).await;
        assert_eq!(sessions.get(3).await, None);
        assert_eq!(sessions.get(4).await, Some(EditSession::edit(40)));
    }
}
