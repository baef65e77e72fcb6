use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use teloxide::types::{ChatId, MessageId};
use tokio::sync::Mutex;

use crate::flow::{CreateBudgetFlow, JoinFlow};

/// Sessions idle for longer than this are forgotten.
pub(crate) const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) enum Conversation {
    #[default]
    Idle,
    CreateBudget(CreateBudgetFlow),
    JoinBudget(JoinFlow),
}

#[derive(Clone, Debug)]
pub(crate) struct Session {
    /// Message edited in place by callback navigation.
    pub hub_message_id: Option<MessageId>,
    pub conversation: Conversation,
    touched_at: Instant,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            hub_message_id: None,
            conversation: Conversation::Idle,
            touched_at: Instant::now(),
        }
    }
}

/// In-memory per-chat state.
///
/// Expired entries are dropped when they are next accessed, and every write
/// sweeps the expired entries of other chats.
#[derive(Clone)]
pub(crate) struct SessionStore {
    inner: Arc<Mutex<HashMap<ChatId, Session>>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

impl SessionStore {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    pub(crate) async fn get(&self, chat_id: ChatId) -> Session {
        let mut guard = self.inner.lock().await;
        match guard.get(&chat_id) {
            Some(session) if !self.is_expired(session) => session.clone(),
            Some(_) => {
                tracing::debug!(chat_id = chat_id.0, "session expired");
                guard.remove(&chat_id);
                Session::default()
            }
            None => Session::default(),
        }
    }

    pub(crate) async fn update<F>(&self, chat_id: ChatId, f: F) -> Session
    where
        F: FnOnce(&mut Session),
    {
        let mut guard = self.inner.lock().await;
        let before = guard.len();
        guard.retain(|_, session| !self.is_expired(session));
        if guard.len() < before {
            tracing::debug!(evicted = before - guard.len(), "expired sessions swept");
        }
        let session = guard.entry(chat_id).or_default();
        f(session);
        session.touched_at = Instant::now();
        session.clone()
    }

    /// Drop the conversation, keeping the hub message.
    pub(crate) async fn reset(&self, chat_id: ChatId) {
        self.update(chat_id, |s| s.conversation = Conversation::Idle)
            .await;
    }

    /// Forget both the conversation and the hub message.
    pub(crate) async fn discard(&self, chat_id: ChatId) {
        self.update(chat_id, |s| {
            s.conversation = Conversation::Idle;
            s.hub_message_id = None;
        })
        .await;
    }

    fn is_expired(&self, session: &Session) -> bool {
        session.touched_at.elapsed() >= self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::JoinFlow;

    const CHAT: ChatId = ChatId(42);

    #[tokio::test]
    async fn update_then_get() {
        let store = SessionStore::default();
        store
            .update(CHAT, |s| {
                s.conversation = Conversation::JoinBudget(JoinFlow::AwaitToken);
                s.hub_message_id = Some(MessageId(7));
            })
            .await;

        let session = store.get(CHAT).await;
        assert_eq!(
            session.conversation,
            Conversation::JoinBudget(JoinFlow::AwaitToken)
        );
        assert_eq!(session.hub_message_id, Some(MessageId(7)));
        assert_eq!(store.get(ChatId(1)).await.conversation, Conversation::Idle);
    }

    #[tokio::test]
    async fn expired_session_is_forgotten() {
        let store = SessionStore::new(Duration::ZERO);
        store
            .update(CHAT, |s| {
                s.conversation = Conversation::CreateBudget(CreateBudgetFlow::default());
            })
            .await;

        let session = store.get(CHAT).await;
        assert_eq!(session.conversation, Conversation::Idle);
        assert!(store.inner.lock().await.is_empty());
    }

    #[tokio::test]
    async fn discard_drops_conversation_and_hub() {
        let store = SessionStore::default();
        store
            .update(CHAT, |s| {
                s.conversation = Conversation::CreateBudget(CreateBudgetFlow::default());
                s.hub_message_id = Some(MessageId(5));
            })
            .await;
        store.discard(CHAT).await;

        let session = store.get(CHAT).await;
        assert_eq!(session.conversation, Conversation::Idle);
        assert_eq!(session.hub_message_id, None);
    }

    #[tokio::test]
    async fn writing_one_chat_evicts_expired_others() {
        let store = SessionStore::new(Duration::ZERO);
        store
            .update(ChatId(1), |s| {
                s.conversation = Conversation::JoinBudget(JoinFlow::AwaitToken);
            })
            .await;
        store.update(ChatId(2), |_| {}).await;

        let sessions = store.inner.lock().await;
        assert_eq!(sessions.len(), 1);
        assert!(sessions.contains_key(&ChatId(2)));
    }

    #[tokio::test]
    async fn fresh_sessions_survive_the_sweep() {
        let store = SessionStore::default();
        store.update(ChatId(1), |_| {}).await;
        store.update(ChatId(2), |_| {}).await;

        assert_eq!(store.inner.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn reset_keeps_hub_message() {
        let store = SessionStore::default();
        store
            .update(CHAT, |s| {
                s.conversation = Conversation::JoinBudget(JoinFlow::AwaitToken);
                s.hub_message_id = Some(MessageId(3));
            })
            .await;
        store.reset(CHAT).await;

        let session = store.get(CHAT).await;
        assert_eq!(session.conversation, Conversation::Idle);
        assert_eq!(session.hub_message_id, Some(MessageId(3)));
    }
}
