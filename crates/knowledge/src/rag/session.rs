//! Bounded per-session conversation history.

use crate::rag::types::{Turn, TurnRole};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

type History = Arc<Mutex<Vec<Turn>>>;

/// Exclusive hold on one session's history.
///
/// Other queries in the same session wait until the guard is dropped;
/// sessions other than this one are unaffected.
pub struct SessionGuard {
    turns: OwnedMutexGuard<Vec<Turn>>,
    max_history: usize,
}

impl SessionGuard {
    /// Retained turns, oldest first.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Append a user query and the assistant's answer as one unit.
    pub fn record_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.turns.push(Turn::user(user));
        self.turns.push(Turn::assistant(assistant));
        evict(&mut self.turns, self.max_history);
    }
}

/// In-memory conversation histories keyed by session id.
///
/// Each session keeps at most `2 * max_history` turns; the oldest
/// user/assistant pair is dropped first. The map lock is only held to look
/// up or insert a session, so different sessions never contend.
#[derive(Debug)]
pub struct SessionStore {
    max_history: usize,
    sessions: RwLock<HashMap<String, History>>,
}

impl SessionStore {
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new, empty session and return its id.
    pub async fn create(&self) -> String {
        let id = format!("session_{}", uuid::Uuid::new_v4());
        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(Vec::new())));
        tracing::debug!(session = %id, "Created session");
        id
    }

    async fn history(&self, session_id: &str) -> History {
        if let Some(history) = self.sessions.read().await.get(session_id) {
            return history.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(session = session_id, "Adopting unknown session id");
                Arc::new(Mutex::new(Vec::new()))
            })
            .clone()
    }

    /// Lock a session for a read-then-write cycle, adopting unknown ids.
    pub async fn lock(&self, session_id: &str) -> SessionGuard {
        SessionGuard {
            turns: self.history(session_id).await.lock_owned().await,
            max_history: self.max_history,
        }
    }

    /// Append one turn, evicting the oldest exchange while over the bound.
    pub async fn append(&self, session_id: &str, role: TurnRole, text: impl Into<String>) {
        let history = self.history(session_id).await;
        let mut turns = history.lock().await;
        turns.push(Turn {
            role,
            text: text.into(),
        });
        evict(&mut turns, self.max_history);
    }

    /// Append a user query and the assistant's answer as one unit.
    pub async fn append_exchange(
        &self,
        session_id: &str,
        user: impl Into<String>,
        assistant: impl Into<String>,
    ) {
        self.lock(session_id).await.record_exchange(user, assistant);
    }

    /// Retained turns, oldest first. Unknown ids have no history.
    pub async fn get_history(&self, session_id: &str) -> Vec<Turn> {
        let history = self.sessions.read().await.get(session_id).cloned();
        match history {
            Some(history) => history.lock().await.clone(),
            None => {
                tracing::debug!(session = session_id, "No history for unknown session");
                Vec::new()
            }
        }
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop every session.
    pub async fn reset(&self) {
        self.sessions.write().await.clear();
        tracing::info!("Cleared all sessions");
    }
}

/// Drop the oldest exchange while more than `2 * max_history` turns remain.
///
/// An exchange is a user turn and everything up to its answer. Turns ahead
/// of the first user turn have no question and go one at a time.
fn evict(turns: &mut Vec<Turn>, max_history: usize) {
    let limit = max_history * 2;
    while turns.len() > limit {
        let end = match turns.first().map(|t| t.role) {
            Some(TurnRole::User) => turns
                .iter()
                .skip(1)
                .position(|t| t.role == TurnRole::Assistant)
                .map(|i| i + 2)
                .unwrap_or(1),
            _ => 1,
        };
        turns.drain(..end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_returns_unique_prefixed_ids() {
        let store = SessionStore::new(2);
        let a = store.create().await;
        let b = store.create().await;

        assert!(a.starts_with("session_"));
        assert_ne!(a, b);
        assert_eq!(store.session_count().await, 2);
        assert!(store.get_history(&a).await.is_empty());
    }

    #[tokio::test]
    async fn test_history_is_bounded_by_pairs() {
        let store = SessionStore::new(2);
        let id = store.create().await;

        for i in 0..5 {
            store
                .append_exchange(&id, format!("q{}", i), format!("a{}", i))
                .await;
            assert!(store.get_history(&id).await.len() <= 4);
        }

        let history = store.get_history(&id).await;
        assert_eq!(
            history,
            vec![
                Turn::user("q3"),
                Turn::assistant("a3"),
                Turn::user("q4"),
                Turn::assistant("a4"),
            ]
        );
    }

    #[tokio::test]
    async fn test_single_turn_appends_keep_pairs_aligned() {
        let store = SessionStore::new(1);
        let id = store.create().await;

        store.append(&id, TurnRole::User, "q0").await;
        store.append(&id, TurnRole::Assistant, "a0").await;
        store.append(&id, TurnRole::User, "q1").await;
        assert_eq!(store.get_history(&id).await, vec![Turn::user("q1")]);

        store.append(&id, TurnRole::Assistant, "a1").await;
        assert_eq!(
            store.get_history(&id).await,
            vec![Turn::user("q1"), Turn::assistant("a1")]
        );
    }

    #[tokio::test]
    async fn test_eviction_skips_answer_without_question() {
        let store = SessionStore::new(1);
        let id = store.create().await;

        store.append(&id, TurnRole::Assistant, "a0").await;
        store.append(&id, TurnRole::User, "q1").await;
        store.append(&id, TurnRole::Assistant, "a1").await;

        assert_eq!(
            store.get_history(&id).await,
            vec![Turn::user("q1"), Turn::assistant("a1")]
        );
    }

    #[tokio::test]
    async fn test_lock_holds_session_until_dropped() {
        let store = SessionStore::new(2);
        let id = store.create().await;

        let mut guard = store.lock(&id).await;
        assert!(guard.turns().is_empty());
        guard.record_exchange("q", "a");
        drop(guard);

        assert_eq!(store.get_history(&id).await.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_id_is_adopted() {
        let store = SessionStore::new(2);
        assert!(store.get_history("session_elsewhere").await.is_empty());
        assert!(!store.contains("session_elsewhere").await);

        store.append_exchange("session_elsewhere", "hi", "hello").await;
        assert!(store.contains("session_elsewhere").await);
        assert_eq!(store.get_history("session_elsewhere").await.len(), 2);
    }

    #[tokio::test]
    async fn test_zero_history_retains_nothing() {
        let store = SessionStore::new(0);
        let id = store.create().await;
        store.append_exchange(&id, "q", "a").await;
        assert!(store.get_history(&id).await.is_empty());
    }

    #[tokio::test]
    async fn test_reset_drops_sessions() {
        let store = SessionStore::new(2);
        let id = store.create().await;
        store.append_exchange(&id, "q", "a").await;

        store.reset().await;
        assert_eq!(store.session_count().await, 0);
        assert!(store.get_history(&id).await.is_empty());
    }
}
