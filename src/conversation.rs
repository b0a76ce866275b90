//! Conversation Store
//!
//! In-memory history of exchanged turns, keyed by participant id.
//!
//! The store is append-only and never prunes entries, so memory grows with
//! every recorded message for the lifetime of the process. Sustained traffic
//! will eventually exhaust memory; there is no size cap or expiry.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single exchanged utterance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    role: Role,
    content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Point-in-time copy of the whole store, ordered by participant id
pub type ConversationSnapshot = BTreeMap<String, Vec<Turn>>;

/// Aggregate counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConversationStats {
    pub participants: usize,
    pub turns: usize,
}

/// Conversation store guarded by a single lock
///
/// Appends take the write lock and reads take the read lock, so a reader
/// never observes a partially appended turn and concurrent appends to the
/// same participant never lose updates.
#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: RwLock<BTreeMap<String, Vec<Turn>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn, creating the participant's conversation if needed
    pub fn append(&self, participant_id: &str, turn: Turn) {
        let mut conversations = self.conversations.write();
        let conversation = conversations.entry(participant_id.to_string()).or_default();
        conversation.push(turn);
        debug!(
            "Appended turn for {} (now {} turns)",
            participant_id,
            conversation.len()
        );
    }

    /// Get a participant's conversation, empty if there is none
    pub fn get(&self, participant_id: &str) -> Vec<Turn> {
        self.conversations
            .read()
            .get(participant_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Owned copy of every conversation
    pub fn snapshot(&self) -> ConversationSnapshot {
        self.conversations.read().clone()
    }

    pub fn participant_count(&self) -> usize {
        self.conversations.read().len()
    }

    pub fn turn_count(&self) -> usize {
        self.conversations.read().values().map(Vec::len).sum()
    }

    /// Participant and turn totals, read under one lock
    pub fn stats(&self) -> ConversationStats {
        let conversations = self.conversations.read();
        ConversationStats {
            participants: conversations.len(),
            turns: conversations.values().map(Vec::len).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_append_and_get() {
        let store = ConversationStore::new();

        store.append("U1", Turn::user("Hello, my name is Max"));
        store.append("U1", Turn::user("What's my name?"));

        let history = store.get("U1");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content(), "Hello, my name is Max");
        assert_eq!(history[1], Turn::user("What's my name?"));
    }

    #[test]
    fn test_append_preserves_prior_turns() {
        let store = ConversationStore::new();
        store.append("U1", Turn::user("first"));
        store.append("U1", Turn::assistant("second"));
        let before = store.get("U1");

        store.append("U1", Turn::user("third"));

        let after = store.get("U1");
        assert_eq!(&after[..before.len()], &before[..]);
        assert_eq!(after.last(), Some(&Turn::user("third")));
    }

    #[test]
    fn test_get_unknown_is_empty() {
        let store = ConversationStore::new();
        assert!(store.get("nobody").is_empty());
        assert_eq!(store.participant_count(), 0);
    }

    #[test]
    fn test_multi_participant_isolation() {
        let store = ConversationStore::new();
        store.append("U1", Turn::user("Chat 1 message"));
        store.append("U2", Turn::user("Chat 2 message"));

        assert_eq!(store.get("U1"), vec![Turn::user("Chat 1 message")]);
        assert_eq!(store.get("U2"), vec![Turn::user("Chat 2 message")]);
        assert_eq!(
            store.stats(),
            ConversationStats {
                participants: 2,
                turns: 2
            }
        );
    }

    #[test]
    fn test_snapshot_is_detached() {
        let store = ConversationStore::new();
        store.append("U1", Turn::user("one"));

        let mut snapshot = store.snapshot();
        snapshot.get_mut("U1").unwrap().push(Turn::user("injected"));
        snapshot.insert("U9".to_string(), vec![]);

        assert_eq!(store.get("U1").len(), 1);
        assert_eq!(store.participant_count(), 1);
    }

    #[test]
    fn test_turn_serializes_lowercase_role() {
        let json = serde_json::to_value(Turn::user("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hi"}));

        let json = serde_json::to_value(Turn::assistant("yo")).unwrap();
        assert_eq!(json["role"], "assistant");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_are_not_lost() {
        let store = Arc::new(ConversationStore::new());
        let mut handles = Vec::new();

        for task in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    store.append("U1", Turn::user(format!("{}-{}", task, i)));
                }
            }));
        }

        let reader = {
            let store = store.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    let snapshot = store.snapshot();
                    if let Some(turns) = snapshot.get("U1") {
                        assert!(turns.iter().all(|t| t.role() == Role::User));
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        for handle in handles {
            handle.await.unwrap();
        }
        reader.await.unwrap();

        assert_eq!(store.get("U1").len(), 400);
        assert_eq!(store.turn_count(), 400);
    }
}
