//! In-memory store: the volatile, per-session memory backend.

use async_trait::async_trait;
use dekomposit_core::error::MemoryError;
use dekomposit_core::memory::{HistoryTurn, MemoryLimits, MemoryNote, MemoryStore};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct State {
    notes: VecDeque<MemoryNote>,
    history: VecDeque<HistoryTurn>,
}

/// Notes and history held in two bounded queues.
///
/// Cloning shares the underlying state, so a tool and the agent can hold the
/// same store.
#[derive(Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
    limits: MemoryLimits,
}

impl InMemoryStore {
    pub fn new(limits: MemoryLimits) -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            limits,
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(MemoryLimits::default())
    }
}

fn push_bounded<T>(queue: &mut VecDeque<T>, item: T, capacity: usize) -> usize {
    queue.push_back(item);
    let mut evicted = 0;
    while queue.len() > capacity {
        queue.pop_front();
        evicted += 1;
    }
    evicted
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    fn name(&self) -> &str { "in_memory" }

    fn limits(&self) -> MemoryLimits {
        self.limits
    }

    async fn add_history(&self, turn: HistoryTurn) -> Result<(), MemoryError> {
        let mut state = self.state.write().await;
        let evicted = push_bounded(&mut state.history, turn, self.limits.max_history);
        if evicted > 0 {
            debug!(evicted, "History at capacity, dropped oldest turns");
        }
        Ok(())
    }

    async fn add_note(
        &self,
        text: &str,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<MemoryNote, MemoryError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(MemoryError::InvalidNote("note text is empty".into()));
        }
        let note = MemoryNote::new(text, metadata);
        let mut state = self.state.write().await;
        let evicted = push_bounded(&mut state.notes, note.clone(), self.limits.max_notes);
        if evicted > 0 {
            debug!(evicted, "Notes at capacity, dropped oldest notes");
        }
        Ok(note)
    }

    async fn notes(&self) -> Vec<MemoryNote> {
        self.state.read().await.notes.iter().cloned().collect()
    }

    async fn history(&self) -> Vec<HistoryTurn> {
        self.state.read().await.history.iter().cloned().collect()
    }

    async fn remove_note(&self, id_or_text: &str) -> Result<bool, MemoryError> {
        let needle = id_or_text.trim();
        let lowered = needle.to_lowercase();
        let mut state = self.state.write().await;
        let len_before = state.notes.len();
        state
            .notes
            .retain(|n| n.id != needle && n.text.to_lowercase() != lowered);
        Ok(state.notes.len() < len_before)
    }

    async fn clear_notes(&self) -> Result<(), MemoryError> {
        self.state.write().await.notes.clear();
        Ok(())
    }

    async fn clear_history(&self) -> Result<(), MemoryError> {
        self.state.write().await.history.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(max_notes: usize, max_history: usize) -> InMemoryStore {
        InMemoryStore::new(MemoryLimits { max_notes, max_history })
    }

    async fn add(store: &InMemoryStore, text: &str) -> MemoryNote {
        store.add_note(text, serde_json::Map::new()).await.unwrap()
    }

    #[tokio::test]
    async fn notes_evict_oldest_first() {
        let store = store(2, 10);
        add(&store, "a").await;
        add(&store, "b").await;
        add(&store, "c").await;

        let texts: Vec<String> = store.notes().await.into_iter().map(|n| n.text).collect();
        assert_eq!(texts, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn capacities_are_independent() {
        let store = store(1, 3);
        for i in 0..5 {
            store.add_history(HistoryTurn::user(format!("turn {i}"))).await.unwrap();
        }
        add(&store, "only").await;

        let history = store.history().await;
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].content, "turn 2");
        assert_eq!(store.notes().await.len(), 1);
    }

    #[tokio::test]
    async fn blank_notes_are_rejected() {
        let store = InMemoryStore::default();
        let err = store.add_note("   ", serde_json::Map::new()).await.unwrap_err();
        assert!(matches!(err, MemoryError::InvalidNote(_)));
        assert!(store.notes().await.is_empty());
    }

    #[tokio::test]
    async fn remove_by_id_or_text() {
        let store = InMemoryStore::default();
        let first = add(&store, "Prefers Ukrainian").await;
        add(&store, "Learning Slovak").await;

        assert!(store.remove_note(&first.id).await.unwrap());
        assert!(store.remove_note("learning slovak").await.unwrap());
        assert!(!store.remove_note("never added").await.unwrap());
        assert!(store.notes().await.is_empty());
    }

    #[tokio::test]
    async fn snapshots_are_detached() {
        let store = InMemoryStore::default();
        add(&store, "one").await;
        let mut snapshot = store.notes().await;
        snapshot.clear();
        assert_eq!(store.notes().await.len(), 1);
    }

    #[tokio::test]
    async fn clear_empty_store_is_ok() {
        let store = InMemoryStore::default();
        store.clear().await.unwrap();
        store.add_history(HistoryTurn::assistant("hi")).await.unwrap();
        add(&store, "n").await;
        store.clear().await.unwrap();
        assert!(store.notes().await.is_empty());
        assert!(store.history().await.is_empty());
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = InMemoryStore::default();
        let shared = store.clone();
        add(&shared, "shared note").await;
        assert_eq!(store.notes().await[0].text, "shared note");
    }
}
