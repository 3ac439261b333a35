//! Cache of live model sessions, keyed by conversation id.
//!
//! Keeping the session around avoids replaying the whole message history
//! on every turn. The cache is bounded; an evicted (or never-cached)
//! conversation is transparently rebuilt from persisted messages. Each
//! slot carries its own async mutex, so two concurrent sends on the same
//! conversation serialize instead of racing on the session.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::ai::ChatSession;

pub struct SessionSlot {
    /// None until a session has been opened or rebuilt.
    pub session: Mutex<Option<ChatSession>>,
    last_used: AtomicU64,
}

pub struct ChatSessionCache {
    slots: DashMap<String, Arc<SessionSlot>>,
    max_entries: usize,
    clock: AtomicU64,
}

impl ChatSessionCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            slots: DashMap::new(),
            max_entries: max_entries.max(1),
            clock: AtomicU64::new(0),
        }
    }

    /// Get or create the slot for a conversation, marking it as most
    /// recently used. Creating a slot may evict the least recently used
    /// one to stay within bounds.
    pub fn slot(&self, conversation_id: &str) -> Arc<SessionSlot> {
        let tick = self.clock.fetch_add(1, Ordering::Relaxed) + 1;

        let slot = {
            // Scope the shard lock: eviction below iterates the map
            let entry = self
                .slots
                .entry(conversation_id.to_string())
                .or_insert_with(|| {
                    Arc::new(SessionSlot {
                        session: Mutex::new(None),
                        last_used: AtomicU64::new(tick),
                    })
                });
            entry.value().clone()
        };
        slot.last_used.store(tick, Ordering::Relaxed);
        self.evict_over_capacity(conversation_id);
        slot
    }

    /// Drop a conversation's cached session, if any.
    pub fn remove(&self, conversation_id: &str) {
        self.slots.remove(conversation_id);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn evict_over_capacity(&self, keep: &str) {
        while self.slots.len() > self.max_entries {
            let lru = self
                .slots
                .iter()
                .filter(|entry| entry.key() != keep)
                .min_by_key(|entry| entry.value().last_used.load(Ordering::Relaxed))
                .map(|entry| entry.key().clone());

            match lru {
                Some(key) => {
                    self.slots.remove(&key);
                    tracing::debug!("Evicted cached model session for conversation {}", key);
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{ChatSession, Content};

    #[tokio::test]
    async fn test_slot_is_reused_for_same_conversation() {
        let cache = ChatSessionCache::new(4);
        let first = cache.slot("conv-1");
        {
            let mut guard = first.session.lock().await;
            *guard = Some(ChatSession::from_contents(vec![Content::user("seed")]));
        }

        let second = cache.slot("conv-1");
        assert!(Arc::ptr_eq(&first, &second));
        let guard = second.session.lock().await;
        assert_eq!(guard.as_ref().unwrap().history().len(), 1);
    }

    #[tokio::test]
    async fn test_least_recently_used_slot_is_evicted() {
        let cache = ChatSessionCache::new(2);
        cache.slot("a");
        cache.slot("b");
        // Touch "a" so "b" becomes the LRU entry
        cache.slot("a");
        cache.slot("c");

        assert_eq!(cache.len(), 2);
        // "b" was evicted; re-requesting it yields an empty slot
        let slot = cache.slot("b");
        assert!(slot.session.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_remove_clears_cached_session() {
        let cache = ChatSessionCache::new(4);
        let slot = cache.slot("conv-1");
        *slot.session.lock().await = Some(ChatSession::new());

        cache.remove("conv-1");
        assert!(cache.is_empty());
        let fresh = cache.slot("conv-1");
        assert!(fresh.session.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_sends_serialize_on_slot_mutex() {
        let cache = Arc::new(ChatSessionCache::new(4));
        let slot = cache.slot("conv-1");
        *slot.session.lock().await = Some(ChatSession::new());

        let results = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for i in 0..4u32 {
            let slot = cache.slot("conv-1");
            let results = results.clone();
            handles.push(tokio::spawn(async move {
                let _guard = slot.session.lock().await;
                // Holding the slot lock represents an in-flight model call
                results.lock().await.push(i);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(results.lock().await.len(), 4);
    }
}
