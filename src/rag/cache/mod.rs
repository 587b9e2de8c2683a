
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::SourceCitation;

/// A previously generated answer
#[derive(Debug, Clone, PartialEq)]
pub struct CachedAnswer {
    pub response: String,
    pub sources: Vec<SourceCitation>,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CachedAnswer>,
    order: VecDeque<String>,
}

/// Bounded answer cache keyed by normalized query text.
///
/// Eviction follows insertion order: reads never refresh an entry.
#[derive(Debug)]
pub struct ResponseCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

/// Lower-cased, trimmed query text
#[inline]
pub fn cache_key(query: &str) -> String {
    query.trim().to_lowercase()
}

impl ResponseCache {
    #[inline]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // Entries are plain data, so a poisoned lock is still usable
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn get(&self, query: &str) -> Option<CachedAnswer> {
        self.lock().entries.get(&cache_key(query)).cloned()
    }

    /// Insert unless the key is already present. Returns whether the entry was stored.
    #[inline]
    pub fn insert(&self, query: &str, answer: CachedAnswer) -> bool {
        let key = cache_key(query);
        let mut state = self.lock();

        if state.entries.contains_key(&key) {
            return false;
        }

        while state.entries.len() >= self.capacity {
            match state.order.pop_front() {
                Some(oldest) => {
                    state.entries.remove(&oldest);
                }
                None => break,
            }
        }

        state.order.push_back(key.clone());
        state.entries.insert(key, answer);
        true
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.order.clear();
    }
}
