//! crates/academy_core/src/inflight.rs
//!
//! Guards for the single-round-trip interaction model: at most one submission
//! per key at a time, and responses that arrive after the view moved on are dropped.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;

//=========================================================================================
// InFlight
//=========================================================================================

/// Tracks which keys currently have a submission outstanding.
pub struct InFlight<K> {
    active: Arc<Mutex<HashSet<K>>>,
}

impl<K> Default for InFlight<K> {
    fn default() -> Self {
        Self {
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}

impl<K> Clone for InFlight<K> {
    fn clone(&self) -> Self {
        Self {
            active: self.active.clone(),
        }
    }
}

impl<K: Eq + Hash + Clone> InFlight<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` when `key` already has a submission in flight.
    pub fn try_acquire(&self, key: K) -> Option<InFlightGuard<K>> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(key.clone()) {
            return None;
        }
        Some(InFlightGuard {
            active: self.active.clone(),
            key: Some(key),
        })
    }

    pub fn is_active(&self, key: &K) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }
}

/// Releases its key when dropped.
pub struct InFlightGuard<K: Eq + Hash> {
    active: Arc<Mutex<HashSet<K>>>,
    key: Option<K>,
}

impl<K: Eq + Hash> Drop for InFlightGuard<K> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.active
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
        }
    }
}

//=========================================================================================
// ViewSlot
//=========================================================================================

/// Identifies one load started with [`ViewSlot::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Holds the latest committed view. A load only commits if nothing newer began
/// (or the slot was invalidated) while it was in flight.
pub struct ViewSlot<T> {
    generation: AtomicU64,
    value: RwLock<Option<T>>,
}

impl<T> Default for ViewSlot<T> {
    fn default() -> Self {
        Self {
            generation: AtomicU64::new(0),
            value: RwLock::new(None),
        }
    }
}

impl<T: Clone> ViewSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> Ticket {
        Ticket(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Stores `value` if `ticket` is still current; returns whether it was stored.
    pub async fn commit(&self, ticket: Ticket, value: T) -> bool {
        let mut slot = self.value.write().await;
        if self.generation.load(Ordering::SeqCst) != ticket.0 {
            return false;
        }
        *slot = Some(value);
        true
    }

    /// Called on navigation away: clears the view and orphans every pending load.
    pub async fn invalidate(&self) {
        let mut slot = self.value.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        *slot = None;
    }

    pub async fn current(&self) -> Option<T> {
        self.value.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_refused_until_release() {
        let in_flight = InFlight::new();
        let guard = in_flight.try_acquire("checkout").unwrap();
        assert!(in_flight.try_acquire("checkout").is_none());
        assert!(in_flight.try_acquire("enroll").is_some());

        drop(guard);
        assert!(!in_flight.is_active(&"checkout"));
        assert!(in_flight.try_acquire("checkout").is_some());
    }

    #[tokio::test]
    async fn test_stale_load_is_discarded() {
        let slot = ViewSlot::new();
        let stale = slot.begin();
        let fresh = slot.begin();

        assert!(slot.commit(fresh, "course B").await);
        assert!(!slot.commit(stale, "course A").await);
        assert_eq!(slot.current().await, Some("course B"));
    }

    #[tokio::test]
    async fn test_response_after_invalidate_is_dropped() {
        let slot = ViewSlot::new();
        let ticket = slot.begin();
        slot.invalidate().await;

        assert!(!slot.commit(ticket, 42).await);
        assert_eq!(slot.current().await, None);
    }
}
