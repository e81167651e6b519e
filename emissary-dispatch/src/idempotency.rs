//! Record of messages that have already been dispatched
//!
//! The sent set is append-only for the lifetime of the store. Alongside it the
//! store tracks which ids are currently being dispatched, so two concurrent
//! sends of the same id cannot both reach a provider.

use std::sync::Arc;

use dashmap::{DashMap, DashSet, mapref::entry::Entry};
use emissary_common::MessageId;

#[derive(Debug, Default)]
struct Inner {
    sent: DashSet<MessageId>,
    in_flight: DashMap<MessageId, ()>,
}

/// Concurrent idempotency store
#[derive(Debug, Clone, Default)]
pub struct IdempotencyStore {
    inner: Arc<Inner>,
}

/// Result of trying to start a dispatch for an id
#[derive(Debug)]
pub enum Claim {
    /// The id has already been dispatched successfully
    AlreadySent,
    /// Another dispatch for the id is running
    InFlight,
    /// The caller owns the dispatch until the guard is dropped or completed
    Acquired(ClaimGuard),
}

impl IdempotencyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_sent(&self, id: &MessageId) -> bool {
        self.inner.sent.contains(id)
    }

    /// Record a successful dispatch. Marking twice has no further effect.
    pub fn mark_sent(&self, id: &MessageId) {
        self.inner.sent.insert(id.clone());
    }

    pub fn is_in_flight(&self, id: &MessageId) -> bool {
        self.inner.in_flight.contains_key(id)
    }

    /// Atomically check the id and, if it is free, claim it for dispatch.
    pub fn begin(&self, id: &MessageId) -> Claim {
        match self.inner.in_flight.entry(id.clone()) {
            Entry::Occupied(_) => Claim::InFlight,
            Entry::Vacant(entry) => {
                // Checked under the in-flight shard lock so a completing
                // dispatch cannot slip between the two lookups.
                if self.inner.sent.contains(id) {
                    return Claim::AlreadySent;
                }

                entry.insert(());
                Claim::Acquired(ClaimGuard {
                    id: id.clone(),
                    store: self.clone(),
                    completed: false,
                })
            }
        }
    }

    /// Number of ids recorded as sent
    pub fn len(&self) -> usize {
        self.inner.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.sent.is_empty()
    }
}

/// Exclusive right to dispatch one id
///
/// Dropping the guard without calling [`ClaimGuard::complete`] releases the
/// id so a later request may try again.
#[derive(Debug)]
pub struct ClaimGuard {
    id: MessageId,
    store: IdempotencyStore,
    completed: bool,
}

impl ClaimGuard {
    /// Mark the id as sent and release the claim.
    pub fn complete(mut self) {
        self.store.mark_sent(&self.id);
        self.completed = true;
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        // The sent mark is made before the in-flight entry goes away, so
        // `begin` never sees the id as neither sent nor in flight.
        self.store.inner.in_flight.remove(&self.id);
        if !self.completed {
            tracing::trace!(message_id = %self.id, "Dispatch claim released without success");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn id(s: &str) -> MessageId {
        MessageId::new(s)
    }

    #[test]
    fn test_mark_sent_is_idempotent() {
        let store = IdempotencyStore::new();
        assert!(!store.has_sent(&id("a")));

        store.mark_sent(&id("a"));
        store.mark_sent(&id("a"));

        assert!(store.has_sent(&id("a")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_unknown_id_is_not_sent() {
        let store = IdempotencyStore::new();
        store.mark_sent(&id("a"));
        assert!(!store.has_sent(&id("b")));
        assert!(!store.is_empty());
    }

    #[test]
    fn test_claim_excludes_concurrent_claim() {
        let store = IdempotencyStore::new();

        let Claim::Acquired(guard) = store.begin(&id("a")) else {
            panic!("first claim should be acquired");
        };
        assert!(store.is_in_flight(&id("a")));
        assert!(matches!(store.begin(&id("a")), Claim::InFlight));

        // Other ids are unaffected
        assert!(matches!(store.begin(&id("b")), Claim::Acquired(_)));

        drop(guard);
        assert!(!store.is_in_flight(&id("a")));
        assert!(!store.has_sent(&id("a")));
        assert!(matches!(store.begin(&id("a")), Claim::Acquired(_)));
    }

    #[test]
    fn test_completed_claim_marks_sent() {
        let store = IdempotencyStore::new();

        let Claim::Acquired(guard) = store.begin(&id("a")) else {
            panic!("claim should be acquired");
        };
        guard.complete();

        assert!(store.has_sent(&id("a")));
        assert!(!store.is_in_flight(&id("a")));
        assert!(matches!(store.begin(&id("a")), Claim::AlreadySent));
    }

    #[test]
    fn test_claims_across_threads() {
        let store = IdempotencyStore::new();
        let acquired = std::sync::atomic::AtomicUsize::new(0);
        let barrier = std::sync::Barrier::new(8);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    barrier.wait();
                    if let Claim::Acquired(guard) = store.begin(&id("shared")) {
                        acquired.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        guard.complete();
                    }
                });
            }
        });

        assert_eq!(acquired.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(store.has_sent(&id("shared")));
    }
}
