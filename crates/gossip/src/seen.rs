//! Delivery deduplication.

use lru::LruCache;
use parking_lot::Mutex;
use quorumcast_types::MessageId;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

/// TTL-bounded set of message ids already delivered to the application.
///
/// Entries expire lazily: an entry older than its TTL is treated as absent
/// and dropped on the next lookup. The size bound evicts least-recently-used
/// entries when full. This set exists purely for delivery deduplication:
/// an id may expire here while the message is still fetchable from the
/// [`MessageCache`](crate::MessageCache), and vice versa.
pub struct SeenSet {
    entries: Mutex<LruCache<MessageId, Instant>>,
}

impl SeenSet {
    /// Create a seen set bounded to `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).expect("seen set capacity must be non-zero");
        SeenSet {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Record `id` as seen for the next `ttl`.
    ///
    /// Re-marking an id refreshes its expiry.
    pub fn mark(&self, id: MessageId, ttl: Duration) {
        self.entries.lock().put(id, Instant::now() + ttl);
    }

    /// Whether `id` was marked within its TTL.
    pub fn contains(&self, id: &MessageId) -> bool {
        let mut entries = self.entries.lock();
        match entries.peek(id) {
            Some(expiry) if *expiry > Instant::now() => true,
            Some(_) => {
                entries.pop(id);
                false
            }
            None => false,
        }
    }
}
