//! Generation-based message cache.

use parking_lot::RwLock;
use quorumcast_messages::Message;
use quorumcast_types::MessageId;
use std::collections::HashMap;
use thiserror::Error;

/// Expected, non-fatal cache outcomes.
///
/// Callers treat all of these as skips, not failures: a duplicate put means
/// the message is already being disseminated, a full generation sheds load,
/// and a missing get means the message aged out of the dissemination window.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("message {0} already cached")]
    Duplicate(MessageId),

    #[error("current generation is full")]
    Full,

    #[error("message {0} not found")]
    NotFound(MessageId),
}

/// Bounded store of recently broadcast messages, organized as a fixed ring
/// of generations.
///
/// New messages enter the current generation; [`MessageCache::shift`]
/// rotates the ring once per heartbeat, clearing the slot it lands on: an
/// O(1) eviction of the oldest generation. A message is therefore
/// advertised from the current generation for one heartbeat and remains
/// fetchable for `generations - 1` more before it is dropped.
///
/// Internally synchronized; concurrent dispatch handlers read and write
/// freely through `&self`.
pub struct MessageCache {
    inner: RwLock<Ring>,
}

struct Ring {
    /// One map per generation. `head` indexes the current generation.
    slots: Vec<HashMap<MessageId, Message>>,
    head: usize,
    per_generation: usize,
}

impl MessageCache {
    /// Create a cache of `generations` slots holding at most
    /// `per_generation` messages each.
    ///
    /// # Panics
    ///
    /// Panics if either bound is zero.
    pub fn new(generations: usize, per_generation: usize) -> Self {
        assert!(generations > 0, "cache needs at least one generation");
        assert!(per_generation > 0, "generation capacity must be non-zero");
        MessageCache {
            inner: RwLock::new(Ring {
                slots: (0..generations).map(|_| HashMap::new()).collect(),
                head: 0,
                per_generation,
            }),
        }
    }

    /// Insert a message into the current generation.
    ///
    /// Fails with [`CacheError::Duplicate`] if the id is present in any
    /// retained generation, or [`CacheError::Full`] when the current
    /// generation is at capacity.
    pub fn put(&self, message: Message) -> Result<(), CacheError> {
        let id = message.id();
        let mut ring = self.inner.write();
        if ring.slots.iter().any(|slot| slot.contains_key(&id)) {
            return Err(CacheError::Duplicate(id));
        }
        let head = ring.head;
        if ring.slots[head].len() >= ring.per_generation {
            return Err(CacheError::Full);
        }
        ring.slots[head].insert(id, message);
        Ok(())
    }

    /// Fetch a message from any retained generation.
    pub fn get(&self, id: &MessageId) -> Result<Message, CacheError> {
        let ring = self.inner.read();
        ring.slots
            .iter()
            .find_map(|slot| slot.get(id))
            .cloned()
            .ok_or(CacheError::NotFound(*id))
    }

    /// Identifiers in the current generation only.
    ///
    /// This is the digest advertised per heartbeat; older generations stay
    /// fetchable but are no longer advertised, which bounds digest size.
    pub fn gossip_ids(&self) -> Vec<MessageId> {
        let ring = self.inner.read();
        ring.slots[ring.head].keys().copied().collect()
    }

    /// Open a new empty current generation, evicting the oldest one.
    pub fn shift(&self) {
        let mut ring = self.inner.write();
        ring.head = (ring.head + 1) % ring.slots.len();
        let head = ring.head;
        ring.slots[head].clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorumcast_messages::MessageBody;

    fn make_message(tag: &[u8]) -> Message {
        Message::new(MessageBody::Have {
            ids: vec![MessageId::from_bytes(tag)],
        })
    }

    #[test]
    fn put_then_get_roundtrip() {
        let cache = MessageCache::new(5, 16);
        let msg = make_message(b"a");
        let id = msg.id();
        cache.put(msg.clone()).unwrap();
        assert_eq!(cache.get(&id).unwrap(), msg);
    }

    #[test]
    fn duplicate_put_fails_across_generations() {
        let cache = MessageCache::new(3, 16);
        let msg = make_message(b"a");
        cache.put(msg.clone()).unwrap();
        assert_eq!(cache.put(msg.clone()), Err(CacheError::Duplicate(msg.id())));
        cache.shift();
        // Still retained in an older generation.
        assert_eq!(cache.put(msg.clone()), Err(CacheError::Duplicate(msg.id())));
    }

    #[test]
    fn full_generation_rejects_puts() {
        let cache = MessageCache::new(2, 2);
        cache.put(make_message(b"a")).unwrap();
        cache.put(make_message(b"b")).unwrap();
        assert_eq!(cache.put(make_message(b"c")), Err(CacheError::Full));
        // A shift opens fresh capacity.
        cache.shift();
        cache.put(make_message(b"c")).unwrap();
    }

    #[test]
    fn evicted_after_depth_shifts() {
        let depth = 4;
        let cache = MessageCache::new(depth, 16);
        let msg = make_message(b"a");
        let id = msg.id();
        cache.put(msg).unwrap();
        for _ in 0..depth - 1 {
            cache.shift();
            assert!(cache.get(&id).is_ok(), "evicted too early");
        }
        cache.shift();
        assert_eq!(cache.get(&id), Err(CacheError::NotFound(id)));
    }

    #[test]
    fn gossip_ids_cover_current_generation_only() {
        let cache = MessageCache::new(3, 16);
        let old = make_message(b"old");
        let old_id = old.id();
        cache.put(old).unwrap();
        cache.shift();
        let new = make_message(b"new");
        let new_id = new.id();
        cache.put(new).unwrap();

        let ids = cache.gossip_ids();
        assert_eq!(ids, vec![new_id]);
        // The old message is no longer advertised but still fetchable.
        assert!(cache.get(&old_id).is_ok());
    }

    #[test]
    fn single_generation_cache_forgets_on_shift() {
        let cache = MessageCache::new(1, 16);
        let msg = make_message(b"a");
        let id = msg.id();
        cache.put(msg).unwrap();
        cache.shift();
        assert_eq!(cache.get(&id), Err(CacheError::NotFound(id)));
    }
}
