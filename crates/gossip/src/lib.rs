//! Epidemic dissemination of consensus messages.
//!
//! This crate implements the gossip layer of the Quorumcast network: each
//! node periodically advertises digests of its recently cached messages to a
//! random subset of peers (`Have`), which pull the messages they are missing
//! (`Want`). Anti-entropy reconciliation rather than flooding.
//!
//! # Architecture
//!
//! ```text
//! Transport ──inbound──▶ Gossip ──deliver──▶ message processor
//!     ▲                    │
//!     └──Pong/Want/replies─┘
//! ```
//!
//! - [`MessageCache`]: bounded, generation-based store of recently broadcast
//!   messages, rotated every heartbeat
//! - [`SeenSet`]: TTL-bounded set of already-delivered message ids
//! - [`Gossip`]: the engine itself (liveness gate, heartbeat fan-out,
//!   anti-entropy pulls, delivery deduplication)
//! - [`Transport`]: the contract the underlying wire transport fulfils;
//!   [`MemoryTransport`] is an in-process implementation for tests
//!
//! Delivery is at-most-effort: duplicates are suppressed, failures of the
//! downstream processor are logged and discarded, and a slow peer relies on
//! the next heartbeat cycle rather than retries.

mod cache;
mod config;
mod engine;
mod memory;
mod peers;
mod seen;
mod transport;

pub use cache::{CacheError, MessageCache};
pub use config::GossipConfig;
pub use engine::{EngineState, Gossip, GossipError, MessageProcessor};
pub use memory::{MemoryHub, MemoryTransport};
pub use peers::{sample_peers, PeerTable};
pub use seen::SeenSet;
pub use transport::{InboundHandler, Transport, TransportError};
