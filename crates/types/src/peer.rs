//! Peer identity.

use crate::PublicKey;
use std::fmt;
use std::net::SocketAddr;

/// A network peer: a socket address bound to a public-key identity.
///
/// The peer pool owns the canonical set; the gossip layer only reads peers
/// and passes them to the transport.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Peer {
    address: SocketAddr,
    identity: PublicKey,
}

impl Peer {
    /// Create a peer from its address and identity.
    pub fn new(address: SocketAddr, identity: PublicKey) -> Self {
        Peer { address, identity }
    }

    /// The peer's socket address.
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// The peer's public-key identity.
    pub fn identity(&self) -> PublicKey {
        self.identity
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:?}", self.address, self.identity)
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
