//! Peer pool and fan-out sampling.

use quorumcast_types::Peer;
use rand::Rng;

/// The set of peers the gossip engine fans out to.
///
/// Populated once at engine construction from the configured peer list;
/// the engine itself never mutates it afterwards. Stands in for the routing
/// table owned by the discovery layer; only read access is needed here.
pub struct PeerTable {
    local: Peer,
    peers: Vec<Peer>,
}

impl PeerTable {
    /// Build the table from the local peer and the configured peer list.
    ///
    /// The local peer and duplicate identities are dropped.
    pub fn new(local: Peer, peers: impl IntoIterator<Item = Peer>) -> Self {
        let mut table = Vec::new();
        for peer in peers {
            if peer.identity() == local.identity() {
                continue;
            }
            if table.iter().any(|p: &Peer| p.identity() == peer.identity()) {
                continue;
            }
            table.push(peer);
        }
        PeerTable {
            local,
            peers: table,
        }
    }

    /// The local peer this table was built around.
    pub fn local(&self) -> Peer {
        self.local
    }

    /// All known remote peers.
    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    /// Number of known remote peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether no remote peers are known.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Choose `count` peers uniformly at random without replacement.
///
/// Pure given the RNG, so tests can inject a seeded source and get a
/// reproducible sample. Returns all peers when `count` covers the whole
/// pool. No ordering is guaranteed.
pub fn sample_peers<R: Rng + ?Sized>(rng: &mut R, peers: &[Peer], count: usize) -> Vec<Peer> {
    let amount = count.min(peers.len());
    rand::seq::index::sample(rng, peers.len(), amount)
        .into_iter()
        .map(|i| peers[i])
        .collect()
}
