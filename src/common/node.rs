//! Struct and implementation of a peer contact, the entry in the routing table.
use std::{
    fmt::{self, Debug, Formatter},
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use crate::common::Id;

/// The age of a node's last_seen time before it is considered stale and can
/// be evicted from a full k-bucket.
pub const STALE_TIME: Duration = Duration::from_secs(15 * 60);

#[derive(Clone, PartialEq)]
/// Node entry in the routing table, also the contact a request came from.
pub struct Node(pub(crate) Arc<NodeInner>);

#[derive(Clone)]
pub(crate) struct NodeInner {
    pub(crate) id: Id,
    pub(crate) address: SocketAddr,
    pub(crate) public_key: [u8; 32],
    pub(crate) last_seen: Instant,
}

impl PartialEq for NodeInner {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Debug for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.0.id)
            .field("address", &self.0.address)
            .field("last_seen", &self.0.last_seen.elapsed().as_secs())
            .finish()
    }
}

impl Node {
    /// Creates a new Node from an id, socket address and advertised public key.
    pub fn new(id: Id, address: SocketAddr, public_key: [u8; 32]) -> Node {
        Node(Arc::new(NodeInner {
            id,
            address,
            public_key,
            last_seen: Instant::now(),
        }))
    }

    /// Creates a Node whose id is bound to its public key.
    pub fn from_public_key(public_key: [u8; 32], address: SocketAddr) -> Node {
        Node::new(Id::from_public_key(&public_key), address, public_key)
    }

    /// Creates a random Node for testing purposes.
    #[cfg(test)]
    pub fn random() -> Node {
        Node::new(
            Id::random(),
            SocketAddr::from(([0, 0, 0, 0], 0)),
            rand::random(),
        )
    }

    /// Creates a Node with a unique id and address for testing purposes.
    #[cfg(test)]
    pub fn unique(i: usize) -> Node {
        Node::new(
            Id::random(),
            SocketAddr::from(([0, 0, 0, 0], i as u16)),
            rand::random(),
        )
    }

    // === Getters ===

    /// Returns the id of this node
    pub fn id(&self) -> &Id {
        &self.0.id
    }

    /// Returns the address of this node
    pub fn address(&self) -> SocketAddr {
        self.0.address
    }

    /// Returns the public key this node advertised.
    pub fn public_key(&self) -> &[u8; 32] {
        &self.0.public_key
    }

    /// Returns `true` if this node's id is derived from its advertised public key.
    ///
    /// Signatures checked against [Self::public_key] only authenticate
    /// [Self::id] when this holds.
    pub fn has_bound_key(&self) -> bool {
        Id::from_public_key(&self.0.public_key) == self.0.id
    }

    /// Node is last seen more than a threshold ago.
    pub fn is_stale(&self) -> bool {
        self.0.last_seen.elapsed() > STALE_TIME
    }

    /// Returns a copy of this contact, last seen now.
    pub fn seen_now(&self) -> Node {
        Node::new(self.0.id, self.0.address, self.0.public_key)
    }

    /// Returns true if both nodes have the same ip address
    pub fn same_ip(&self, other: &Self) -> bool {
        self.0.address.ip() == other.0.address.ip()
    }
}
