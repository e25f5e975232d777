//! Simplified Kademlia routing table

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::slice::Iter;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::trace;

use crate::common::{Id, Node};

/// K = the default maximum size of a k-bucket.
pub const MAX_BUCKET_SIZE_K: usize = 20;

/// Routing table membership, as seen by the protocol layer.
///
/// Implementations must be callable concurrently, and both mutations must be
/// idempotent: adding a present contact refreshes it, removing an absent
/// contact is a no-op.
pub trait Router: Debug + Send + Sync {
    /// Insert or refresh a contact.
    fn add_contact(&self, contact: Node);
    /// Remove a contact, if present.
    fn remove_contact(&self, contact: &Node);
    /// Returns `true` if a contact with this id is in the table.
    fn contains(&self, id: &Id) -> bool;
}

#[derive(Debug, Clone)]
/// Simplified Kademlia routing table
pub struct RoutingTable {
    id: Id,
    buckets: BTreeMap<u8, KBucket>,
}

impl RoutingTable {
    /// Create a new [RoutingTable] with a given id.
    pub fn new(id: Id) -> Self {
        let buckets = BTreeMap::new();

        RoutingTable { id, buckets }
    }

    /// Returns the [Id] of this node, where the distance is measured from.
    pub fn id(&self) -> &Id {
        &self.id
    }

    // === Public Methods ===

    /// Attempts to add or refresh a node in this routing table, and return `true` if it did.
    pub fn add(&mut self, node: Node) -> bool {
        let distance = self.id.distance(node.id());

        if distance == 0 {
            // Do not add self to the routing_table
            return false;
        }

        let bucket = self.buckets.entry(distance).or_default();

        bucket.add(node)
    }

    /// Remove a node from this routing table.
    pub fn remove(&mut self, node_id: &Id) {
        let distance = self.id.distance(node_id);

        if let Some(bucket) = self.buckets.get_mut(&distance) {
            bucket.remove(node_id);

            if bucket.is_empty() {
                self.buckets.remove(&distance);
            }
        }
    }

    /// Returns `true` if a node with this id is in the table.
    pub fn contains(&self, node_id: &Id) -> bool {
        let distance = self.id.distance(node_id);

        self.buckets
            .get(&distance)
            .map(|bucket| bucket.contains(node_id))
            .unwrap_or(false)
    }

    /// Returns `true` if this routing table is empty.
    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(|bucket| bucket.is_empty())
    }

    /// Return the number of nodes in this routing table.
    pub fn size(&self) -> usize {
        self.buckets
            .values()
            .fold(0, |acc, bucket| acc + bucket.nodes.len())
    }

    /// Returns an iterator over the nodes in this routing table.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.buckets.values().flat_map(|bucket| bucket.iter())
    }

    /// Returns the contact stored under this id.
    pub fn get(&self, node_id: &Id) -> Option<&Node> {
        let distance = self.id.distance(node_id);

        self.buckets
            .get(&distance)?
            .iter()
            .find(|node| node.id() == node_id)
    }
}

/// A [RoutingTable] shared between the inbound handlers and the outbound
/// completions, implementing [Router].
#[derive(Debug, Clone)]
pub struct SharedRoutingTable(Arc<RwLock<RoutingTable>>);

impl SharedRoutingTable {
    pub fn new(id: Id) -> Self {
        SharedRoutingTable(Arc::new(RwLock::new(RoutingTable::new(id))))
    }

    /// Returns a snapshot of the routing table.
    pub fn snapshot(&self) -> RoutingTable {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Router for SharedRoutingTable {
    fn add_contact(&self, contact: Node) {
        let mut table = self.0.write().unwrap_or_else(PoisonError::into_inner);

        let id = *contact.id();
        if !table.add(contact) {
            trace!(?id, "Contact not added to the routing table");
        }
    }

    fn remove_contact(&self, contact: &Node) {
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(contact.id());
    }

    fn contains(&self, id: &Id) -> bool {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }
}

/// Kbuckets are similar to LRU caches that checks and evicts unresponsive nodes,
/// without dropping any responsive nodes in the process.
#[derive(Debug, Clone)]
pub struct KBucket {
    /// Nodes in the k-bucket, sorted by the least recently seen.
    nodes: Vec<Node>,
}

impl KBucket {
    pub fn new() -> Self {
        KBucket {
            nodes: Vec::with_capacity(MAX_BUCKET_SIZE_K),
        }
    }

    // === Public Methods ===

    pub fn add(&mut self, incoming: Node) -> bool {
        if let Some(index) = self.iter().position(|n| n.id() == incoming.id()) {
            let existing = &self.nodes[index];

            // A key bound to the id is trusted to move the contact anywhere.
            // Otherwise only an unbound entry is refreshed, and only from the same ip.
            if incoming.has_bound_key()
                || (!existing.has_bound_key() && existing.same_ip(&incoming))
            {
                self.nodes.remove(index);
                self.nodes.push(incoming);

                true
            } else {
                false
            }
        } else if self.nodes.len() < MAX_BUCKET_SIZE_K {
            self.nodes.push(incoming);
            true
        } else if self.nodes[0].is_stale() {
            // Remove the least recently seen node and add the new one
            self.nodes.remove(0);
            self.nodes.push(incoming);

            true
        } else {
            false
        }
    }

    pub fn remove(&mut self, node_id: &Id) {
        self.nodes.retain(|node| node.id() != node_id);
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, Node> {
        self.nodes.iter()
    }

    fn contains(&self, id: &Id) -> bool {
        self.iter().any(|node| node.id() == id)
    }
}

impl Default for KBucket {
    fn default() -> Self {
        Self::new()
    }
}
