//! DHT routing table module
//!
//! Kademlia routing table used by the local node to account for the peers it
//! knows about. One table is kept per address family.

use crate::dht::infohash::{InfoHash, HASH_LEN};
use crate::dht::node::Node;
use crate::dht::stats::NodeStats;

const K: usize = 8; // Kademlia constant - number of nodes per bucket
const ID_BITS: usize = HASH_LEN * 8;

/// A bucket in the routing table
#[derive(Debug, Clone)]
pub struct KBucket {
    /// Nodes in this bucket
    pub nodes: Vec<Node>,
}

impl Default for KBucket {
    fn default() -> Self {
        Self::new()
    }
}

impl KBucket {
    /// Create a new KBucket
    pub fn new() -> Self {
        Self {
            nodes: Vec::with_capacity(K),
        }
    }

    /// Add a node to the bucket, or refresh it if already present.
    ///
    /// A known node only becomes confirmed when the incoming record is.
    pub fn add_node(&mut self, node: Node) -> bool {
        if let Some(existing) = self.nodes.iter_mut().find(|n| n.id == node.id) {
            existing.addr = node.addr;
            if node.confirmed {
                existing.update_last_seen();
            }
            return true;
        }

        if self.nodes.len() >= K {
            // Prefer evicting a node that never answered.
            match self.nodes.iter().position(|n| !n.is_good()) {
                Some(pos) if node.confirmed => {
                    self.nodes.remove(pos);
                }
                _ => return false,
            }
        }

        self.nodes.push(node);
        true
    }

    /// Get the number of nodes in the bucket
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the bucket is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Kademlia routing table
#[derive(Debug)]
pub struct RoutingTable {
    /// Our node ID
    pub our_id: InfoHash,
    /// K buckets (160 buckets for 160-bit IDs)
    pub buckets: Vec<KBucket>,
}

impl RoutingTable {
    /// Create a new routing table
    pub fn new(our_id: InfoHash) -> Self {
        Self {
            our_id,
            buckets: (0..ID_BITS).map(|_| KBucket::new()).collect(),
        }
    }

    /// Add a node to the routing table
    pub fn add_node(&mut self, node: Node) -> bool {
        if node.id == self.our_id {
            return false;
        }
        let bucket_index = self.get_bucket_index(&node.id);
        self.buckets[bucket_index].add_node(node)
    }

    /// Health counters for this table
    pub fn stats(&self) -> NodeStats {
        let mut stats = NodeStats::default();
        for bucket in self.buckets.iter().filter(|b| !b.is_empty()) {
            stats.buckets += 1;
            for node in &bucket.nodes {
                if node.is_good() {
                    stats.good_nodes += 1;
                } else {
                    stats.dubious_nodes += 1;
                }
            }
        }
        stats
    }

    /// Get the bucket index for a node ID
    fn get_bucket_index(&self, id: &InfoHash) -> usize {
        // Find the first bit where the IDs differ
        for i in 0..ID_BITS {
            let byte_index = i / 8;
            let bit_index = 7 - (i % 8);
            let our_bit = (self.our_id.0[byte_index] >> bit_index) & 1;
            let their_bit = (id.0[byte_index] >> bit_index) & 1;
            if our_bit != their_bit {
                return i;
            }
        }
        ID_BITS - 1 // IDs are identical
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    fn find(bucket: &KBucket, id: &InfoHash) -> Option<Node> {
        bucket.nodes.iter().find(|n| n.id == *id).cloned()
    }

    #[test]
    fn test_routing_table_new() {
        let our_id = InfoHash::new([1u8; 20]);
        let table = RoutingTable::new(our_id);
        assert_eq!(table.our_id, our_id);
        assert_eq!(table.buckets.len(), 160);
        assert_eq!(table.stats(), NodeStats::default());
    }

    #[test]
    fn test_add_node() {
        let mut table = RoutingTable::new(InfoHash::new([1u8; 20]));
        let node_id = InfoHash::new([2u8; 20]);

        assert!(table.add_node(Node::new(node_id, addr(4222))));
        assert!(table.add_node(Node::new(node_id, addr(4223))));
        let stats = table.stats();
        assert_eq!(stats.known_nodes(), 1);
        assert_eq!(stats.buckets, 1);
    }

    #[test]
    fn test_own_id_is_never_added() {
        let our_id = InfoHash::new([1u8; 20]);
        let mut table = RoutingTable::new(our_id);
        assert!(!table.add_node(Node::new(our_id, addr(4222))));
        assert_eq!(table.stats().known_nodes(), 0);
    }

    #[test]
    fn test_bucket_index() {
        let our_id = InfoHash::new([0x80u8; 20]);
        let table = RoutingTable::new(our_id);
        assert_eq!(table.get_bucket_index(&our_id), 159);
        assert_eq!(table.get_bucket_index(&InfoHash::default()), 0);
    }

    #[test]
    fn test_kbucket_confirmation_is_sticky() {
        let mut bucket = KBucket::new();
        let node_id = InfoHash::new([2u8; 20]);

        bucket.add_node(Node::unconfirmed(node_id, addr(4222)));
        assert!(!find(&bucket, &node_id).unwrap().is_good());

        bucket.add_node(Node::new(node_id, addr(4222)));
        assert!(find(&bucket, &node_id).unwrap().is_good());

        bucket.add_node(Node::unconfirmed(node_id, addr(4222)));
        assert!(find(&bucket, &node_id).unwrap().is_good());
        assert_eq!(bucket.len(), 1);
    }

    #[test]
    fn test_kbucket_full_evicts_dubious_for_good() {
        let mut bucket = KBucket::new();
        for i in 0..K {
            let mut id = [2u8; 20];
            id[19] = i as u8;
            assert!(bucket.add_node(Node::unconfirmed(InfoHash::new(id), addr(7000 + i as u16))));
        }
        assert_eq!(bucket.len(), K);

        let mut id = [2u8; 20];
        id[19] = K as u8;
        assert!(!bucket.add_node(Node::unconfirmed(InfoHash::new(id), addr(7100))));
        assert!(bucket.add_node(Node::new(InfoHash::new(id), addr(7100))));
        assert_eq!(bucket.len(), K);
        assert!(find(&bucket, &InfoHash::new(id)).is_some());
    }

    #[test]
    fn test_stats_counts_good_and_dubious() {
        let mut table = RoutingTable::new(InfoHash::default());
        table.add_node(Node::new(InfoHash::new([0x80u8; 20]), addr(1)));
        table.add_node(Node::new(InfoHash::new([0x40u8; 20]), addr(2)));
        table.add_node(Node::unconfirmed(InfoHash::new([0x20u8; 20]), addr(3)));

        let stats = table.stats();
        assert_eq!(stats.good_nodes, 2);
        assert_eq!(stats.dubious_nodes, 1);
        assert_eq!(stats.known_nodes(), 3);
        assert_eq!(stats.buckets, 3);
    }
}
